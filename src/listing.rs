use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::domain::{Coordinates, ListingRecord, NotificationPayload};
use crate::error::EntryError;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Edmonton;

const PICKUP_FORMAT: &str = "%Y-%m-%d %I:%M %p %Z";

/// Turns raw listing records into alert payloads localized to one zone.
#[derive(Debug, Clone)]
pub struct Normalizer {
    timezone: Tz,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl Normalizer {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// `Ok(None)` means nothing to announce; sold-out listings are skipped
    /// before any field is checked.
    pub fn normalize(
        &self,
        record: &ListingRecord,
    ) -> Result<Option<NotificationPayload>, EntryError> {
        if record.items_available == 0 {
            return Ok(None);
        }

        required(&record.id, "item_id")?;
        let shop_name = required(&record.display_name, "display_name")?;

        let (Some(start), Some(end)) = (record.pickup_start, record.pickup_end) else {
            return Ok(None);
        };

        let location = match (record.latitude, record.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };

        Ok(Some(NotificationPayload {
            shop_name: shop_name.to_string(),
            pickup_window: format!("{}/{}", self.localize(start), self.localize(end)),
            location,
        }))
    }

    fn localize(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format(PICKUP_FORMAT)
            .to_string()
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, EntryError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EntryError::MalformedRecord { field }),
    }
}
