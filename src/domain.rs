use chrono::{DateTime, Utc};

/// One favorite listing as returned by the marketplace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingRecord {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub items_available: u32,
    pub pickup_start: Option<DateTime<Utc>>,
    pub pickup_end: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ListingRecord {
    /// Label used in logs: id and name when known.
    pub fn label(&self) -> String {
        let id = self.id.as_deref().unwrap_or("<unknown>");
        match self.display_name.as_deref() {
            Some(name) => format!("{id} ({name})"),
            None => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Ready-to-send alert content for one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPayload {
    pub shop_name: String,
    pub pickup_window: String,
    pub location: Option<Coordinates>,
}

impl NotificationPayload {
    pub fn text(&self) -> String {
        format!(
            "Shop: {}\nPickup time: {}",
            self.shop_name, self.pickup_window
        )
    }
}
