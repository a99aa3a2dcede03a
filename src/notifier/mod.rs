mod telegram;

pub use telegram::{TelegramTransport, TELEGRAM_API_URL};

use crate::domain::NotificationPayload;
use crate::error::EntryError;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} rejected with status {status}: {body}")]
    Rejected {
        method: &'static str,
        status: u16,
        body: String,
    },
}

/// Outbound messaging channel. Each call is one delivery attempt.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_text(&self, channel: &str, text: &str) -> Result<(), TransportError>;

    async fn send_location(
        &self,
        channel: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), TransportError>;
}

pub struct Notifier<T> {
    transport: T,
    channel: String,
}

impl<T: MessageTransport> Notifier<T> {
    pub fn new(transport: T, channel: impl Into<String>) -> Self {
        Self {
            transport,
            channel: channel.into(),
        }
    }

    /// Text first, then the location pin. A failed text skips the pin.
    pub async fn notify(&self, payload: &NotificationPayload) -> Result<(), EntryError> {
        self.transport
            .send_text(&self.channel, &payload.text())
            .await?;

        if let Some(location) = payload.location {
            self.transport
                .send_location(&self.channel, location.latitude, location.longitude)
                .await?;
        }

        info!("📨 Alert delivered for {}", payload.shop_name);
        Ok(())
    }
}
