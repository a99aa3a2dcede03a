use super::{MessageTransport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram Bot API client for `sendMessage` and `sendLocation`.
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    api_url: String,
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn with_api_url(api_url: impl Into<String>, bot_token: String) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &'static str, payload: Value) -> Result<(), TransportError> {
        let url = format!("{}/bot{}/{}", self.api_url, self.bot_token, method);
        // The request URL embeds the bot token; keep it out of error text.
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.without_url()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Telegram {} accepted", method);
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Telegram {} failed ({}): {}", method, status, body);
            Err(TransportError::Rejected {
                method,
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl MessageTransport for TelegramTransport {
    async fn send_text(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        let payload = serde_json::json!({
            "chat_id": channel,
            "text": text,
        });
        self.call("sendMessage", payload).await
    }

    async fn send_location(
        &self,
        channel: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), TransportError> {
        let payload = serde_json::json!({
            "chat_id": channel,
            "latitude": latitude,
            "longitude": longitude,
        });
        self.call("sendLocation", payload).await
    }
}
