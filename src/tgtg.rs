use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::ListingRecord;
use crate::utils::mask_secret;

pub const TGTG_BASE_URL: &str = "https://apptoogoodtogo.com";

const ITEMS_ENDPOINT: &str = "/api/item/v8/";
const REFRESH_ENDPOINT: &str = "/api/token/v1/refresh";
const AUTH_BY_EMAIL_ENDPOINT: &str = "/api/auth/v5/authByEmail";
const AUTH_POLLING_ENDPOINT: &str = "/api/auth/v5/authByRequestPollingId";

const USER_AGENT: &str =
    "TGTG/24.11.0 Dalvik/2.1.0 (Linux; U; Android 14; Pixel 7 Build/UQ1A.240105.004)";
const DEVICE_TYPE: &str = "ANDROID";
const PAGE_SIZE: usize = 50;
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLLS: u32 = 24;

#[derive(Debug, Error)]
pub enum TgtgError {
    #[error("marketplace returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("login failed: {0}")]
    Login(String),
}

impl TgtgError {
    /// Credentials were refused, as opposed to any other fetch failure.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            TgtgError::Api { status: 401, .. } | TgtgError::Login(_) => true,
            other => {
                let text = other.to_string().to_lowercase();
                text.contains("unauthorized") || text.contains("token")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TgtgCredentials {
    Email(String),
    Tokens {
        access_token: String,
        refresh_token: String,
        cookie: String,
        user_id: Option<String>,
    },
}

impl TgtgCredentials {
    pub fn describe(&self) -> String {
        match self {
            TgtgCredentials::Email(email) => format!("e-mail login as {}", mask_secret(email)),
            TgtgCredentials::Tokens { access_token, .. } => {
                format!("access token {}", mask_secret(access_token))
            }
        }
    }
}

/// Snapshot of the user's favorite listings.
#[async_trait]
pub trait FavoritesSource: Send + Sync {
    async fn get_favorites(&self) -> Result<Vec<ListingRecord>, TgtgError>;
}

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    cookie: Option<String>,
    user_id: Option<String>,
}

pub struct TgtgClient {
    base_url: String,
    credentials: TgtgCredentials,
    client: reqwest::Client,
    poll_interval: Duration,
    max_polls: u32,
}

impl TgtgClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: TgtgCredentials,
    ) -> Result<Self, TgtgError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            client,
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
        })
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn session(&self) -> Result<Session, TgtgError> {
        match &self.credentials {
            TgtgCredentials::Email(email) => self.login_by_email(email).await,
            TgtgCredentials::Tokens {
                refresh_token,
                cookie,
                user_id,
                ..
            } => {
                let access_token = self.refresh(refresh_token, cookie).await?;
                Ok(Session {
                    access_token,
                    cookie: Some(cookie.clone()),
                    user_id: user_id.clone(),
                })
            }
        }
    }

    async fn refresh(&self, refresh_token: &str, cookie: &str) -> Result<String, TgtgError> {
        #[derive(Deserialize)]
        struct RefreshResponse {
            access_token: String,
        }

        let response = self
            .client
            .post(self.url(REFRESH_ENDPOINT))
            .header(header::COOKIE, cookie)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(http)?;
        let response = check_status(response).await?;
        let refreshed: RefreshResponse = response.json().await.map_err(http)?;
        debug!("Access token refreshed");
        Ok(refreshed.access_token)
    }

    /// Starts the e-mail handshake and waits for the user to open the link.
    async fn login_by_email(&self, email: &str) -> Result<Session, TgtgError> {
        #[derive(Deserialize)]
        struct AuthResponse {
            state: String,
            polling_id: Option<String>,
        }

        #[derive(Deserialize)]
        struct PollResponse {
            access_token: String,
            startup_data: Option<StartupData>,
        }

        #[derive(Deserialize)]
        struct StartupData {
            user: Option<User>,
        }

        #[derive(Deserialize)]
        struct User {
            user_id: Option<String>,
        }

        let response = self
            .client
            .post(self.url(AUTH_BY_EMAIL_ENDPOINT))
            .json(&json!({ "device_type": DEVICE_TYPE, "email": email }))
            .send()
            .await
            .map_err(http)?;
        let auth: AuthResponse = check_status(response).await?.json().await.map_err(http)?;

        let polling_id = match (auth.state.as_str(), auth.polling_id) {
            ("WAIT", Some(id)) => id,
            ("TERMS", _) => {
                return Err(TgtgError::Login(format!(
                    "{} is not linked to a marketplace account",
                    mask_secret(email)
                )))
            }
            (state, _) => return Err(TgtgError::Login(format!("unexpected auth state {state}"))),
        };

        info!("📧 Check your inbox and open the login link");
        for _ in 0..self.max_polls {
            let response = self
                .client
                .post(self.url(AUTH_POLLING_ENDPOINT))
                .json(&json!({
                    "device_type": DEVICE_TYPE,
                    "email": email,
                    "request_polling_id": polling_id,
                }))
                .send()
                .await
                .map_err(http)?;

            if response.status() == reqwest::StatusCode::ACCEPTED {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let response = check_status(response).await?;
            let cookie = response
                .headers()
                .get(header::SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(';').next().unwrap_or(v).to_string());
            let login: PollResponse = response.json().await.map_err(http)?;
            info!("✅ Logged in by e-mail");

            return Ok(Session {
                access_token: login.access_token,
                cookie,
                user_id: login
                    .startup_data
                    .and_then(|d| d.user)
                    .and_then(|u| u.user_id),
            });
        }

        Err(TgtgError::Login(
            "timed out waiting for the e-mail link to be opened".to_string(),
        ))
    }

    async fn fetch_page(
        &self,
        session: &Session,
        page: usize,
    ) -> Result<Vec<WireListing>, TgtgError> {
        let mut body = json!({
            "origin": { "latitude": 0.0, "longitude": 0.0 },
            "radius": 21,
            "page_size": PAGE_SIZE,
            "page": page,
            "discover": false,
            "favorites_only": true,
            "item_categories": [],
            "diet_categories": [],
            "with_stock_only": false,
            "hidden_only": false,
            "we_care_only": false,
        });
        if let Some(user_id) = &session.user_id {
            body["user_id"] = json!(user_id);
        }

        let mut request = self
            .client
            .post(self.url(ITEMS_ENDPOINT))
            .bearer_auth(&session.access_token)
            .json(&body);
        if let Some(cookie) = &session.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = check_status(request.send().await.map_err(http)?).await?;
        let parsed: ItemsResponse = response.json().await.map_err(http)?;
        Ok(parsed.items)
    }
}

#[async_trait]
impl FavoritesSource for TgtgClient {
    async fn get_favorites(&self) -> Result<Vec<ListingRecord>, TgtgError> {
        let session = self.session().await?;

        let mut listings = Vec::new();
        let mut page = 1;
        loop {
            let items = self.fetch_page(&session, page).await?;
            let last_page = items.len() < PAGE_SIZE;
            listings.extend(items.into_iter().map(ListingRecord::from));
            if last_page {
                break;
            }
            page += 1;
        }

        debug!("Fetched {} favorites over {} page(s)", listings.len(), page);
        Ok(listings)
    }
}

/// Request URLs are dropped so endpoint paths never leak into error text.
fn http(e: reqwest::Error) -> TgtgError {
    TgtgError::Http(e.without_url())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TgtgError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(TgtgError::Api {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<WireListing>,
}

#[derive(Debug, Deserialize)]
struct WireListing {
    item: Option<WireItem>,
    display_name: Option<String>,
    #[serde(default)]
    items_available: i64,
    pickup_interval: Option<WireInterval>,
    pickup_location: Option<WirePickupLocation>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    item_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireInterval {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WirePickupLocation {
    location: Option<WireLocation>,
}

#[derive(Debug, Deserialize)]
struct WireLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl From<WireListing> for ListingRecord {
    fn from(wire: WireListing) -> Self {
        let (pickup_start, pickup_end) = wire
            .pickup_interval
            .map(|i| (i.start, i.end))
            .unwrap_or_default();
        let location = wire.pickup_location.and_then(|p| p.location);

        ListingRecord {
            id: wire.item.and_then(|i| i.item_id),
            display_name: wire.display_name,
            items_available: u32::try_from(wire.items_available.max(0)).unwrap_or(u32::MAX),
            pickup_start,
            pickup_end,
            latitude: location.as_ref().and_then(|l| l.latitude),
            longitude: location.as_ref().and_then(|l| l.longitude),
        }
    }
}
