use std::env;
use std::path::PathBuf;

use chrono_tz::Tz;

use crate::error::RunError;
use crate::history::DEFAULT_HISTORY_FILE;
use crate::listing::DEFAULT_TIMEZONE;
use crate::notifier::TELEGRAM_API_URL;
use crate::tgtg::{TgtgCredentials, TGTG_BASE_URL};

/// Raw process configuration. Nothing is validated until `require`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub tgtg_email: Option<String>,
    pub tgtg_access_token: Option<String>,
    pub tgtg_refresh_token: Option<String>,
    pub tgtg_cookie: Option<String>,
    pub tgtg_user_id: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub history_file: PathBuf,
    pub target_timezone: Option<String>,
    pub tgtg_base_url: String,
    pub telegram_api_url: String,
}

/// Everything a run needs once configuration has been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub credentials: TgtgCredentials,
    pub chat_id: String,
    pub bot_token: String,
    pub timezone: Tz,
    pub tgtg_base_url: String,
    pub telegram_api_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            tgtg_email: get("TGTG_EMAIL"),
            tgtg_access_token: get("TGTG_ACCESS_TOKEN"),
            tgtg_refresh_token: get("TGTG_REFRESH_TOKEN"),
            tgtg_cookie: get("TGTG_COOKIE"),
            tgtg_user_id: get("TGTG_USER_ID"),
            telegram_chat_id: get("TELEGRAM_CHAT_ID"),
            telegram_bot_token: get("TELEGRAM_API_KEY").or_else(|| get("TELEGRAM_BOT_TOKEN")),
            history_file: get("ALERT_HISTORY_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE)),
            target_timezone: get("TARGET_TIMEZONE"),
            tgtg_base_url: get("TGTG_BASE_URL").unwrap_or_else(|| TGTG_BASE_URL.to_string()),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| TELEGRAM_API_URL.to_string()),
        }
    }

    pub fn require(&self) -> Result<RunSettings, RunError> {
        let chat_id = self
            .telegram_chat_id
            .clone()
            .ok_or_else(|| missing("TELEGRAM_CHAT_ID"))?;
        let bot_token = self
            .telegram_bot_token
            .clone()
            .ok_or_else(|| missing("TELEGRAM_API_KEY"))?;
        let credentials = self.credentials()?;

        let timezone = match &self.target_timezone {
            None => DEFAULT_TIMEZONE,
            Some(name) => name.parse::<Tz>().map_err(|_| {
                RunError::ConfigMissing(format!("TARGET_TIMEZONE (unknown zone {name:?})"))
            })?,
        };

        Ok(RunSettings {
            credentials,
            chat_id,
            bot_token,
            timezone,
            tgtg_base_url: self.tgtg_base_url.clone(),
            telegram_api_url: self.telegram_api_url.clone(),
        })
    }

    /// E-mail login wins over a token set when both are configured.
    fn credentials(&self) -> Result<TgtgCredentials, RunError> {
        if let Some(email) = &self.tgtg_email {
            return Ok(TgtgCredentials::Email(email.clone()));
        }

        match (
            &self.tgtg_access_token,
            &self.tgtg_refresh_token,
            &self.tgtg_cookie,
        ) {
            (Some(access_token), Some(refresh_token), Some(cookie)) => Ok(TgtgCredentials::Tokens {
                access_token: access_token.clone(),
                refresh_token: refresh_token.clone(),
                cookie: cookie.clone(),
                user_id: self.tgtg_user_id.clone(),
            }),
            (None, None, None) => Err(missing(
                "TGTG_EMAIL or TGTG_ACCESS_TOKEN/TGTG_REFRESH_TOKEN/TGTG_COOKIE",
            )),
            (access, refresh, _) => {
                let key = if access.is_none() {
                    "TGTG_ACCESS_TOKEN"
                } else if refresh.is_none() {
                    "TGTG_REFRESH_TOKEN"
                } else {
                    "TGTG_COOKIE"
                };
                Err(missing(key))
            }
        }
    }
}

fn missing(key: &str) -> RunError {
    RunError::ConfigMissing(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use crate::error::RunError;
    use crate::tgtg::TgtgCredentials;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    fn missing_key(config: &AppConfig) -> String {
        match config.require() {
            Err(RunError::ConfigMissing(key)) => key,
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }

    #[test]
    fn token_set_with_telegram_is_complete() {
        let cfg = config(&[
            ("TGTG_ACCESS_TOKEN", "access"),
            ("TGTG_REFRESH_TOKEN", "refresh"),
            ("TGTG_COOKIE", "datadome=1"),
            ("TELEGRAM_CHAT_ID", "-100123"),
            ("TELEGRAM_API_KEY", "bot:token"),
        ]);

        let settings = cfg.require().unwrap();
        assert_eq!(settings.chat_id, "-100123");
        assert_eq!(settings.bot_token, "bot:token");
        assert_eq!(settings.timezone, chrono_tz::America::Edmonton);
        assert_eq!(
            settings.credentials,
            TgtgCredentials::Tokens {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                cookie: "datadome=1".to_string(),
                user_id: None,
            }
        );
        assert_eq!(cfg.history_file, PathBuf::from("alert_history.json"));
    }

    #[test]
    fn email_takes_precedence() {
        let cfg = config(&[
            ("TGTG_EMAIL", "me@example.com"),
            ("TGTG_ACCESS_TOKEN", "access"),
            ("TELEGRAM_CHAT_ID", "1"),
            ("TELEGRAM_BOT_TOKEN", "bot:token"),
        ]);
        assert_eq!(
            cfg.require().unwrap().credentials,
            TgtgCredentials::Email("me@example.com".to_string())
        );
    }

    #[test]
    fn missing_chat_id_is_reported() {
        let cfg = config(&[("TGTG_EMAIL", "me@example.com"), ("TELEGRAM_API_KEY", "k")]);
        assert_eq!(missing_key(&cfg), "TELEGRAM_CHAT_ID");
    }

    #[test]
    fn blank_bot_token_counts_as_missing() {
        let cfg = config(&[
            ("TGTG_EMAIL", "me@example.com"),
            ("TELEGRAM_CHAT_ID", "1"),
            ("TELEGRAM_API_KEY", "   "),
        ]);
        assert_eq!(missing_key(&cfg), "TELEGRAM_API_KEY");
    }

    #[test]
    fn partial_token_set_names_the_gap() {
        let cfg = config(&[
            ("TGTG_ACCESS_TOKEN", "access"),
            ("TGTG_REFRESH_TOKEN", "refresh"),
            ("TELEGRAM_CHAT_ID", "1"),
            ("TELEGRAM_API_KEY", "k"),
        ]);
        assert_eq!(missing_key(&cfg), "TGTG_COOKIE");
    }

    #[test]
    fn no_marketplace_credentials() {
        let cfg = config(&[("TELEGRAM_CHAT_ID", "1"), ("TELEGRAM_API_KEY", "k")]);
        assert!(missing_key(&cfg).starts_with("TGTG_EMAIL"));
    }

    #[test]
    fn custom_zone_and_paths() {
        let cfg = config(&[
            ("TGTG_EMAIL", "me@example.com"),
            ("TELEGRAM_CHAT_ID", "1"),
            ("TELEGRAM_API_KEY", "k"),
            ("TARGET_TIMEZONE", "Europe/Paris"),
            ("ALERT_HISTORY_FILE", "/var/lib/pickup-watch/history.json"),
        ]);
        assert_eq!(cfg.require().unwrap().timezone, chrono_tz::Europe::Paris);
        assert_eq!(
            cfg.history_file,
            PathBuf::from("/var/lib/pickup-watch/history.json")
        );
    }

    #[test]
    fn unknown_zone_is_rejected() {
        let cfg = config(&[
            ("TGTG_EMAIL", "me@example.com"),
            ("TELEGRAM_CHAT_ID", "1"),
            ("TELEGRAM_API_KEY", "k"),
            ("TARGET_TIMEZONE", "Mars/Olympus"),
        ]);
        assert!(missing_key(&cfg).starts_with("TARGET_TIMEZONE"));
    }
}
