//! Process configuration read from the environment (and `.env`).

use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

use crate::commerce_config::CommerceConfig;
use crate::health::DEFAULT_PORT;

pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SUPPORT_CONTACT: &str = "support@trendifysmm.com";

#[derive(Debug)]
pub struct BotConfig {
    pub bot_token: SecretString,
    pub api_key: SecretString,
    pub commerce: CommerceConfig,
    pub admin_ids: Vec<i64>,
    /// Chat receiving order notifications
    pub channel_id: Option<i64>,
    pub support_contact: String,
    pub port: u16,
    pub catalog_path: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval: Duration,
    pub json_logs: bool,
}

impl BotConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).ok_or_else(|| anyhow!("{key} must be set"));

        let bot_token = SecretString::from(required("BOT_TOKEN")?);
        let api_key = SecretString::from(required("API_KEY")?);

        let mut commerce = CommerceConfig::default();
        if let Some(url) = get("API_URL") {
            commerce.api_url = url;
        }
        if let Some(secs) = get("HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().context("HTTP_TIMEOUT_SECS must be a number of seconds")?;
            commerce.request_timeout = Duration::from_secs(secs);
        }

        let admin_ids = match get("ADMIN_IDS") {
            Some(ids) => parse_admin_ids(&ids)?,
            None => Vec::new(),
        };

        let channel_id = get("CHANNEL_ID")
            .map(|id| id.parse::<i64>().context("CHANNEL_ID must be a numeric chat id"))
            .transpose()?;

        let port = match get("PORT") {
            Some(port) => port.parse().context("PORT must be a valid port number")?,
            None => DEFAULT_PORT,
        };

        let snapshot_interval = match get("SNAPSHOT_INTERVAL_SECS") {
            Some(secs) => {
                let secs: u64 = secs
                    .parse()
                    .context("SNAPSHOT_INTERVAL_SECS must be a number of seconds")?;
                Duration::from_secs(secs.max(1))
            }
            None => Duration::from_secs(DEFAULT_SNAPSHOT_INTERVAL_SECS),
        };

        Ok(Self {
            bot_token,
            api_key,
            commerce,
            admin_ids,
            channel_id,
            support_contact: get("SUPPORT_CONTACT").unwrap_or_else(|| DEFAULT_SUPPORT_CONTACT.to_string()),
            port,
            catalog_path: get("CATALOG_PATH").map(PathBuf::from),
            snapshot_path: get("SNAPSHOT_PATH").map(PathBuf::from),
            snapshot_interval,
            json_logs: get("LOG_FORMAT").is_some_and(|format| format.eq_ignore_ascii_case("json")),
        })
    }
}

/// Parse a comma-separated list of user ids
pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>()
                .with_context(|| format!("Invalid admin id '{id}' in ADMIN_IDS"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "123:abc"), ("API_KEY", "k")])).unwrap();
        assert_eq!(config.bot_token.expose_secret(), "123:abc");
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.admin_ids.is_empty());
        assert_eq!(config.channel_id, None);
        assert_eq!(config.snapshot_interval, Duration::from_secs(60));
        assert_eq!(config.commerce.request_timeout, Duration::from_secs(15));
        assert!(!config.json_logs);
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let err = BotConfig::from_lookup(lookup(&[("API_KEY", "k")])).unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn test_overrides() {
        let config = BotConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("API_KEY", "k"),
            ("ADMIN_IDS", "42, 7"),
            ("CHANNEL_ID", "-1001234"),
            ("PORT", "8080"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("LOG_FORMAT", "JSON"),
            ("SNAPSHOT_PATH", "/tmp/sessions.json"),
        ]))
        .unwrap();
        assert_eq!(config.admin_ids, vec![42, 7]);
        assert_eq!(config.channel_id, Some(-1001234));
        assert_eq!(config.port, 8080);
        assert_eq!(config.commerce.request_timeout, Duration::from_secs(5));
        assert!(config.json_logs);
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/sessions.json")));
    }

    #[test]
    fn test_invalid_admin_id() {
        assert!(parse_admin_ids("1,abc").is_err());
        assert_eq!(parse_admin_ids(" 1 ,, 2 ").unwrap(), vec![1, 2]);
    }
}
