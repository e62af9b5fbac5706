use std::time::Duration;

use thiserror::Error;
use time::{UtcOffset, macros::format_description};

use crate::messages::TranscriptSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not valid: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub bind_addr: String,
    pub poll_interval: Duration,
    pub display_offset: UtcOffset,
    pub session_idle: time::Duration,
}

impl Config {
    /// Reads `MARKET_*` variables, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("MARKET_API_URL").unwrap_or_else(|| "http://localhost:8080".to_owned());
        let bind_addr = lookup("MARKET_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_owned());

        let poll_secs = match lookup("MARKET_POLL_SECS") {
            Some(value) => parse_positive("MARKET_POLL_SECS", value)?,
            None => 5,
        };

        let display_offset = match lookup("MARKET_UTC_OFFSET") {
            Some(value) => UtcOffset::parse(&value, format_description!("[offset_hour sign:mandatory]:[offset_minute]")).map_err(|err| ConfigError::Invalid {
                key: "MARKET_UTC_OFFSET",
                value,
                reason: err.to_string(),
            })?,
            None => UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        };

        let idle_minutes = match lookup("MARKET_SESSION_IDLE_MINUTES") {
            Some(value) => parse_positive("MARKET_SESSION_IDLE_MINUTES", value)?,
            None => 60,
        };

        Ok(Self {
            api_url,
            bind_addr,
            poll_interval: Duration::from_secs(poll_secs),
            display_offset,
            session_idle: time::Duration::minutes(idle_minutes as i64),
        })
    }

    pub fn transcript_settings(&self) -> TranscriptSettings {
        TranscriptSettings {
            poll_interval: self.poll_interval,
            offset: self.display_offset,
        }
    }
}

fn parse_positive(key: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid { key, value, reason: "must be greater than zero".to_owned() }),
        Ok(n) => Ok(n),
        Err(err) => Err(ConfigError::Invalid { key, value, reason: err.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("MARKET_API_URL", "https://api.example.com"),
            ("MARKET_POLL_SECS", "2"),
            ("MARKET_UTC_OFFSET", "+01:00"),
        ])
        .unwrap();

        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.display_offset, UtcOffset::from_hms(1, 0, 0).unwrap());
        assert_eq!(config.session_idle, time::Duration::minutes(60));
    }

    #[test]
    fn defaults_poll_every_five_seconds() {
        assert_eq!(config(&[]).unwrap().poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("MARKET_POLL_SECS", "0")]).is_err());
        assert!(config(&[("MARKET_POLL_SECS", "soon")]).is_err());
        assert!(config(&[("MARKET_UTC_OFFSET", "CET")]).is_err());
    }
}
