use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use tracing::info;

pub const DEFAULT_SOURCE_URL: &str = "https://script.google.com/macros/s/AKfycbxCtcHvxpj_uQTDhwwAsE5ItuVqArRerEemFQXWmH1fOJkXkOiffRTHFBf9ZA9TS7QW/exec";

pub struct Config {
    pub database_url: Option<String>,
    pub source_url: String,
    pub source_timeout: Duration,
    pub max_connections: u32,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            source_url: try_load("ATTENDANCE_SOURCE_URL", DEFAULT_SOURCE_URL)?,
            source_timeout: Duration::from_secs(try_load("ATTENDANCE_TIMEOUT_SECS", "10")?),
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_when_unset() {
        let value: u64 = try_load("CAMPUS_ATTENDANCE_TEST_UNSET_KEY", "42").unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn rejects_unparseable_default() {
        let value: anyhow::Result<u32> = try_load("CAMPUS_ATTENDANCE_TEST_UNSET_KEY", "ten");
        assert!(value.is_err());
    }

    #[test]
    fn database_url_is_required_on_demand() {
        let config = Config {
            database_url: None,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            source_timeout: Duration::from_secs(1),
            max_connections: 1,
        };
        assert!(config.database_url().is_err());
    }
}
