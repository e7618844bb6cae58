// src/config/app.rs
use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Result};

use crate::ingest::providers::{json_feed, rss2json, DEFAULT_ATTEMPT_TIMEOUT};
use crate::orchestrator::DEFAULT_RETENTION_DAYS;
use crate::remote::{debounce::DEFAULT_QUIET_WINDOW, gist::DEFAULT_FILE_NAME, Credentials};

pub const DEFAULT_REFRESH_SECS: u64 = 30 * 60;
pub const DEFAULT_DATA_DIR: &str = "data";

/// Service configuration, read from the environment (`.env` honored by the binaries).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub refresh_every: Duration,
    pub fetch_timeout: Duration,
    pub debounce: Duration,
    pub retention_days: i64,
    pub rss2json_endpoint: String,
    pub jsonfeed_endpoint: String,
    pub gist_id: Option<String>,
    pub gist_token: Option<String>,
    pub gist_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            refresh_every: Duration::from_secs(DEFAULT_REFRESH_SECS),
            fetch_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            debounce: DEFAULT_QUIET_WINDOW,
            retention_days: DEFAULT_RETENTION_DAYS,
            rss2json_endpoint: rss2json::DEFAULT_ENDPOINT.to_string(),
            jsonfeed_endpoint: json_feed::DEFAULT_ENDPOINT.to_string(),
            gist_id: None,
            gist_token: None,
            gist_file: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("invalid {name}={v}: {e}")),
        None => Ok(None),
    }
}

impl AppConfig {
    /// Unset variables keep their defaults; malformed numbers are an error.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let cfg = Self {
            data_dir: var("ARCHFEED_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            refresh_every: parsed::<u64>("ARCHFEED_REFRESH_SECS")?
                .map(|s| Duration::from_secs(s.max(60)))
                .unwrap_or(d.refresh_every),
            fetch_timeout: parsed::<u64>("ARCHFEED_FETCH_TIMEOUT_SECS")?
                .map(|s| Duration::from_secs(s.max(1)))
                .unwrap_or(d.fetch_timeout),
            debounce: parsed::<u64>("ARCHFEED_DEBOUNCE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(d.debounce),
            retention_days: parsed::<i64>("ARCHFEED_RETENTION_DAYS")?
                .map(|days| days.max(1))
                .unwrap_or(d.retention_days),
            rss2json_endpoint: var("RSS2JSON_ENDPOINT").unwrap_or(d.rss2json_endpoint),
            jsonfeed_endpoint: var("JSONFEED_ENDPOINT").unwrap_or(d.jsonfeed_endpoint),
            gist_id: var("GIST_ID"),
            gist_token: var("GIST_TOKEN"),
            gist_file: var("GIST_FILE").unwrap_or(d.gist_file),
        };
        Ok(cfg)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.gist_token.as_deref().and_then(Credentials::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "ARCHFEED_DATA_DIR",
        "ARCHFEED_REFRESH_SECS",
        "ARCHFEED_FETCH_TIMEOUT_SECS",
        "ARCHFEED_DEBOUNCE_MS",
        "ARCHFEED_RETENTION_DAYS",
        "GIST_ID",
        "GIST_TOKEN",
        "GIST_FILE",
    ];

    fn clear() {
        for v in VARS {
            env::remove_var(v);
        }
    }

    #[serial_test::serial]
    #[test]
    fn defaults_when_unset() {
        clear();
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.refresh_every, Duration::from_secs(1800));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(15));
        assert_eq!(cfg.debounce, Duration::from_secs(2));
        assert_eq!(cfg.retention_days, 30);
        assert_eq!(cfg.gist_file, "ai-architecture-articles.json");
        assert!(cfg.credentials().is_none());
    }

    #[serial_test::serial]
    #[test]
    fn overrides_and_bad_numbers() {
        clear();
        env::set_var("ARCHFEED_DEBOUNCE_MS", "250");
        env::set_var("GIST_ID", " abc ");
        env::set_var("GIST_TOKEN", "tok");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.debounce, Duration::from_millis(250));
        assert_eq!(cfg.gist_id.as_deref(), Some("abc"));
        assert!(cfg.credentials().is_some());

        env::set_var("ARCHFEED_REFRESH_SECS", "soon");
        assert!(AppConfig::from_env().is_err());
        clear();
    }
}
