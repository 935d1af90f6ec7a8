/*!
common/src/lib.rs

Shared configuration types and DB helper functions for ZapFeedReader.

This file provides:
- Config data structures (deserialized from the JSON server config)
- An async loader for the config file
- Helpers to initialize an SQLite connection pool
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// A basic-auth account the server accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub login: String,
    pub password: String,
}

/// Auto-refresh loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRefreshConfig {
    pub enabled: Option<bool>,
    /// Default refresh interval in seconds, applied to feeds without one of their own.
    pub interval: Option<u64>,
}

/// The `zapfr` object of the server configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZapFRConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub ssl_pubcert: Option<String>,
    pub ssl_privkey: Option<String>,
    pub servername: Option<String>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    pub autorefresh: Option<AutoRefreshConfig>,
    /// One of "debug", "info", "warning", "error".
    pub loglevel: Option<String>,
    /// Unix user/group to drop privileges to after binding.
    pub user: Option<String>,
    pub group: Option<String>,
}

/// Top-level application configuration (deserialized from the JSON config file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub zapfr: ZapFRConfig,
}

impl Config {
    /// Load configuration from a JSON file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("zapfeedreader-server.conf").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = serde_json::from_str(&data).context("Failed to parse JSON configuration")?;
        Ok(cfg)
    }

    pub fn bind(&self) -> &str {
        self.zapfr.bind.as_deref().unwrap_or("0.0.0.0")
    }

    pub fn port(&self) -> u16 {
        self.zapfr.port.unwrap_or(16016)
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.zapfr
            .autorefresh
            .as_ref()
            .and_then(|a| a.enabled)
            .unwrap_or(true)
    }

    pub fn auto_refresh_interval(&self) -> u64 {
        self.zapfr
            .autorefresh
            .as_ref()
            .and_then(|a| a.interval)
            .unwrap_or(DEFAULT_FEED_REFRESH_INTERVAL_SECONDS)
    }

    /// The tracing filter directive corresponding to the configured loglevel.
    pub fn log_filter(&self) -> &'static str {
        match self.zapfr.loglevel.as_deref() {
            Some("debug") => "debug",
            Some("warning") => "warn",
            Some("error") => "error",
            _ => "info",
        }
    }
}

/// Feeds without an explicit refresh interval are polled this often (15 minutes).
pub const DEFAULT_FEED_REFRESH_INTERVAL_SECONDS: u64 = 15 * 60;

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary, ensure the DB file exists
/// (attempting to create it if missing), and return a configured `SqlitePool`. Defaults are
/// conservative: max_connections 5, WAL journal mode.
///
/// Example:
///   let pool = init_db_pool("data/zapfeedreader.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    // Try to create the DB file if it does not already exist. This gives a clearer error
    // earlier (filesystem permission or path issues) instead of only surfacing it via the
    // SQLite connection attempt.
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn config_from_string_and_db_pool() {
        // Minimal JSON to test parsing
        let json = r#"
            {
                "zapfr": {
                    "bind": "127.0.0.1",
                    "port": 16016,
                    "accounts": [ { "login": "alice", "password": "hunter2" } ],
                    "autorefresh": { "enabled": true, "interval": 600 },
                    "loglevel": "debug"
                }
            }
        "#;

        let cfg: Config = serde_json::from_str(json).expect("parse config");
        assert_eq!(cfg.bind(), "127.0.0.1");
        assert_eq!(cfg.port(), 16016);
        assert_eq!(cfg.zapfr.accounts.len(), 1);
        assert_eq!(cfg.zapfr.accounts[0].login, "alice");
        assert_eq!(cfg.auto_refresh_interval(), 600);
        assert_eq!(cfg.log_filter(), "debug");

        // Test DB pool initialization in a temporary directory
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("zapfeedreader.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = init_db_pool(&db_path_str).await.expect("init pool");
        // Simple sanity: acquire a connection
        let conn = pool.acquire().await.expect("acquire conn");
        drop(conn);
    }

    #[test]
    fn config_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "zapfr": {} }"#).expect("parse");
        assert_eq!(cfg.bind(), "0.0.0.0");
        assert_eq!(cfg.port(), 16016);
        assert!(cfg.auto_refresh_enabled());
        assert_eq!(cfg.log_filter(), "info");
        assert!(cfg.zapfr.accounts.is_empty());
    }
}
