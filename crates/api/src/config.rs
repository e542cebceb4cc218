//! Application configuration loaded from environment variables.

use std::str::FromStr;

use domain::DEFAULT_CONFLICT_RETRY_LIMIT;
use payments::DEFAULT_TOLERANCE_SECS;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `pretty` or `json` (default `pretty`)
/// - `DATABASE_URL`: PostgreSQL url; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default `10`)
/// - `PAYMENT_WEBHOOK_SECRET`: webhook signing secret; webhooks are refused when unset
/// - `PAYMENT_WEBHOOK_TOLERANCE_SECS`: accepted signature age (default `300`)
/// - `CONFLICT_RETRY_LIMIT`: attempts per unit of work (default `5`)
/// - `PAYMENT_CHECKOUT_BASE_URL`: base of the hosted checkout urls
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: u64,
    pub conflict_retry_limit: u32,
    pub checkout_base_url: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup. Unparseable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| non_empty(&lookup, key);

        Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parsed(&lookup, "LOG_FORMAT").unwrap_or(defaults.log_format),
            database_url: text("DATABASE_URL"),
            database_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            webhook_secret: text("PAYMENT_WEBHOOK_SECRET"),
            webhook_tolerance_secs: parsed(&lookup, "PAYMENT_WEBHOOK_TOLERANCE_SECS")
                .unwrap_or(defaults.webhook_tolerance_secs),
            conflict_retry_limit: parsed(&lookup, "CONFLICT_RETRY_LIMIT")
                .filter(|limit: &u32| *limit > 0)
                .unwrap_or(defaults.conflict_retry_limit),
            checkout_base_url: text("PAYMENT_CHECKOUT_BASE_URL")
                .unwrap_or(defaults.checkout_base_url),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    non_empty(lookup, key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 10,
            webhook_secret: None,
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            conflict_retry_limit: DEFAULT_CONFLICT_RETRY_LIMIT,
            checkout_base_url: "https://pay.example.test/checkout".to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("database", &self.database_url.is_some())
            .field("database_max_connections", &self.database_max_connections)
            .field("webhook_secret", &self.webhook_secret.is_some())
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("conflict_retry_limit", &self.conflict_retry_limit)
            .field("checkout_base_url", &self.checkout_base_url)
            .finish()
    }
}
