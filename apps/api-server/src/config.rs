//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time. Storage adapters read their
//! own connection settings (`FirestoreConfig::from_env`, `SqliteRepo::from_env`).

use axum::http::HeaderValue;
use std::env;
use std::fmt;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// Hosted Google Cloud Firestore (or its emulator)
    Firestore,
    /// SQLite file-based storage
    Sqlite,
    /// In-memory storage (data lost on restart)
    Memory,
}

impl StorageProvider {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "firestore" => Some(Self::Firestore),
            "sqlite" => Some(Self::Sqlite),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8000)
    pub port: u16,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Storage provider (default: firestore)
    pub storage_provider: StorageProvider,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Port
        let port = match get("PORT") {
            Some(s) => s.trim().parse().map_err(|_| ConfigError {
                field: "PORT",
                message: format!("'{}' is not a valid port", s),
            })?,
            None => 8000,
        };

        // CORS allow origin
        let cors_origin_str = get("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Storage provider
        let storage_str = get("STORAGE_PROVIDER").unwrap_or_else(|| "firestore".into());
        let storage_provider = StorageProvider::parse(&storage_str).ok_or_else(|| ConfigError {
            field: "STORAGE_PROVIDER",
            message: format!(
                "unknown provider '{}' (expected firestore, sqlite or memory)",
                storage_str
            ),
        })?;

        // Log format
        let log_format = LogFormat::from_str(&get("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        Ok(Self {
            port,
            cors_allow_origin,
            storage_provider,
            log_format,
        })
    }

    /// Log warnings about configuration that is unsuitable for production.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: users are kept in process memory and lost on restart."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.storage_provider, StorageProvider::Firestore);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.cors_allow_origin, HeaderValue::from_static("*"));
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::parse("firestore"), Some(StorageProvider::Firestore));
        assert_eq!(StorageProvider::parse("SQLITE"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::parse("memory"), Some(StorageProvider::Memory));
        assert_eq!(StorageProvider::parse("postgres"), None);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::from_str("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("anything"), LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_fail_fast() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.field, "PORT");
        let err = load(&[("STORAGE_PROVIDER", "postgres")]).unwrap_err();
        assert_eq!(err.field, "STORAGE_PROVIDER");
        let err = load(&[("CORS_ALLOW_ORIGIN", "bad\norigin")]).unwrap_err();
        assert_eq!(err.field, "CORS_ALLOW_ORIGIN");
    }

    #[test]
    fn explicit_values() {
        let cfg = load(&[
            ("PORT", "9090"),
            ("STORAGE_PROVIDER", "memory"),
            ("LOG_FORMAT", "json"),
            ("CORS_ALLOW_ORIGIN", "https://admin.example.com"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.storage_provider, StorageProvider::Memory);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.cors_allow_origin, "https://admin.example.com");
    }
}
