use std::path::PathBuf;
use std::time::Duration;

use repokit_domain::DomainError;
use serde::{Deserialize, Serialize};

pub const ENV_DATABASE_URL: &str = "REPOKIT_DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "REPOKIT_MAX_CONNECTIONS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "REPOKIT_BUSY_TIMEOUT_MS";

/// Connection settings for the SQLite store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sqlx URL, e.g. `sqlite://data/app.db` or `sqlite::memory:`
    pub database_url: String,

    /// Pool size; forced to 1 for in-memory databases
    pub max_connections: u32,

    /// How long SQLite waits on a locked database
    pub busy_timeout_ms: u64,

    /// How long a caller waits for a pooled connection
    pub acquire_timeout_ms: u64,

    pub create_if_missing: bool,

    pub foreign_keys: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            acquire_timeout_ms: 10_000,
            create_if_missing: true,
            foreign_keys: true,
        }
    }
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Defaults overridden by `REPOKIT_*` environment variables
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DomainError> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_DATABASE_URL) {
            config.database_url = url;
        }
        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = parse_number(ENV_MAX_CONNECTIONS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = parse_number(ENV_BUSY_TIMEOUT_MS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.database_url.starts_with("sqlite:") {
            return Err(DomainError::Configuration(format!(
                "database_url must be a sqlite URL, got '{}'",
                self.database_url
            )));
        }
        if self.max_connections == 0 {
            return Err(DomainError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// Filesystem path of a file-backed database
    pub fn file_path(&self) -> Option<PathBuf> {
        if self.is_in_memory() {
            return None;
        }

        let rest = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or_default();

        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

fn parse_number<N: std::str::FromStr>(name: &str, raw: &str) -> Result<N, DomainError> {
    raw.trim().parse().map_err(|_| {
        DomainError::Configuration(format!("{} must be a number, got '{}'", name, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_in_memory() {
        let config = StoreConfig::default();
        assert!(config.is_in_memory());
        assert_eq!(config.file_path(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = StoreConfig::from_lookup(lookup(&[
            (ENV_DATABASE_URL, "sqlite://data/app.db?mode=rwc"),
            (ENV_MAX_CONNECTIONS, "8"),
            (ENV_BUSY_TIMEOUT_MS, " 250 "),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 8);
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.file_path(), Some(PathBuf::from("data/app.db")));
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_bad_values_rejected() {
        let err = StoreConfig::from_lookup(lookup(&[(ENV_MAX_CONNECTIONS, "many")])).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));

        let err = StoreConfig::from_lookup(lookup(&[(ENV_MAX_CONNECTIONS, "0")])).unwrap_err();
        assert!(err.message().contains("max_connections"));

        let err = StoreConfig::new("postgres://localhost/db").validate().unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"database_url": "sqlite:app.db"}"#).unwrap();

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.file_path(), Some(PathBuf::from("app.db")));
    }
}
