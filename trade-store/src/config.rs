//! Store configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{StoreError, StoreResult};
use crate::retry::RetryConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Store configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Backend every facade call is dispatched to
    pub backend: BackendKind,

    /// Table names per backend
    pub tables: TableConfig,

    /// Retry policy applied by every mapper
    pub retry: RetrySettings,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Table names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Document store table
    pub document: String,
    /// Flat analytical table
    pub olap_flat: String,
    /// Fact analytical table
    pub olap_fact: String,
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Attempts per operation, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Backoff ceiling
    pub max_delay_ms: u64,
}

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Normalized PostgreSQL tables
    Relational,
    /// One document per trade
    Document,
    /// Columnar store, one array-encoded row per trade
    OlapFlat,
    /// Columnar store, one row per period
    OlapFact,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (in-memory clients)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value
    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = match lookup("TRADE_STORE_BACKEND") {
            Some(v) => v.parse()?,
            None => defaults.backend,
        };
        let environment = match lookup("TRADE_STORE_ENV") {
            Some(v) => v.parse()?,
            None => defaults.environment,
        };

        let tables = TableConfig {
            document: lookup("TRADE_STORE_DOCUMENT_TABLE").unwrap_or(defaults.tables.document),
            olap_flat: lookup("TRADE_STORE_OLAP_FLAT_TABLE").unwrap_or(defaults.tables.olap_flat),
            olap_fact: lookup("TRADE_STORE_OLAP_FACT_TABLE").unwrap_or(defaults.tables.olap_fact),
        };

        let retry = RetrySettings {
            max_attempts: load_number(&lookup, "TRADE_STORE_RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            initial_delay_ms: load_number(
                &lookup,
                "TRADE_STORE_RETRY_INITIAL_DELAY_MS",
                defaults.retry.initial_delay_ms,
            )?,
            max_delay_ms: load_number(&lookup, "TRADE_STORE_RETRY_MAX_DELAY_MS", defaults.retry.max_delay_ms)?,
        };
        if retry.max_attempts == 0 {
            return Err(StoreError::Config(
                "TRADE_STORE_RETRY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            backend,
            tables,
            retry,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            backend: BackendKind::Document,
            tables: TableConfig::default(),
            retry: RetrySettings {
                max_attempts: 3,
                initial_delay_ms: 0,
                max_delay_ms: 0,
            },
            environment: Environment::Test,
        }
    }

    /// Same configuration pointed at another backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Retry policy for the mappers
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            ..RetryConfig::default()
        }
    }
}

fn load_number<F, T>(lookup: &F, key: &str, default: T) -> StoreResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|_| StoreError::Config(format!("Invalid {} value: {}", key, val))),
        None => Ok(default),
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Relational,
            tables: TableConfig::default(),
            retry: RetrySettings {
                max_attempts: 3,
                initial_delay_ms: 100,
                max_delay_ms: 2_000,
            },
            environment: Environment::Development,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            document: "trades".to_string(),
            olap_flat: "trades_flat".to_string(),
            olap_fact: "trade_period_facts".to_string(),
        }
    }
}

impl BackendKind {
    /// Name as used in `TRADE_STORE_BACKEND`
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Relational => "relational",
            BackendKind::Document => "document",
            BackendKind::OlapFlat => "olap-flat",
            BackendKind::OlapFact => "olap-fact",
        }
    }
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relational" | "postgres" => Ok(BackendKind::Relational),
            "document" => Ok(BackendKind::Document),
            "olap-flat" | "olap_flat" => Ok(BackendKind::OlapFlat),
            "olap-fact" | "olap_fact" => Ok(BackendKind::OlapFact),
            other => Err(StoreError::Config(format!(
                "Invalid TRADE_STORE_BACKEND: {}. Expected: relational, document, olap-flat, olap-fact",
                other
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(StoreError::Config(format!(
                "Invalid TRADE_STORE_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();

        assert_eq!(config.backend, BackendKind::Relational);
        assert_eq!(config.tables.olap_fact, "trade_period_facts");
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_test_config() {
        let config = StoreConfig::test();

        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.retry_config().initial_delay, Duration::ZERO);
    }

    #[test]
    fn test_empty_lookup_gives_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("TRADE_STORE_BACKEND", "olap-fact"),
            ("TRADE_STORE_ENV", "prod"),
            ("TRADE_STORE_OLAP_FACT_TABLE", "facts_v2"),
            ("TRADE_STORE_RETRY_MAX_ATTEMPTS", "5"),
            ("TRADE_STORE_RETRY_MAX_DELAY_MS", "750"),
        ]))
        .unwrap();

        assert_eq!(config.backend, BackendKind::OlapFact);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.tables.olap_fact, "facts_v2");
        assert_eq!(config.retry_config().max_attempts, 5);
        assert_eq!(config.retry_config().max_delay, Duration::from_millis(750));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let bad_backend = StoreConfig::from_lookup(lookup(&[("TRADE_STORE_BACKEND", "mongo")]));
        assert!(matches!(bad_backend, Err(StoreError::Config(_))));

        let bad_number = StoreConfig::from_lookup(lookup(&[("TRADE_STORE_RETRY_MAX_ATTEMPTS", "many")]));
        assert!(matches!(bad_number, Err(StoreError::Config(_))));

        let zero = StoreConfig::from_lookup(lookup(&[("TRADE_STORE_RETRY_MAX_ATTEMPTS", "0")]));
        assert!(matches!(zero, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_backend_display_round_trips() {
        for kind in [
            BackendKind::Relational,
            BackendKind::Document,
            BackendKind::OlapFlat,
            BackendKind::OlapFact,
        ] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }
}
