//! Connection settings read from the environment.

use std::time::Duration;

use annals_core::config::{ConfigError, parse_or, required};

/// Default size of the connection pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default deadline for a single storage operation, in milliseconds.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5000;

/// Settings for [`PgStorageAdapter::connect`](crate::PgStorageAdapter::connect).
#[derive(Clone, PartialEq, Eq)]
pub struct PgConfig {
    /// Connection string.
    pub database_url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Deadline applied to every adapter operation.
    pub operation_timeout: Duration,
}

// The URL usually carries a password.
impl std::fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConfig")
            .field("database_url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl PgConfig {
    /// Creates a config for `database_url` with default pool size and
    /// timeout.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }

    /// Reads `DATABASE_URL`, `ANNALS_DB_MAX_CONNECTIONS` and
    /// `ANNALS_DB_TIMEOUT_MS` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` without a database URL and
    /// `ConfigError::Invalid` for malformed numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let database_url = required(&lookup, "DATABASE_URL")?;
        let max_connections = parse_or(
            &lookup,
            "ANNALS_DB_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
            "a positive integer",
        )?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "ANNALS_DB_MAX_CONNECTIONS".to_owned(),
                value: "0".to_owned(),
                expected: "a positive integer",
            });
        }
        let timeout_ms = parse_or(
            &lookup,
            "ANNALS_DB_TIMEOUT_MS",
            DEFAULT_OPERATION_TIMEOUT_MS,
            "a duration in milliseconds",
        )?;

        Ok(Self {
            database_url,
            max_connections,
            operation_timeout: Duration::from_millis(timeout_ms),
        })
    }
}
