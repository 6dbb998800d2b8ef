//! Environment-driven configuration.

use std::str::FromStr;

use thiserror::Error;

/// Default number of records fetched from the adapter per query page.
pub const DEFAULT_QUERY_PAGE_SIZE: usize = 256;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable must be set")]
    Missing(String),

    /// A variable is set but cannot be parsed.
    #[error("{name} must be {expected}, got `{value}`")]
    Invalid {
        /// Variable name.
        name: String,
        /// The raw value.
        value: String,
        /// What the value should look like.
        expected: &'static str,
    },
}

/// Reads `name` through `lookup` and parses it, falling back to `default`
/// when unset.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` if the value is set but does not parse.
pub fn parse_or<T, L>(
    lookup: &L,
    name: &str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name: name.to_owned(),
            value: raw,
            expected,
        }),
    }
}

/// Reads a required variable through `lookup`.
///
/// # Errors
///
/// Returns `ConfigError::Missing` if it is unset or blank.
pub fn required<L>(lookup: &L, name: &str) -> Result<String, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(name.to_owned()))
}

/// Tuning knobs for the `EventStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventStoreConfig {
    /// Records fetched from the adapter per page while streaming a query.
    pub query_page_size: usize,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            query_page_size: DEFAULT_QUERY_PAGE_SIZE,
        }
    }
}

impl EventStoreConfig {
    /// Reads `ANNALS_QUERY_PAGE_SIZE` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a non-numeric or zero page size.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a non-numeric or zero page size.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let query_page_size = parse_or(
            &lookup,
            "ANNALS_QUERY_PAGE_SIZE",
            DEFAULT_QUERY_PAGE_SIZE,
            "a positive integer",
        )?;
        if query_page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "ANNALS_QUERY_PAGE_SIZE".to_owned(),
                value: "0".to_owned(),
                expected: "a positive integer",
            });
        }
        Ok(Self { query_page_size })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EventStoreConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, EventStoreConfig::default());
    }

    #[test]
    fn test_reads_page_size() {
        let config =
            EventStoreConfig::from_lookup(lookup(&[("ANNALS_QUERY_PAGE_SIZE", "16")])).unwrap();

        assert_eq!(config.query_page_size, 16);
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert!(EventStoreConfig::from_lookup(lookup(&[("ANNALS_QUERY_PAGE_SIZE", "0")])).is_err());
        assert_eq!(
            EventStoreConfig::from_lookup(lookup(&[("ANNALS_QUERY_PAGE_SIZE", "many")])),
            Err(ConfigError::Invalid {
                name: "ANNALS_QUERY_PAGE_SIZE".to_owned(),
                value: "many".to_owned(),
                expected: "a positive integer",
            })
        );
    }

    #[test]
    fn test_required_rejects_blank() {
        let result = required(&lookup(&[("DATABASE_URL", "  ")]), "DATABASE_URL");

        assert_eq!(result, Err(ConfigError::Missing("DATABASE_URL".to_owned())));
    }
}
