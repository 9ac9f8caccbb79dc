//! Configuration loading and representation.

use thiserror::Error;

pub const ENV_STORE: &str = "STOCKFLOW_STORE";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "STOCKFLOW_DB_MAX_CONNECTIONS";
pub const ENV_RETRY_ATTEMPTS: &str = "STOCKFLOW_RETRY_ATTEMPTS";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which store implementation backs the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

/// How many times an operation is attempted when it loses a concurrency race.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    pub store: StoreBackend,
    pub retry: RetryPolicy,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::InMemory,
            retry: RetryPolicy::default(),
        }
    }
}

impl InfraConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store = match get(ENV_STORE).as_deref().map(str::trim) {
            None | Some("memory") => StoreBackend::InMemory,
            Some("postgres") => StoreBackend::Postgres {
                database_url: get(ENV_DATABASE_URL).ok_or(ConfigError::Missing(ENV_DATABASE_URL))?,
                max_connections: parse_number(
                    ENV_DB_MAX_CONNECTIONS,
                    get(ENV_DB_MAX_CONNECTIONS),
                    DEFAULT_MAX_CONNECTIONS,
                )?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: ENV_STORE,
                    value: other.to_string(),
                    reason: "expected 'memory' or 'postgres'".to_string(),
                });
            }
        };

        let attempts = parse_number(ENV_RETRY_ATTEMPTS, get(ENV_RETRY_ATTEMPTS), DEFAULT_RETRY_ATTEMPTS)?;

        Ok(Self {
            store,
            retry: RetryPolicy::new(attempts),
        })
    }
}

fn parse_number(key: &'static str, raw: Option<String>, default: u32) -> Result<u32, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be at least 1".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<InfraConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        InfraConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_memory_store() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, InfraConfig::default());
        assert_eq!(cfg.retry.max_attempts(), 3);
    }

    #[test]
    fn postgres_requires_database_url() {
        assert_eq!(
            config(&[(ENV_STORE, "postgres")]).unwrap_err(),
            ConfigError::Missing(ENV_DATABASE_URL)
        );
    }

    #[test]
    fn postgres_settings_are_read() {
        let cfg = config(&[
            (ENV_STORE, "postgres"),
            (ENV_DATABASE_URL, "postgres://localhost/stock"),
            (ENV_DB_MAX_CONNECTIONS, "12"),
            (ENV_RETRY_ATTEMPTS, "5"),
        ])
        .unwrap();
        assert_eq!(
            cfg.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/stock".to_string(),
                max_connections: 12,
            }
        );
        assert_eq!(cfg.retry.max_attempts(), 5);
    }

    #[test]
    fn rejects_unknown_backend_and_zero_attempts() {
        assert!(matches!(
            config(&[(ENV_STORE, "redis")]),
            Err(ConfigError::Invalid { key: ENV_STORE, .. })
        ));
        assert!(matches!(
            config(&[(ENV_RETRY_ATTEMPTS, "0")]),
            Err(ConfigError::Invalid { key: ENV_RETRY_ATTEMPTS, .. })
        ));
    }

    #[test]
    fn retry_policy_never_goes_below_one_attempt() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
    }
}
