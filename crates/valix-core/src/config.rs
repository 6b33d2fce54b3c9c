use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error as ThisError;

///
/// Constants
///

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("value index config is not valid toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("lock-timeout-ms must be greater than zero")]
    ZeroLockTimeout,
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Config, err.to_string())
    }
}

///
/// ValueIndexConfig
///
/// Settings read once when a `ValueIndex` is constructed.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ValueIndexConfig {
    /// Whether string keys keep their case. When false, strings are folded
    /// to lower case before serialization.
    pub case_sensitive: bool,

    pub lock_timeout_ms: u64,
}

impl ValueIndexConfig {
    /// Parse the `[indexer]` table of a TOML document. A missing table
    /// yields the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        let config = file.indexer;

        if config.lock_timeout_ms == 0 {
            return Err(ConfigError::ZeroLockTimeout);
        }

        Ok(config)
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for ValueIndexConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    indexer: ValueIndexConfig,
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{ConfigError, DEFAULT_LOCK_TIMEOUT_MS, ValueIndexConfig};

    #[test]
    fn empty_document_yields_defaults() {
        let config = ValueIndexConfig::from_toml_str("").expect("empty config should parse");

        assert_eq!(config, ValueIndexConfig::default());
        assert!(config.case_sensitive);
        assert_eq!(config.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
    }

    #[test]
    fn indexer_table_overrides_defaults() {
        let config = ValueIndexConfig::from_toml_str(
            "[indexer]\ncase-sensitive = false\nlock-timeout-ms = 50\n",
        )
        .expect("indexer table should parse");

        assert!(!config.case_sensitive);
        assert_eq!(config.lock_timeout().as_millis(), 50);
    }

    #[test]
    fn unknown_indexer_key_is_rejected() {
        let err = ValueIndexConfig::from_toml_str("[indexer]\nstemming = true\n")
            .expect_err("unknown keys should be rejected");

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_lock_timeout_is_rejected() {
        let err = ValueIndexConfig::from_toml_str("[indexer]\nlock-timeout-ms = 0\n")
            .expect_err("zero timeout should be rejected");

        assert!(matches!(err, ConfigError::ZeroLockTimeout));
    }
}
