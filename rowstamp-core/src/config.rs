//! Configuration types

use crate::{ConfigError, RowstampError, RowstampResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-operation timeout in milliseconds.
pub const DEFAULT_OP_TIMEOUT_MS: u64 = 5_000;

/// Default LMDB map size in megabytes.
pub const DEFAULT_MAP_SIZE_MB: usize = 64;

/// Largest accepted LMDB map size in megabytes (1 TiB).
pub const MAX_MAP_SIZE_MB: usize = 1 << 20;

// ============================================================================
// STORE CONFIG
// ============================================================================

/// Configuration for a versioned record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upper bound on how long a single operation may wait for the backend.
    /// Expiry is reported as `StorageUnavailable`.
    pub op_timeout: Duration,
    /// Directory for the durable backend. Not used by the in-memory backend.
    pub data_dir: Option<PathBuf>,
    /// Maximum size of the LMDB map in megabytes.
    pub map_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_millis(DEFAULT_OP_TIMEOUT_MS),
            data_dir: None,
            map_size_mb: DEFAULT_MAP_SIZE_MB,
        }
    }
}

impl StoreConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `ROWSTAMP_OP_TIMEOUT_MS`: Per-operation timeout (default: 5000)
    /// - `ROWSTAMP_DATA_DIR`: Directory for the LMDB backend (default: unset)
    /// - `ROWSTAMP_MAP_SIZE_MB`: LMDB map size (default: 64)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            op_timeout: std::env::var("ROWSTAMP_OP_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.op_timeout),
            data_dir: std::env::var("ROWSTAMP_DATA_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .or(defaults.data_dir),
            map_size_mb: std::env::var("ROWSTAMP_MAP_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.map_size_mb),
        }
    }

    /// Builder-style override of the operation timeout.
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Builder-style override of the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - op_timeout > 0
    /// - 0 < map_size_mb <= MAX_MAP_SIZE_MB
    pub fn validate(&self) -> RowstampResult<()> {
        if self.op_timeout.is_zero() {
            return Err(RowstampError::Config(ConfigError::InvalidValue {
                field: "op_timeout".to_string(),
                value: format!("{:?}", self.op_timeout),
                reason: "op_timeout must be positive".to_string(),
            }));
        }

        if self.map_size_mb == 0 {
            return Err(RowstampError::Config(ConfigError::InvalidValue {
                field: "map_size_mb".to_string(),
                value: self.map_size_mb.to_string(),
                reason: "map_size_mb must be greater than 0".to_string(),
            }));
        }

        if self.map_size_mb > MAX_MAP_SIZE_MB {
            return Err(RowstampError::Config(ConfigError::InvalidValue {
                field: "map_size_mb".to_string(),
                value: self.map_size_mb.to_string(),
                reason: format!("map_size_mb must be at most {}", MAX_MAP_SIZE_MB),
            }));
        }

        Ok(())
    }

    /// The data directory, or a `MissingRequired` error when unset.
    pub fn require_data_dir(&self) -> RowstampResult<&PathBuf> {
        self.data_dir.as_ref().ok_or_else(|| {
            RowstampError::Config(ConfigError::MissingRequired {
                field: "data_dir".to_string(),
            })
        })
    }
}

// ============================================================================
// RETRY CONFIG
// ============================================================================

/// Backoff policy for callers that choose to retry after a conflict.
///
/// The store never consults this; it exists for caller-side retry loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = f64::from(self.backoff_multiplier).powi(exponent);
        let micros = self.initial_backoff.as_micros() as f64 * factor;
        let capped = micros.min(self.max_backoff.as_micros() as f64);
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_micros(capped.round() as u64)
        } else {
            self.max_backoff
        }
    }

    /// Validate the retry policy.
    pub fn validate(&self) -> RowstampResult<()> {
        if self.max_attempts == 0 {
            return Err(RowstampError::Config(ConfigError::InvalidValue {
                field: "max_attempts".to_string(),
                value: self.max_attempts.to_string(),
                reason: "max_attempts must be at least 1".to_string(),
            }));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(RowstampError::Config(ConfigError::InvalidValue {
                field: "backoff_multiplier".to_string(),
                value: self.backoff_multiplier.to_string(),
                reason: "backoff_multiplier must be at least 1.0".to_string(),
            }));
        }

        if self.initial_backoff > self.max_backoff {
            return Err(RowstampError::Config(ConfigError::InvalidValue {
                field: "initial_backoff".to_string(),
                value: format!("{:?}", self.initial_backoff),
                reason: "initial_backoff must not exceed max_backoff".to_string(),
            }));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_config_is_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.op_timeout, Duration::from_millis(DEFAULT_OP_TIMEOUT_MS));
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = StoreConfig::default().with_op_timeout(Duration::ZERO);
        match config.validate() {
            Err(RowstampError::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, "op_timeout");
            }
            other => panic!("expected invalid op_timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_map_size_is_rejected() {
        let config = StoreConfig {
            map_size_mb: 0,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_map_is_rejected() {
        let config = StoreConfig {
            map_size_mb: usize::MAX / 1024,
            ..StoreConfig::default()
        };
        match config.validate() {
            Err(RowstampError::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, "map_size_mb");
            }
            other => panic!("expected invalid map_size_mb, got {:?}", other),
        }

        let at_limit = StoreConfig {
            map_size_mb: MAX_MAP_SIZE_MB,
            ..StoreConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_require_data_dir() {
        let config = StoreConfig::default();
        assert!(matches!(
            config.require_data_dir(),
            Err(RowstampError::Config(ConfigError::MissingRequired { .. }))
        ));

        let config = config.with_data_dir("/tmp/rowstamp");
        assert_eq!(
            config.require_data_dir().unwrap(),
            &PathBuf::from("/tmp/rowstamp")
        );
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetryConfig {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.backoff_for(1), Duration::from_millis(10));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(20));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(40));
        assert_eq!(retry.backoff_for(4), Duration::from_millis(50));
        assert_eq!(retry.backoff_for(40), Duration::from_millis(50));
    }

    #[test]
    fn test_retry_config_validation() {
        assert!(RetryConfig::default().validate().is_ok());

        let zero_attempts = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert!(zero_attempts.validate().is_err());

        let shrinking = RetryConfig {
            backoff_multiplier: 0.5,
            ..RetryConfig::default()
        };
        assert!(shrinking.validate().is_err());
    }
}
