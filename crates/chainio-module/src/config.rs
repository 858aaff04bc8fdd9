//! ChainReader configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder setters
//! 2. Environment variables (`from_env`)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use chainio_module::config::ReaderConfig;
//!
//! let config = ReaderConfig::from_env()
//!     .iovs(16)
//!     .greedy(true);
//! config.validate()?;
//! ```

use chainio_core::constants::IOV_MAX;
use chainio_core::env::{env_get, env_get_bool, env_get_opt};
use chainio_core::{kinfo, Mechanism};

/// Library defaults.
pub mod defaults {
    use chainio_core::constants::IOVS_PREALLOCATE;

    /// Scatter entries per read call.
    pub const IOVS: usize = IOVS_PREALLOCATE;
    /// Refresh the hint with `FIONREAD` after a read that filled the chain.
    pub const QUERY_PENDING: bool = cfg!(unix);
    /// Keep `ready` set after short reads.
    pub const GREEDY: bool = false;
}

/// How a `ChainReader` talks to the event layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Entry vector capacity (bounds the `iovcnt` of one readv).
    pub iovs: usize,
    /// Readiness strategy of the notification layer.
    pub mechanism: Mechanism,
    /// Query pending bytes when the hint is unknown and the chain filled up.
    pub query_pending: bool,
    /// Optimistic edge-triggered policy: more data may be pending even
    /// after a short read, so `ready` is not cleared.
    pub greedy: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderConfig {
    /// Library defaults, no environment lookups.
    pub fn new() -> Self {
        Self {
            iovs: defaults::IOVS,
            mechanism: Mechanism::platform_default(),
            query_pending: defaults::QUERY_PENDING,
            greedy: defaults::GREEDY,
        }
    }

    /// Defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `CHAINIO_IOVS` - Scatter entries per read
    /// - `CHAINIO_MECHANISM` - `counted`, `edge` or `level`
    /// - `CHAINIO_QUERY_PENDING` - FIONREAD refresh (0/1)
    /// - `CHAINIO_GREEDY` - Optimistic edge-triggered reads (0/1)
    pub fn from_env() -> Self {
        Self {
            iovs: env_get("CHAINIO_IOVS", defaults::IOVS),
            mechanism: env_get_opt("CHAINIO_MECHANISM").unwrap_or_else(Mechanism::platform_default),
            query_pending: env_get_bool("CHAINIO_QUERY_PENDING", defaults::QUERY_PENDING),
            greedy: env_get_bool("CHAINIO_GREEDY", defaults::GREEDY),
        }
    }

    pub fn iovs(mut self, n: usize) -> Self {
        self.iovs = n;
        self
    }

    pub fn mechanism(mut self, m: Mechanism) -> Self {
        self.mechanism = m;
        self
    }

    pub fn query_pending(mut self, enable: bool) -> Self {
        self.query_pending = enable;
        self
    }

    pub fn greedy(mut self, enable: bool) -> Self {
        self.greedy = enable;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iovs == 0 {
            return Err(ConfigError::InvalidValue("iovs must be at least 1"));
        }
        if self.iovs > IOV_MAX {
            return Err(ConfigError::InvalidValue("iovs exceeds IOV_MAX"));
        }
        Ok(())
    }

    /// Log the effective settings at info level.
    pub fn log_summary(&self) {
        kinfo!(
            "reader config: iovs={} mechanism={} query_pending={} greedy={}",
            self.iovs,
            self.mechanism,
            self.query_pending,
            self.greedy
        );
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid reader config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ReaderConfig::new();
        assert_eq!(config.iovs, 64);
        assert!(!config.greedy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ReaderConfig::new()
            .iovs(2)
            .mechanism(Mechanism::Counted)
            .query_pending(false)
            .greedy(true);

        assert_eq!(config.iovs, 2);
        assert_eq!(config.mechanism, Mechanism::Counted);
        assert!(!config.query_pending);
        assert!(config.greedy);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            ReaderConfig::new().iovs(0).validate(),
            Err(ConfigError::InvalidValue("iovs must be at least 1"))
        );
        assert!(ReaderConfig::new().iovs(IOV_MAX + 1).validate().is_err());
        assert!(ReaderConfig::new().iovs(IOV_MAX).validate().is_ok());
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("CHAINIO_IOVS", "8");
        std::env::set_var("CHAINIO_MECHANISM", "level");
        std::env::set_var("CHAINIO_GREEDY", "1");
        let config = ReaderConfig::from_env();
        std::env::remove_var("CHAINIO_IOVS");
        std::env::remove_var("CHAINIO_MECHANISM");
        std::env::remove_var("CHAINIO_GREEDY");

        assert_eq!(config.iovs, 8);
        assert_eq!(config.mechanism, Mechanism::Level);
        assert!(config.greedy);
    }
}
