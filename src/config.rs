//! Process configuration.
//!
//! JSON, every field optional:
//!
//! ```json
//! {
//!   "cache": { "max_subscriptions": 4096, "orphan_ttl_secs": 300, "reap_interval_ms": 1000 },
//!   "store": { "watch_buffer": 1024 },
//!   "singletons": [ { "group": "hooks", "name": "cors", "kind": "response_header",
//!                     "args": { "headers": { "access-control-allow-origin": "*" } } } ]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::hooks::SingletonSpec;
use crate::store::MemoryStoreConfig;
use crate::subscription::CacheConfig;

/// Subscription cache section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    /// Max live subscriptions.
    pub max_subscriptions: usize,
    /// Seconds an unattached subscription survives.
    pub orphan_ttl_secs: u64,
    /// Reaper tick in milliseconds.
    pub reap_interval_ms: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            max_subscriptions: defaults.max_subscriptions,
            orphan_ttl_secs: defaults.orphan_ttl.as_secs(),
            reap_interval_ms: 1000,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedHookConfig {
    /// Subscription cache limits.
    pub cache: CacheSection,
    /// In-memory change store tuning.
    pub store: MemoryStoreConfig,
    /// Named singletons created at startup.
    pub singletons: Vec<SingletonSpec>,
}

impl FeedHookConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    /// `Parse` on malformed JSON, `Invalid` when a value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads, parses and validates a JSON file.
    ///
    /// # Errors
    /// `Io` when the file cannot be read, otherwise as [`Self::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// `Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_subscriptions == 0 {
            return Err(invalid("cache.max_subscriptions must be greater than zero"));
        }
        if self.cache.orphan_ttl_secs == 0 {
            return Err(invalid("cache.orphan_ttl_secs must be greater than zero"));
        }
        if self.cache.reap_interval_ms == 0 {
            return Err(invalid("cache.reap_interval_ms must be greater than zero"));
        }
        if self.store.watch_buffer == 0 {
            return Err(invalid("store.watch_buffer must be greater than zero"));
        }
        if let Some(spec) = self.singletons.iter().find(|s| s.name.trim().is_empty()) {
            return Err(invalid(format!("singleton of kind '{}' has an empty name", spec.kind)));
        }
        Ok(())
    }

    /// Cache limits in runtime form.
    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_subscriptions: self.cache.max_subscriptions,
            orphan_ttl: Duration::from_secs(self.cache.orphan_ttl_secs),
            reap_interval: Duration::from_millis(self.cache.reap_interval_ms),
        }
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}
