//! Configuration for the allowlist sync engine.
//!
//! # Example
//!
//! ```
//! use allowlist_sync::{Address, AllowlistConfig};
//!
//! let config = AllowlistConfig {
//!     registry_address: Address::from_low_u64(0x1234),
//!     update_interval_secs: 30,
//!     update_timeout_secs: 10,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! assert_eq!(config.stored_batch_size, 1000);
//! assert_eq!(config.onchain_batch_size, 100);
//! assert!(config.periodic_enabled());
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::address::Address;

/// The only registry protocol major version this crate understands.
pub const SUPPORTED_CONTRACT_VERSION: u32 = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("registry address is required and must be non-zero")]
    MissingRegistryAddress,
    #[error("unsupported registry contract version {0} (only {SUPPORTED_CONTRACT_VERSION} is supported)")]
    UnsupportedVersion(u32),
    #[error("fetch delay ({delay:?}) must be shorter than the update interval ({interval:?})")]
    DelayNotBelowInterval { delay: Duration, interval: Duration },
    #[error("{0} must be greater than zero")]
    ZeroBatchSize(&'static str),
    #[error("store is scoped to registry {store}, engine is configured for {registry}")]
    StoreScopeMismatch { store: Address, registry: Address },
}

/// Configuration for the allowlist sync engine.
///
/// Setting either `update_interval_secs` or `update_timeout_secs` to zero
/// disables periodic syncing; the cache is then only filled by explicit
/// [`crate::SyncEngine::update_from_contract`] calls.
#[derive(Debug, Clone, Deserialize)]
pub struct AllowlistConfig {
    /// Registry (router) contract to resolve the allowlist from
    pub registry_address: Address,

    /// Declared registry protocol major version
    #[serde(default = "default_contract_version")]
    pub contract_version: u32,

    /// Blocks subtracted from the latest height before querying
    #[serde(default)]
    pub block_confirmations: u64,

    /// Seconds between sync cycles (0 = periodic sync disabled)
    #[serde(default)]
    pub update_interval_secs: u64,

    /// Upper bound on a single periodic sync cycle (0 = periodic sync disabled)
    #[serde(default)]
    pub update_timeout_secs: u64,

    /// Page size when reading the persisted allowlist on startup
    #[serde(default = "default_stored_batch_size")]
    pub stored_batch_size: usize,

    /// Page size for range queries against the registry
    #[serde(default = "default_onchain_batch_size")]
    pub onchain_batch_size: u64,

    /// Pause between consecutive range queries
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,

    /// Persist fetched senders for warm restarts
    #[serde(default = "default_persistence_enabled")]
    pub persistence_enabled: bool,
}

fn default_contract_version() -> u32 { SUPPORTED_CONTRACT_VERSION }
fn default_stored_batch_size() -> usize { 1000 }
fn default_onchain_batch_size() -> u64 { 100 }
fn default_fetch_delay_ms() -> u64 { 1000 }
fn default_persistence_enabled() -> bool { true }

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self {
            registry_address: Address::ZERO,
            contract_version: default_contract_version(),
            block_confirmations: 0,
            update_interval_secs: 0,
            update_timeout_secs: 0,
            stored_batch_size: default_stored_batch_size(),
            onchain_batch_size: default_onchain_batch_size(),
            fetch_delay_ms: default_fetch_delay_ms(),
            persistence_enabled: default_persistence_enabled(),
        }
    }
}

impl AllowlistConfig {
    /// Check every construction-time invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_address.is_zero() {
            return Err(ConfigError::MissingRegistryAddress);
        }
        if self.contract_version != SUPPORTED_CONTRACT_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.contract_version));
        }
        if self.stored_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize("stored_batch_size"));
        }
        if self.onchain_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize("onchain_batch_size"));
        }
        if self.periodic_enabled() && self.fetch_delay() >= self.update_interval() {
            return Err(ConfigError::DelayNotBelowInterval {
                delay: self.fetch_delay(),
                interval: self.update_interval(),
            });
        }
        Ok(())
    }

    /// Whether the background worker should run at all.
    #[must_use]
    pub fn periodic_enabled(&self) -> bool {
        self.update_interval_secs > 0 && self.update_timeout_secs > 0
    }

    #[must_use]
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    #[must_use]
    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }

    #[must_use]
    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AllowlistConfig {
        AllowlistConfig {
            registry_address: Address::from_low_u64(0x1234),
            update_interval_secs: 60,
            update_timeout_secs: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AllowlistConfig::default();
        assert_eq!(config.contract_version, 1);
        assert_eq!(config.stored_batch_size, 1000);
        assert_eq!(config.onchain_batch_size, 100);
        assert_eq!(config.fetch_delay(), Duration::from_secs(1));
        assert!(config.persistence_enabled);
        assert!(!config.periodic_enabled());
    }

    #[test]
    fn test_valid_config_passes() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn test_zero_address_rejected() {
        let config = AllowlistConfig { registry_address: Address::ZERO, ..valid() };
        assert_eq!(config.validate(), Err(ConfigError::MissingRegistryAddress));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let config = AllowlistConfig { contract_version: 2, ..valid() };
        assert_eq!(config.validate(), Err(ConfigError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_delay_must_be_below_interval() {
        let config = AllowlistConfig {
            update_interval_secs: 1,
            fetch_delay_ms: 1000,
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DelayNotBelowInterval { .. })
        ));

        let config = AllowlistConfig { fetch_delay_ms: 999, ..config };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_delay_ignored_when_periodic_disabled() {
        let config = AllowlistConfig {
            update_interval_secs: 0,
            fetch_delay_ms: 60_000,
            ..valid()
        };
        assert!(!config.periodic_enabled());
        assert!(config.validate().is_ok());

        let config = AllowlistConfig { update_interval_secs: 1, update_timeout_secs: 0, ..config };
        assert!(!config.periodic_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_sizes_rejected() {
        let config = AllowlistConfig { onchain_batch_size: 0, ..valid() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize("onchain_batch_size")));

        let config = AllowlistConfig { stored_batch_size: 0, ..valid() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize("stored_batch_size")));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: AllowlistConfig = serde_json::from_value(serde_json::json!({
            "registry_address": "0x00000000000000000000000000000000000000ab",
            "update_interval_secs": 30,
            "update_timeout_secs": 10,
        }))
        .unwrap();

        assert_eq!(config.registry_address, Address::from_low_u64(0xAB));
        assert_eq!(config.onchain_batch_size, 100);
        assert_eq!(config.fetch_delay_ms, 1000);
        assert!(config.validate().is_ok());
    }
}
