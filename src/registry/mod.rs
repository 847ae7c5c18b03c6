//! Read-only client surface over the remote allowlist registry.
//!
//! The registry is reached in two hops: the configured router contract
//! resolves the current allowlist contract, and every membership read goes
//! to that contract. All reads take an explicit block height so that the
//! paged calls of one sync cycle observe the same state.

pub mod memory;

use async_trait::async_trait;
use semver::Version;
use thiserror::Error;

use crate::address::Address;

pub use memory::{InMemoryRegistry, RegistryCall};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("failed to decode registry response: {0}")]
    Decode(String),
    #[error("registry call reverted: {0}")]
    Reverted(String),
    #[error("no semantic version in type-and-version string '{0}'")]
    MalformedVersion(String),
}

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Latest block height known to the RPC endpoint.
    async fn latest_block_height(&self) -> Result<u64, RegistryError>;

    /// Allowlist contract currently routed by the registry. `Address::ZERO` if unset.
    async fn allowlist_address(&self, at_height: u64) -> Result<Address, RegistryError>;

    /// Raw type-and-version string, e.g. `"TermsOfServiceAllowList v1.1.0"`.
    async fn type_and_version(&self, contract: Address, at_height: u64) -> Result<String, RegistryError>;

    async fn get_all_allowed_senders(
        &self,
        contract: Address,
        at_height: u64,
    ) -> Result<Vec<Address>, RegistryError>;

    async fn get_allowed_senders_count(&self, contract: Address, at_height: u64) -> Result<u64, RegistryError>;

    /// Allowed senders with index in `start..=end`.
    async fn get_allowed_senders_in_range(
        &self,
        contract: Address,
        start: u64,
        end: u64,
        at_height: u64,
    ) -> Result<Vec<Address>, RegistryError>;

    async fn get_blocked_senders_count(&self, contract: Address, at_height: u64) -> Result<u64, RegistryError>;

    /// Blocked senders with index in `start..=end`.
    async fn get_blocked_senders_in_range(
        &self,
        contract: Address,
        start: u64,
        end: u64,
        at_height: u64,
    ) -> Result<Vec<Address>, RegistryError>;
}

/// Pull the `vMAJOR.MINOR.PATCH` token out of a type-and-version string.
pub fn parse_type_and_version(type_and_version: &str) -> Result<Version, RegistryError> {
    type_and_version
        .split_whitespace()
        .filter_map(|token| token.strip_prefix('v'))
        .find_map(|token| Version::parse(token).ok())
        .ok_or_else(|| RegistryError::MalformedVersion(type_and_version.to_string()))
}
