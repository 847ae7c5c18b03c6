use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::address::Address;
use super::{RegistryClient, RegistryError};

/// A single call observed by [`InMemoryRegistry`], with the height it was pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryCall {
    LatestBlockHeight,
    AllowlistAddress { at: u64 },
    TypeAndVersion { at: u64 },
    GetAllAllowedSenders { at: u64 },
    AllowedSendersCount { at: u64 },
    AllowedSendersInRange { start: u64, end: u64, at: u64 },
    BlockedSendersCount { at: u64 },
    BlockedSendersInRange { start: u64, end: u64, at: u64 },
}

struct RegistryState {
    height: u64,
    allowlist: Address,
    type_and_version: String,
    allowed: Vec<Address>,
    blocked: Vec<Address>,
    calls: Vec<RegistryCall>,
    fail_ranges: bool,
    fail_height: bool,
    height_latency: Duration,
}

/// Scriptable in-process registry.
///
/// Behaves like the on-chain contract: range reads are inclusive and revert
/// when they run past the end of the list. Every call is recorded so tests
/// can assert on the exact access pattern.
pub struct InMemoryRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new(type_and_version: &str) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                height: 100,
                allowlist: Address::from_low_u64(0xA11),
                type_and_version: type_and_version.to_string(),
                allowed: Vec::new(),
                blocked: Vec::new(),
                calls: Vec::new(),
                fail_ranges: false,
                fail_height: false,
                height_latency: Duration::ZERO,
            }),
        }
    }

    #[must_use]
    pub fn with_allowed(self, allowed: Vec<Address>) -> Self {
        self.set_allowed(allowed);
        self
    }

    #[must_use]
    pub fn with_blocked(self, blocked: Vec<Address>) -> Self {
        self.set_blocked(blocked);
        self
    }

    pub fn set_allowed(&self, allowed: Vec<Address>) {
        self.state.lock().allowed = allowed;
    }

    pub fn set_blocked(&self, blocked: Vec<Address>) {
        self.state.lock().blocked = blocked;
    }

    pub fn set_type_and_version(&self, type_and_version: &str) {
        self.state.lock().type_and_version = type_and_version.to_string();
    }

    pub fn set_height(&self, height: u64) {
        self.state.lock().height = height;
    }

    /// Route the registry to `contract`. `Address::ZERO` leaves the route unset.
    pub fn set_allowlist_address(&self, contract: Address) {
        self.state.lock().allowlist = contract;
    }

    /// Make every `*_in_range` call fail with an RPC error.
    pub fn set_failing_ranges(&self, fail: bool) {
        self.state.lock().fail_ranges = fail;
    }

    /// Make `latest_block_height` fail with an RPC error.
    pub fn set_failing_height(&self, fail: bool) {
        self.state.lock().fail_height = fail;
    }

    /// Delay every `latest_block_height` response, simulating a slow endpoint.
    pub fn set_height_latency(&self, latency: Duration) {
        self.state.lock().height_latency = latency;
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: RegistryCall) {
        self.state.lock().calls.push(call);
    }

    fn check_contract(&self, contract: Address) -> Result<(), RegistryError> {
        let routed = self.state.lock().allowlist;
        if contract != routed {
            return Err(RegistryError::Reverted(format!("no contract at {}", contract)));
        }
        Ok(())
    }

    fn slice_inclusive(list: &[Address], start: u64, end: u64) -> Result<Vec<Address>, RegistryError> {
        if start > end || end >= list.len() as u64 {
            return Err(RegistryError::Reverted(format!(
                "invalid range [{}, {}] for {} entries",
                start,
                end,
                list.len()
            )));
        }
        Ok(list[start as usize..=end as usize].to_vec())
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn latest_block_height(&self) -> Result<u64, RegistryError> {
        self.record(RegistryCall::LatestBlockHeight);
        let latency = self.state.lock().height_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let state = self.state.lock();
        if state.fail_height {
            return Err(RegistryError::Rpc("connection refused".into()));
        }
        Ok(state.height)
    }

    async fn allowlist_address(&self, at_height: u64) -> Result<Address, RegistryError> {
        self.record(RegistryCall::AllowlistAddress { at: at_height });
        Ok(self.state.lock().allowlist)
    }

    async fn type_and_version(&self, contract: Address, at_height: u64) -> Result<String, RegistryError> {
        self.record(RegistryCall::TypeAndVersion { at: at_height });
        self.check_contract(contract)?;
        Ok(self.state.lock().type_and_version.clone())
    }

    async fn get_all_allowed_senders(
        &self,
        contract: Address,
        at_height: u64,
    ) -> Result<Vec<Address>, RegistryError> {
        self.record(RegistryCall::GetAllAllowedSenders { at: at_height });
        self.check_contract(contract)?;
        Ok(self.state.lock().allowed.clone())
    }

    async fn get_allowed_senders_count(&self, contract: Address, at_height: u64) -> Result<u64, RegistryError> {
        self.record(RegistryCall::AllowedSendersCount { at: at_height });
        self.check_contract(contract)?;
        Ok(self.state.lock().allowed.len() as u64)
    }

    async fn get_allowed_senders_in_range(
        &self,
        contract: Address,
        start: u64,
        end: u64,
        at_height: u64,
    ) -> Result<Vec<Address>, RegistryError> {
        self.record(RegistryCall::AllowedSendersInRange { start, end, at: at_height });
        self.check_contract(contract)?;
        let state = self.state.lock();
        if state.fail_ranges {
            return Err(RegistryError::Rpc("request timed out".into()));
        }
        Self::slice_inclusive(&state.allowed, start, end)
    }

    async fn get_blocked_senders_count(&self, contract: Address, at_height: u64) -> Result<u64, RegistryError> {
        self.record(RegistryCall::BlockedSendersCount { at: at_height });
        self.check_contract(contract)?;
        Ok(self.state.lock().blocked.len() as u64)
    }

    async fn get_blocked_senders_in_range(
        &self,
        contract: Address,
        start: u64,
        end: u64,
        at_height: u64,
    ) -> Result<Vec<Address>, RegistryError> {
        self.record(RegistryCall::BlockedSendersInRange { start, end, at: at_height });
        self.check_contract(contract)?;
        let state = self.state.lock();
        if state.fail_ranges {
            return Err(RegistryError::Rpc("request timed out".into()));
        }
        Self::slice_inclusive(&state.blocked, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(range: std::ops::Range<u64>) -> Vec<Address> {
        range.map(Address::from_low_u64).collect()
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let registry = InMemoryRegistry::new("AllowList v1.1.0").with_allowed(addrs(0..10));
        let contract = registry.allowlist_address(1).await.unwrap();

        let page = registry.get_allowed_senders_in_range(contract, 2, 4, 1).await.unwrap();
        assert_eq!(page, addrs(2..5));
    }

    #[tokio::test]
    async fn test_range_past_end_reverts() {
        let registry = InMemoryRegistry::new("AllowList v1.1.0").with_blocked(addrs(0..3));
        let contract = registry.allowlist_address(1).await.unwrap();

        let err = registry.get_blocked_senders_in_range(contract, 0, 3, 1).await.unwrap_err();
        assert!(matches!(err, RegistryError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_wrong_contract_reverts() {
        let registry = InMemoryRegistry::new("AllowList v1.0.0");
        let err = registry
            .get_all_allowed_senders(Address::from_low_u64(0xBAD), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_calls_are_recorded_with_height() {
        let registry = InMemoryRegistry::new("AllowList v1.0.0");
        registry.set_height(42);

        let height = registry.latest_block_height().await.unwrap();
        let contract = registry.allowlist_address(height).await.unwrap();
        registry.type_and_version(contract, height).await.unwrap();

        assert_eq!(
            registry.calls(),
            vec![
                RegistryCall::LatestBlockHeight,
                RegistryCall::AllowlistAddress { at: 42 },
                RegistryCall::TypeAndVersion { at: 42 },
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let registry = InMemoryRegistry::new("AllowList v1.1.0").with_allowed(addrs(0..5));
        registry.set_failing_height(true);
        assert!(registry.latest_block_height().await.is_err());

        registry.set_failing_ranges(true);
        let contract = registry.allowlist_address(1).await.unwrap();
        assert!(matches!(
            registry.get_allowed_senders_in_range(contract, 0, 1, 1).await,
            Err(RegistryError::Rpc(_))
        ));
    }
}
