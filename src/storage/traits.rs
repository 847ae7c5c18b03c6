use async_trait::async_trait;
use thiserror::Error;

use crate::address::Address;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Corrupt row in allowlist store: {0}")]
    Corruption(String),
}

/// Durable set of allowed senders, scoped to one registry address.
///
/// Implementations hand out handles bound to a single registry; two handles
/// for different registries may share the same underlying table without
/// seeing each other's rows.
#[async_trait]
pub trait AllowlistStore: Send + Sync {
    /// Registry this handle is scoped to.
    fn registry(&self) -> Address;

    /// Page through stored senders in insertion order.
    async fn get_allowed_senders(&self, offset: u64, limit: usize) -> Result<Vec<Address>, StorageError>;

    /// Insert senders. Already-present senders are silently skipped.
    async fn create_allowed_senders(&self, senders: &[Address]) -> Result<(), StorageError>;

    /// Remove senders. Missing senders are ignored.
    async fn delete_allowed_senders(&self, senders: &[Address]) -> Result<(), StorageError>;

    /// Remove every sender stored for this registry.
    async fn purge_allowed_senders(&self) -> Result<(), StorageError>;
}
