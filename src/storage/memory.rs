use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::address::Address;
use super::traits::{AllowlistStore, StorageError};

/// Rows keyed by (registry, sender), valued by insertion sequence.
#[derive(Default)]
struct SharedTable {
    rows: DashMap<(Address, Address), u64>,
    next_seq: AtomicU64,
}

/// In-memory [`AllowlistStore`].
///
/// Handles created with [`scoped`](Self::scoped) share one table, the way
/// several registries can share a single SQL database.
#[derive(Clone)]
pub struct MemoryAllowlistStore {
    table: Arc<SharedTable>,
    registry: Address,
}

impl MemoryAllowlistStore {
    #[must_use]
    pub fn new(registry: Address) -> Self {
        Self {
            table: Arc::new(SharedTable::default()),
            registry,
        }
    }

    /// Another handle on the same table, scoped to a different registry.
    #[must_use]
    pub fn scoped(&self, registry: Address) -> Self {
        Self {
            table: self.table.clone(),
            registry,
        }
    }

    /// Rows stored for this registry
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.rows.iter().filter(|r| r.key().0 == self.registry).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, sender: &Address) -> bool {
        self.table.rows.contains_key(&(self.registry, *sender))
    }
}

#[async_trait]
impl AllowlistStore for MemoryAllowlistStore {
    fn registry(&self) -> Address {
        self.registry
    }

    async fn get_allowed_senders(&self, offset: u64, limit: usize) -> Result<Vec<Address>, StorageError> {
        let mut rows: Vec<(u64, Address)> = self
            .table
            .rows
            .iter()
            .filter(|r| r.key().0 == self.registry)
            .map(|r| (*r.value(), r.key().1))
            .collect();
        rows.sort_unstable_by_key(|(seq, _)| *seq);

        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit)
            .map(|(_, sender)| sender)
            .collect())
    }

    async fn create_allowed_senders(&self, senders: &[Address]) -> Result<(), StorageError> {
        for sender in senders {
            self.table
                .rows
                .entry((self.registry, *sender))
                .or_insert_with(|| self.table.next_seq.fetch_add(1, Ordering::Relaxed));
        }
        Ok(())
    }

    async fn delete_allowed_senders(&self, senders: &[Address]) -> Result<(), StorageError> {
        for sender in senders {
            self.table.rows.remove(&(self.registry, *sender));
        }
        Ok(())
    }

    async fn purge_allowed_senders(&self) -> Result<(), StorageError> {
        self.table.rows.retain(|(registry, _), _| *registry != self.registry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn registry() -> Address {
        Address::from_low_u64(0xF00)
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = MemoryAllowlistStore::new(registry());
        assert!(store.is_empty());
        assert!(store.get_allowed_senders(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pages_in_insertion_order() {
        let store = MemoryAllowlistStore::new(registry());
        store.create_allowed_senders(&[addr(3), addr(1), addr(2)]).await.unwrap();
        store.create_allowed_senders(&[addr(9)]).await.unwrap();

        assert_eq!(store.get_allowed_senders(0, 2).await.unwrap(), vec![addr(3), addr(1)]);
        assert_eq!(store.get_allowed_senders(2, 2).await.unwrap(), vec![addr(2), addr(9)]);
        assert!(store.get_allowed_senders(4, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let once = MemoryAllowlistStore::new(registry());
        once.create_allowed_senders(&[addr(1), addr(2), addr(3)]).await.unwrap();

        let twice = MemoryAllowlistStore::new(registry());
        twice.create_allowed_senders(&[addr(1), addr(2)]).await.unwrap();
        twice.create_allowed_senders(&[addr(2), addr(3)]).await.unwrap();
        twice.create_allowed_senders(&[]).await.unwrap();

        assert_eq!(
            once.get_allowed_senders(0, 10).await.unwrap(),
            twice.get_allowed_senders(0, 10).await.unwrap()
        );
        assert_eq!(twice.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryAllowlistStore::new(registry());
        store.create_allowed_senders(&[addr(1)]).await.unwrap();

        store.delete_allowed_senders(&[addr(1), addr(42)]).await.unwrap();
        store.delete_allowed_senders(&[addr(1)]).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_registries_are_isolated() {
        let a = MemoryAllowlistStore::new(registry());
        let b = a.scoped(Address::from_low_u64(0xB0B));

        a.create_allowed_senders(&[addr(1), addr(2)]).await.unwrap();
        b.create_allowed_senders(&[addr(2), addr(3)]).await.unwrap();

        b.delete_allowed_senders(&[addr(2)]).await.unwrap();
        assert!(a.contains(&addr(2)));

        a.purge_allowed_senders().await.unwrap();
        assert!(a.is_empty());
        assert_eq!(b.get_allowed_senders(0, 10).await.unwrap(), vec![addr(3)]);
    }
}
