//! Lock-free allowlist cache.
//!
//! The current [`AllowlistSnapshot`] lives behind an [`ArcSwap`]: readers do a
//! single atomic load, the sync worker publishes a freshly built snapshot with
//! a single atomic store. Readers never wait and never observe a half-built
//! set.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::address::Address;

/// Immutable point-in-time view of the allowlist.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AllowlistSnapshot {
    members: HashSet<Address>,
}

impl AllowlistSnapshot {
    #[must_use]
    pub fn new<I: IntoIterator<Item = Address>>(members: I) -> Self {
        Self { members: members.into_iter().collect() }
    }

    #[must_use]
    pub fn contains(&self, identity: &Address) -> bool {
        self.members.contains(identity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Concurrent membership cache.
///
/// Share it as `Arc<AllowlistCache>`; the engine is the only writer.
pub struct AllowlistCache {
    current: ArcSwap<AllowlistSnapshot>,
    generation: AtomicU64,
}

impl AllowlistCache {
    /// Empty cache: `allow` is false for everything until the first update.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(AllowlistSnapshot::default()),
            generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn allow(&self, identity: &Address) -> bool {
        self.current.load().contains(identity)
    }

    /// Replace the whole allowlist. Previous members not in `identities` are dropped.
    pub fn update<I: IntoIterator<Item = Address>>(&self, identities: I) {
        let snapshot = Arc::new(AllowlistSnapshot::new(identities));
        let size = snapshot.len();
        self.current.store(snapshot);
        self.generation.fetch_add(1, Ordering::Release);
        crate::metrics::set_allowlist_size(size);
    }

    /// The snapshot currently being served.
    #[must_use]
    pub fn snapshot(&self) -> Arc<AllowlistSnapshot> {
        self.current.load_full()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Number of snapshots published since construction.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for AllowlistCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AllowlistCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowlistCache")
            .field("len", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}
