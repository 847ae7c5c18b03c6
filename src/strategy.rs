//! Version-gated reconciliation of the allowlist against the registry.
//!
//! Registries older than [`BATCH_CAPABLE_VERSION`] only expose a single
//! "give me everything" call, so the store is purged and rewritten each
//! cycle. Newer registries expose counts and inclusive index ranges for both
//! the allowed and the blocked set:
//!
//! 1. blocked senders are walked lowest index first and deleted from the store;
//! 2. allowed senders are walked highest index first, each page persisted
//!    as soon as it arrives, so an interrupted cycle has already stored the
//!    newest registrations.
//!
//! Either way the cache receives the complete fetched list in one swap.
//! Store failures are logged and counted, never fatal: the cache only
//! depends on what the registry returned.

use std::fmt;

use semver::Version;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::cache::AllowlistCache;
use crate::fetcher::{BatchFetcher, Cancelled, Direction};
use crate::registry::{parse_type_and_version, RegistryClient, RegistryError};
use crate::storage::traits::AllowlistStore;

/// First registry version exposing paged count/range accessors.
pub const BATCH_CAPABLE_VERSION: Version = Version::new(1, 1, 0);

/// Upper bound on up-front allocation for a remotely reported count.
const MAX_PREALLOC: u64 = 100_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("registry call {call} failed: {source}")]
    Registry {
        call: &'static str,
        #[source]
        source: RegistryError,
    },
    #[error("registry {0} has no allowlist route set")]
    RouteUnset(Address),
    #[error("sync cycle timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("sync cycle cancelled")]
    Cancelled,
}

impl From<Cancelled> for SyncError {
    fn from(_: Cancelled) -> Self {
        SyncError::Cancelled
    }
}

impl SyncError {
    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Registry { .. } | Self::RouteUnset(_) => "error",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

fn rpc(call: &'static str) -> impl FnOnce(RegistryError) -> SyncError {
    move |source| {
        crate::metrics::record_registry_error(call);
        SyncError::Registry { call, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Single get-all call, purge and rewrite the store
    Legacy,
    /// Count + range accessors, blocked reconciliation, newest-first fetch
    Batched,
}

impl StrategyKind {
    #[must_use]
    pub fn for_version(version: &Version) -> Self {
        if *version >= BATCH_CAPABLE_VERSION {
            Self::Batched
        } else {
            Self::Legacy
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Batched => "batched",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one successful sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub strategy: StrategyKind,
    pub version: Version,
    pub contract: Address,
    pub target_height: u64,
    /// Identities published to the cache
    pub allowed: usize,
    /// Blocked identities removed from the store (batched only)
    pub blocked_removed: usize,
    /// Store calls that failed and were skipped
    pub persist_failures: usize,
}

/// One cycle's worth of collaborators, borrowed from the engine.
pub struct VersionedSyncStrategy<'a> {
    client: &'a dyn RegistryClient,
    store: &'a dyn AllowlistStore,
    cache: &'a AllowlistCache,
    fetcher: BatchFetcher,
    persistence_enabled: bool,
}

impl<'a> VersionedSyncStrategy<'a> {
    #[must_use]
    pub fn new(
        client: &'a dyn RegistryClient,
        store: &'a dyn AllowlistStore,
        cache: &'a AllowlistCache,
        fetcher: BatchFetcher,
        persistence_enabled: bool,
    ) -> Self {
        Self { client, store, cache, fetcher, persistence_enabled }
    }

    /// Resolve the allowlist contract, read its version and run the matching strategy at `target_height`.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn run(&self, target_height: u64, cancel: &CancellationToken) -> Result<SyncReport, SyncError> {
        let contract = self
            .client
            .allowlist_address(target_height)
            .await
            .map_err(rpc("allowlist_address"))?;
        if contract.is_zero() {
            return Err(SyncError::RouteUnset(self.store.registry()));
        }

        let type_and_version = self
            .client
            .type_and_version(contract, target_height)
            .await
            .map_err(rpc("type_and_version"))?;
        let version = parse_type_and_version(&type_and_version).map_err(rpc("type_and_version"))?;
        let strategy = StrategyKind::for_version(&version);
        debug!(%contract, %version, %strategy, "Selected allowlist sync strategy");

        let mut report = SyncReport {
            strategy,
            version,
            contract,
            target_height,
            allowed: 0,
            blocked_removed: 0,
            persist_failures: 0,
        };

        let allowed = match strategy {
            StrategyKind::Legacy => self.sync_legacy(&mut report).await?,
            StrategyKind::Batched => {
                self.reconcile_blocked(&mut report, cancel).await?;
                self.fetch_allowed_batched(&mut report, cancel).await?
            }
        };

        report.allowed = allowed.len();
        self.cache.update(allowed);
        Ok(report)
    }

    async fn sync_legacy(&self, report: &mut SyncReport) -> Result<Vec<Address>, SyncError> {
        let allowed = self
            .client
            .get_all_allowed_senders(report.contract, report.target_height)
            .await
            .map_err(rpc("get_all_allowed_senders"))?;
        crate::metrics::record_page_fetched("allowed", allowed.len());

        if self.persistence_enabled {
            if let Err(e) = self.store.purge_allowed_senders().await {
                warn!(error = %e, "Failed to purge stored allowed senders");
                crate::metrics::record_persistence_error("purge");
                report.persist_failures += 1;
            }
            if let Err(e) = self.store.create_allowed_senders(&allowed).await {
                warn!(error = %e, count = allowed.len(), "Failed to store allowed senders");
                crate::metrics::record_persistence_error("create");
                report.persist_failures += 1;
            }
        }

        Ok(allowed)
    }

    async fn reconcile_blocked(&self, report: &mut SyncReport, cancel: &CancellationToken) -> Result<(), SyncError> {
        let count = self
            .client
            .get_blocked_senders_count(report.contract, report.target_height)
            .await
            .map_err(rpc("get_blocked_senders_count"))?;

        let mut pages = self.fetcher.pages(count, Direction::Ascending, cancel);
        while let Some(range) = pages.next_range().await? {
            let blocked = self
                .client
                .get_blocked_senders_in_range(report.contract, range.start, range.end, report.target_height)
                .await
                .map_err(rpc("get_blocked_senders_in_range"))?;
            crate::metrics::record_page_fetched("blocked", blocked.len());

            if self.persistence_enabled {
                if let Err(e) = self.store.delete_allowed_senders(&blocked).await {
                    warn!(error = %e, %range, "Failed to delete blocked senders from store");
                    crate::metrics::record_persistence_error("delete");
                    report.persist_failures += 1;
                    continue;
                }
            }
            report.blocked_removed += blocked.len();
        }

        Ok(())
    }

    async fn fetch_allowed_batched(
        &self,
        report: &mut SyncReport,
        cancel: &CancellationToken,
    ) -> Result<Vec<Address>, SyncError> {
        let count = self
            .client
            .get_allowed_senders_count(report.contract, report.target_height)
            .await
            .map_err(rpc("get_allowed_senders_count"))?;

        let mut allowed = Vec::with_capacity(count.min(MAX_PREALLOC) as usize);
        let mut pages = self.fetcher.pages(count, Direction::Descending, cancel);
        while let Some(range) = pages.next_range().await? {
            let page = self
                .client
                .get_allowed_senders_in_range(report.contract, range.start, range.end, report.target_height)
                .await
                .map_err(rpc("get_allowed_senders_in_range"))?;
            crate::metrics::record_page_fetched("allowed", page.len());

            if self.persistence_enabled {
                if let Err(e) = self.store.create_allowed_senders(&page).await {
                    warn!(error = %e, %range, "Failed to store allowed senders page");
                    crate::metrics::record_persistence_error("create");
                    report.persist_failures += 1;
                }
            }
            allowed.extend(page);
        }

        info!(count, fetched = allowed.len(), "Fetched allowed senders in batches");
        Ok(allowed)
    }
}
