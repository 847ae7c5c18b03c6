//! Query and one-shot sync API for the engine.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::address::Address;
use crate::metrics::CycleTimer;
use crate::strategy::{SyncError, SyncReport, VersionedSyncStrategy};

use super::{SyncContext, SyncEngine};

impl SyncEngine {
    /// Whether `identity` is on the current allowlist. Never blocks, never touches the network.
    #[must_use]
    pub fn allow(&self, identity: &Address) -> bool {
        self.ctx.cache.allow(identity)
    }

    /// Run one sync cycle now and wait for it.
    ///
    /// Unlike the periodic worker this is not bounded by the update timeout;
    /// drop the future to abandon it. Errors are returned, not just logged.
    ///
    /// Cycles are serialized: if the worker is mid-cycle this waits for it
    /// to finish before querying the registry.
    #[tracing::instrument(skip(self), fields(registry = %self.ctx.config.registry_address))]
    pub async fn update_from_contract(&self) -> Result<SyncReport, SyncError> {
        let report = self.ctx.sync_once(&CancellationToken::new()).await?;
        info!(
            strategy = %report.strategy,
            height = report.target_height,
            allowed = report.allowed,
            "Allowlist updated on demand"
        );
        Ok(report)
    }
}

impl SyncContext {
    /// Read the latest height, step back by the confirmation depth and
    /// reconcile at that height. One cycle at a time per engine.
    pub(crate) async fn sync_once(&self, cancel: &CancellationToken) -> Result<SyncReport, SyncError> {
        let _cycle = self.cycle_lock.lock().await;
        let _timer = CycleTimer::start();

        let result = self.sync_at_finalized_height(cancel).await;
        match &result {
            Ok(report) => crate::metrics::record_cycle(report.strategy.as_str(), "success"),
            Err(e) => crate::metrics::record_cycle("unresolved", e.kind()),
        }
        result
    }

    async fn sync_at_finalized_height(&self, cancel: &CancellationToken) -> Result<SyncReport, SyncError> {
        let latest = self.client.latest_block_height().await.map_err(|source| {
            crate::metrics::record_registry_error("latest_block_height");
            SyncError::Registry { call: "latest_block_height", source }
        })?;
        let target_height = latest.saturating_sub(self.config.block_confirmations);

        VersionedSyncStrategy::new(
            self.client.as_ref(),
            self.store.as_ref(),
            &self.cache,
            self.fetcher(),
            self.config.persistence_enabled,
        )
        .run(target_height, cancel)
        .await
    }
}
