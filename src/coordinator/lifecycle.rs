//! Engine lifecycle management: start, stop, worker loop.
//!
//! This module contains the startup sequence, the periodic worker and the
//! shutdown handshake.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::strategy::SyncError;

use super::{EngineError, LifecycleEvent, SyncContext, SyncEngine, TransitionGuard, Worker};

impl SyncEngine {
    /// Start periodic syncing.
    ///
    /// Startup flow:
    /// 1. If periodic updates are disabled, log and return. The cache stays
    ///    as it is until [`update_from_contract`](Self::update_from_contract).
    /// 2. Load the persisted allowlist into the cache (no network involved).
    /// 3. Spawn the worker, which syncs immediately and then once per tick.
    ///
    /// Calling `start` on a running engine is a no-op. Dropping the future
    /// before it resolves leaves the engine `Stopped`.
    #[tracing::instrument(skip(self), fields(registry = %self.ctx.config.registry_address))]
    pub async fn start(&self) -> Result<(), EngineError> {
        if !self.transition(LifecycleEvent::Start)? {
            debug!("Allowlist sync engine already running");
            return Ok(());
        }
        let guard = TransitionGuard::new(self);

        let config = &self.ctx.config;
        if !config.periodic_enabled() {
            info!(
                interval_secs = config.update_interval_secs,
                timeout_secs = config.update_timeout_secs,
                "Periodic allowlist updates disabled"
            );
            self.transition(LifecycleEvent::Started)?;
            guard.complete();
            return Ok(());
        }

        self.ctx.load_stored_allowlist().await;

        let stop = CancellationToken::new();
        let handle = tokio::spawn(run_worker(self.ctx.clone(), stop.clone()));
        *self.worker.lock() = Some(Worker { stop, handle });

        self.transition(LifecycleEvent::Started)?;
        guard.complete();
        info!(
            interval = ?config.update_interval(),
            timeout = ?config.update_timeout(),
            "Allowlist sync engine started"
        );
        Ok(())
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// An in-flight cycle is cancelled. When this returns no cycle is
    /// running and no further ticks will fire. Calling `stop` on a stopped
    /// engine is a no-op. Dropping the future mid-join still leaves the
    /// engine `Stopped` with the worker cancelled.
    #[tracing::instrument(skip(self), fields(registry = %self.ctx.config.registry_address))]
    pub async fn stop(&self) -> Result<(), EngineError> {
        if !self.transition(LifecycleEvent::Stop)? {
            debug!("Allowlist sync engine already stopped");
            return Ok(());
        }
        let guard = TransitionGuard::new(self);

        let worker = self.worker.lock().take();
        let joined = match worker {
            Some(Worker { stop, handle }) => {
                stop.cancel();
                handle.await.map_err(|e| EngineError::Worker(e.to_string()))
            }
            None => Ok(()),
        };

        self.transition(LifecycleEvent::Stopped)?;
        guard.complete();
        info!("Allowlist sync engine stopped");
        joined
    }
}

impl SyncContext {
    /// Page through the store and publish whatever it holds.
    ///
    /// Stops at the first page shorter than the batch size. A store error
    /// ends the walk early; what was read so far is still published.
    pub(crate) async fn load_stored_allowlist(&self) {
        if !self.config.persistence_enabled {
            return;
        }

        let started = Instant::now();
        let batch_size = self.config.stored_batch_size;
        let mut offset = 0u64;
        let mut allowed = Vec::new();

        loop {
            match self.store.get_allowed_senders(offset, batch_size).await {
                Ok(page) => {
                    let n = page.len();
                    allowed.extend(page);
                    offset += n as u64;
                    if n < batch_size {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, loaded = allowed.len(), "Failed to read stored allowlist");
                    crate::metrics::record_persistence_error("load");
                    break;
                }
            }
        }

        info!(loaded = allowed.len(), "Loaded stored allowlist");
        crate::metrics::record_bootstrap(allowed.len(), started.elapsed());
        self.cache.update(allowed);
    }

    /// One sync cycle bounded by the update timeout and cancelled by `stop`.
    pub(crate) async fn run_bounded_cycle(&self, stop: &CancellationToken) -> Result<crate::SyncReport, SyncError> {
        let cycle = stop.child_token();
        let timeout = self.config.update_timeout();

        // sync_once records its own outcome; only the branches that drop it record here
        let result = tokio::select! {
            _ = cycle.cancelled() => {
                crate::metrics::record_cycle("unresolved", "cancelled");
                Err(SyncError::Cancelled)
            }
            res = tokio::time::timeout(timeout, self.sync_once(&cycle)) => {
                res.unwrap_or_else(|_| {
                    crate::metrics::record_cycle("unresolved", "timeout");
                    Err(SyncError::Timeout(timeout))
                })
            }
        };
        cycle.cancel();
        result
    }
}

/// Background loop: one cycle immediately, then one per tick until `stop` fires.
async fn run_worker(ctx: Arc<SyncContext>, stop: CancellationToken) {
    let mut ticker = tokio::time::interval(ctx.config.update_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match ctx.run_bounded_cycle(&stop).await {
            Ok(report) => info!(
                strategy = %report.strategy,
                version = %report.version,
                height = report.target_height,
                allowed = report.allowed,
                blocked_removed = report.blocked_removed,
                persist_failures = report.persist_failures,
                "Allowlist updated"
            ),
            Err(SyncError::Cancelled) => {
                debug!("Sync cycle cancelled by shutdown");
                break;
            }
            Err(e) => error!(error = %e, "Failed to update allowlist, retrying next tick"),
        }
    }

    debug!("Allowlist sync worker exited");
}
