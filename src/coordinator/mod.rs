// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Allowlist sync engine coordinator.
//!
//! The [`SyncEngine`] ties together:
//! - the shared [`AllowlistCache`] answering `allow` queries
//! - the [`RegistryClient`] that is the source of truth
//! - the [`AllowlistStore`] used to warm the cache on restart
//! - one background worker running a sync cycle per tick
//!
//! # Lifecycle
//!
//! ```text
//! Stopped → Starting → Running → Stopping → Stopped
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allowlist_sync::{
//!     Address, AllowlistCache, AllowlistConfig, EngineState, InMemoryRegistry,
//!     MemoryAllowlistStore, SyncEngine,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry_address = Address::from_low_u64(0x1234);
//! let config = AllowlistConfig {
//!     registry_address,
//!     update_interval_secs: 60,
//!     update_timeout_secs: 30,
//!     ..Default::default()
//! };
//! let cache = Arc::new(AllowlistCache::new());
//! let engine = SyncEngine::new(
//!     config,
//!     Arc::new(InMemoryRegistry::new("AllowList v1.1.0")),
//!     Arc::new(MemoryAllowlistStore::new(registry_address)),
//!     cache.clone(),
//! )
//! .expect("valid config");
//!
//! assert_eq!(engine.state(), EngineState::Stopped);
//! engine.start().await.expect("start");
//! let _permitted = cache.allow(&Address::from_low_u64(0xAA));
//! engine.stop().await.expect("stop");
//! # }
//! ```

mod types;
mod api;
mod lifecycle;

pub use types::{EngineError, EngineState, LifecycleEvent};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::AllowlistCache;
use crate::config::{AllowlistConfig, ConfigError};
use crate::fetcher::BatchFetcher;
use crate::registry::RegistryClient;
use crate::storage::traits::AllowlistStore;

/// Everything one sync cycle needs. Shared with the worker task.
pub(crate) struct SyncContext {
    pub(crate) config: AllowlistConfig,
    pub(crate) client: Arc<dyn RegistryClient>,
    pub(crate) store: Arc<dyn AllowlistStore>,
    pub(crate) cache: Arc<AllowlistCache>,
    /// Held for a whole cycle so explicit and periodic syncs never interleave
    pub(crate) cycle_lock: tokio::sync::Mutex<()>,
}

impl SyncContext {
    pub(crate) fn fetcher(&self) -> BatchFetcher {
        BatchFetcher::new(self.config.onchain_batch_size, self.config.fetch_delay())
    }
}

/// Handle to the running background worker.
struct Worker {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps an [`AllowlistCache`] in sync with a remote registry.
///
/// # Thread Safety
///
/// The engine is `Send + Sync`; `start`/`stop` take `&self` and are guarded
/// by the lifecycle state machine, so it can be shared behind an `Arc`.
pub struct SyncEngine {
    ctx: Arc<SyncContext>,

    /// Engine state (broadcast to watchers)
    state: watch::Sender<EngineState>,

    /// Engine state receiver (for internal use)
    state_rx: watch::Receiver<EngineState>,

    worker: Mutex<Option<Worker>>,
}

impl SyncEngine {
    /// Create a stopped engine. Fails if `config` is invalid or the store is
    /// scoped to a different registry.
    pub fn new(
        config: AllowlistConfig,
        client: Arc<dyn RegistryClient>,
        store: Arc<dyn AllowlistStore>,
        cache: Arc<AllowlistCache>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if store.registry() != config.registry_address {
            return Err(ConfigError::StoreScopeMismatch {
                store: store.registry(),
                registry: config.registry_address,
            });
        }

        let (state_tx, state_rx) = watch::channel(EngineState::Stopped);

        Ok(Self {
            ctx: Arc::new(SyncContext {
                config,
                client,
                store,
                cache,
                cycle_lock: tokio::sync::Mutex::new(()),
            }),
            state: state_tx,
            state_rx,
            worker: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Subscribe to lifecycle changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    #[must_use]
    pub fn config(&self) -> &AllowlistConfig {
        &self.ctx.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<AllowlistCache> {
        &self.ctx.cache
    }

    /// Apply `event` atomically. Returns whether the state changed.
    fn transition(&self, event: LifecycleEvent) -> Result<bool, EngineError> {
        let mut outcome = Ok(false);
        self.state.send_if_modified(|state| match state.next(event) {
            Ok(Some(next)) => {
                debug!(from = %state, to = %next, %event, "Engine state transition");
                *state = next;
                outcome = Ok(true);
                true
            }
            Ok(None) => false,
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    /// Force `Stopped`, bypassing the state machine. Used only to recover
    /// from a start or stop future dropped mid-transition.
    fn reset_to_stopped(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.stop.cancel();
        }
        self.state.send_if_modified(|state| {
            if *state == EngineState::Stopped {
                return false;
            }
            warn!(from = %state, "Lifecycle transition abandoned, engine reset to Stopped");
            *state = EngineState::Stopped;
            true
        });
    }
}

/// Armed for the duration of `start`/`stop`. If the future is dropped before
/// [`complete`](Self::complete), the engine falls back to `Stopped` instead
/// of staying in `Starting`/`Stopping`.
pub(crate) struct TransitionGuard<'a> {
    engine: &'a SyncEngine,
    armed: bool,
}

impl<'a> TransitionGuard<'a> {
    pub(crate) fn new(engine: &'a SyncEngine) -> Self {
        Self { engine, armed: true }
    }

    pub(crate) fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.engine.reset_to_stopped();
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        // Worker left running by a missing stop()
        if let Some(worker) = self.worker.get_mut().take() {
            worker.stop.cancel();
        }
    }
}
