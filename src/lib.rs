//! # Allowlist Sync
//!
//! Keeps a local allowlist of sender identities in sync with a remote,
//! versioned on-chain registry, and answers membership queries from memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     AllowlistCache                          │
//! │  • allow(identity): lock-free snapshot lookup              │
//! │  • update(list): whole-list swap, never partial            │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                  (one swap per successful cycle)
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SyncEngine                            │
//! │  • start(): warm cache from store, spawn worker            │
//! │  • worker: one bounded cycle per tick                      │
//! │  • stop(): cancel in-flight cycle, join worker             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 VersionedSyncStrategy                       │
//! │  • < 1.1.0: get-all, purge and rewrite the store           │
//! │  • ≥ 1.1.0: paged blocked/allowed reconciliation           │
//! └─────────────────────────────────────────────────────────────┘
//!                │                               │
//!                ▼                               ▼
//!        RegistryClient                   AllowlistStore
//!      (source of truth)            (Memory / SQLite / MySQL)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allowlist_sync::{
//!     Address, AllowlistCache, AllowlistConfig, InMemoryRegistry,
//!     MemoryAllowlistStore, SyncEngine,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry_address = Address::from_low_u64(0x1234);
//!     let config = AllowlistConfig {
//!         registry_address,
//!         update_interval_secs: 60,
//!         update_timeout_secs: 30,
//!         ..Default::default()
//!     };
//!
//!     let registry = InMemoryRegistry::new("AllowList v1.1.0")
//!         .with_allowed(vec![Address::from_low_u64(0xAA)]);
//!     let cache = Arc::new(AllowlistCache::new());
//!     let engine = SyncEngine::new(
//!         config,
//!         Arc::new(registry),
//!         Arc::new(MemoryAllowlistStore::new(registry_address)),
//!         cache.clone(),
//!     )
//!     .expect("Invalid config");
//!
//!     // Run one cycle now instead of waiting for the first tick
//!     engine.update_from_contract().await.expect("Sync failed");
//!     assert!(cache.allow(&Address::from_low_u64(0xAA)));
//!
//!     engine.start().await.expect("Failed to start");
//!     engine.stop().await.expect("Failed to stop");
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`SyncEngine`] lifecycle and worker
//! - [`strategy`]: Version-gated reconciliation
//! - [`fetcher`]: Paged, rate-limited range iteration
//! - [`registry`]: The [`RegistryClient`] seam and an in-memory double
//! - [`storage`]: Persistence backends (Memory, SQL)
//! - [`cache`]: The lock-free membership snapshot
//! - [`resilience`]: Retry logic for backend connections

pub mod address;
pub mod config;
pub mod cache;
pub mod fetcher;
pub mod registry;
pub mod storage;
pub mod resilience;
pub mod strategy;
pub mod coordinator;
pub mod metrics;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use address::{Address, AddressError};
pub use config::{AllowlistConfig, ConfigError};
pub use cache::{AllowlistCache, AllowlistSnapshot};
pub use fetcher::BatchFetcher;
pub use registry::{InMemoryRegistry, RegistryCall, RegistryClient, RegistryError};
pub use storage::{AllowlistStore, MemoryAllowlistStore, SqlAllowlistStore, StorageError};
pub use resilience::retry::RetryConfig;
pub use strategy::{StrategyKind, SyncError, SyncReport, VersionedSyncStrategy, BATCH_CAPABLE_VERSION};
pub use coordinator::{EngineError, EngineState, LifecycleEvent, SyncEngine};
