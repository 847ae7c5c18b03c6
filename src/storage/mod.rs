//! Persistence for fetched allowlists, used to warm the cache on restart.

pub mod traits;
pub mod memory;
pub mod sql;

pub use traits::{AllowlistStore, StorageError};
pub use memory::MemoryAllowlistStore;
pub use sql::SqlAllowlistStore;
