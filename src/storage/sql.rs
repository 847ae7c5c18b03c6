// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL-backed allowlist store (SQLite or MySQL through the sqlx `Any` driver).
//!
//! One table holds the senders of every registry; each row is scoped by
//! the registry address:
//! ```sql
//! CREATE TABLE allowlist_senders (
//!   id BIGINT AUTO_INCREMENT PRIMARY KEY,  -- insertion order
//!   allowed_address VARCHAR(42) NOT NULL,
//!   registry_address VARCHAR(42) NOT NULL,
//!   created_at BIGINT NOT NULL,
//!   UNIQUE KEY (allowed_address, registry_address)
//! )
//! ```
//!
//! Addresses are stored as lowercase `0x` hex so that the unique key
//! matches regardless of the casing a caller used.

use std::sync::Once;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sqlx::{any::AnyPoolOptions, AnyPool, Row};

use crate::address::Address;
use crate::resilience::retry::{retry, RetryConfig};
use super::traits::{AllowlistStore, StorageError};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

/// Rows per multi-row statement. Keeps SQLite under its bound-variable
/// limit and MySQL under `max_allowed_packet`.
const CHUNK_SIZE: usize = 400;

#[derive(Clone)]
pub struct SqlAllowlistStore {
    pool: AnyPool,
    is_sqlite: bool,
    registry: Address,
}

impl SqlAllowlistStore {
    /// Connect with startup-mode retry (fails fast if the URL is wrong) and create the schema.
    pub async fn new(connection_string: &str, registry: Address) -> Result<Self, StorageError> {
        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(if is_sqlite { 1 } else { 10 })
                .acquire_timeout(Duration::from_secs(10))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self::from_pool(pool, is_sqlite, registry);
        store.init_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool. The schema is assumed to exist.
    #[must_use]
    pub fn from_pool(pool: AnyPool, is_sqlite: bool, registry: Address) -> Self {
        Self { pool, is_sqlite, registry }
    }

    /// Another handle on the same pool, scoped to a different registry.
    #[must_use]
    pub fn scoped(&self, registry: Address) -> Self {
        Self {
            pool: self.pool.clone(),
            is_sqlite: self.is_sqlite,
            registry,
        }
    }

    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let sql = if self.is_sqlite {
            r#"
            CREATE TABLE IF NOT EXISTS allowlist_senders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                allowed_address TEXT NOT NULL,
                registry_address TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (allowed_address, registry_address)
            )
            "#
        } else {
            r#"
            CREATE TABLE IF NOT EXISTS allowlist_senders (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                allowed_address VARCHAR(42) NOT NULL,
                registry_address VARCHAR(42) NOT NULL,
                created_at BIGINT NOT NULL,
                UNIQUE KEY uq_allowed_registry (allowed_address, registry_address),
                INDEX idx_registry (registry_address)
            )
            "#
        };

        retry("sql_init_schema", &RetryConfig::startup(), || async {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        Ok(())
    }

    fn read_address(row: &sqlx::any::AnyRow) -> Result<Address, StorageError> {
        // SQLite hands TEXT back as String, MySQL VARCHAR sometimes as bytes
        let raw: String = row
            .try_get::<String, _>("allowed_address")
            .ok()
            .or_else(|| {
                row.try_get::<Vec<u8>, _>("allowed_address")
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
            .ok_or_else(|| StorageError::Corruption("allowed_address is not text".into()))?;

        raw.parse()
            .map_err(|e| StorageError::Corruption(format!("'{}': {}", raw, e)))
    }

    fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl AllowlistStore for SqlAllowlistStore {
    fn registry(&self) -> Address {
        self.registry
    }

    async fn get_allowed_senders(&self, offset: u64, limit: usize) -> Result<Vec<Address>, StorageError> {
        let registry = self.registry.to_string();

        let rows = retry("sql_get_allowed_senders", &RetryConfig::query(), || async {
            sqlx::query(
                "SELECT allowed_address FROM allowlist_senders WHERE registry_address = ? ORDER BY id ASC LIMIT ? OFFSET ?",
            )
            .bind(&registry)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        rows.iter().map(Self::read_address).collect()
    }

    async fn create_allowed_senders(&self, senders: &[Address]) -> Result<(), StorageError> {
        if senders.is_empty() {
            return Ok(());
        }

        let registry = self.registry.to_string();
        let created_at = Self::now_secs();
        let verb = if self.is_sqlite { "INSERT OR IGNORE" } else { "INSERT IGNORE" };

        for chunk in senders.chunks(CHUNK_SIZE) {
            let placeholders = vec!["(?, ?, ?)"; chunk.len()].join(", ");
            let sql = format!(
                "{} INTO allowlist_senders (allowed_address, registry_address, created_at) VALUES {}",
                verb, placeholders
            );

            let mut query = sqlx::query(&sql);
            for sender in chunk {
                query = query.bind(sender.to_string()).bind(registry.clone()).bind(created_at);
            }
            query
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }

        tracing::debug!(registry = %self.registry, count = senders.len(), "Stored allowed senders");
        Ok(())
    }

    async fn delete_allowed_senders(&self, senders: &[Address]) -> Result<(), StorageError> {
        if senders.is_empty() {
            return Ok(());
        }

        let registry = self.registry.to_string();

        for chunk in senders.chunks(CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "DELETE FROM allowlist_senders WHERE registry_address = ? AND allowed_address IN ({})",
                placeholders
            );

            let mut query = sqlx::query(&sql).bind(registry.clone());
            for sender in chunk {
                query = query.bind(sender.to_string());
            }
            query
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }

        tracing::debug!(registry = %self.registry, count = senders.len(), "Deleted allowed senders");
        Ok(())
    }

    async fn purge_allowed_senders(&self) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM allowlist_senders WHERE registry_address = ?")
            .bind(self.registry.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        tracing::debug!(registry = %self.registry, purged = result.rows_affected(), "Purged allowed senders");
        Ok(())
    }
}
