//! Persistence abstraction for bulk imports
//!
//! The import path hands a whole batch to a `RecordStore` in one call:
//! - `PostgrestStore` for the hosted registry REST API (production)
//! - `PgStore` for a directly reachable PostgreSQL database
//! - `MemoryStore` for tests and dry runs (deterministic, no network)
//!
//! Backend selection comes from `StoreConfig`, built once at startup.

pub mod memory;
pub mod postgres;
pub mod postgrest;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig};
use crate::types::{ImportKind, ImportRecord, PersistedRow};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use postgrest::PostgrestStore;

/// Role value that bulk imports may never create or modify
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

/// Store trait - one batched write per import submission
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert all records; any conflict fails the whole batch
    async fn insert(&self, kind: ImportKind, records: &[ImportRecord]) -> Result<Vec<PersistedRow>>;

    /// Insert or update records, matching existing rows on `conflict_key`
    async fn upsert(
        &self,
        kind: ImportKind,
        records: &[ImportRecord],
        conflict_key: &[&str],
    ) -> Result<Vec<PersistedRow>>;

    /// `user_id`s currently holding the super_admin role
    async fn super_admin_user_ids(&self) -> Result<HashSet<String>>;

    /// Get the name of this store implementation
    fn name(&self) -> &'static str;
}

/// Create a store for the configured backend
pub async fn create_store(config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
    match &config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using MemoryStore");
            Ok(Box::new(MemoryStore::new()))
        }
        StoreBackend::Postgrest { base_url, api_key } => {
            tracing::info!("Using PostgrestStore at {}", base_url);
            Ok(Box::new(PostgrestStore::new(base_url, api_key, config.timeout)?))
        }
        StoreBackend::Postgres { database_url } => {
            tracing::info!("Using PgStore");
            let pool = crate::db::create_pool(database_url).await?;
            Ok(Box::new(PgStore::new(pool)))
        }
    }
}

/// Union of columns across records, in first-seen order
pub(crate) fn column_union(records: &[ImportRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for column in record.columns() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}
