//! Direct PostgreSQL store

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{RecordStore, SUPER_ADMIN_ROLE};
use crate::db::queries;
use crate::types::{ImportKind, ImportRecord, PersistedRow};

/// Store writing straight into the registry tables, one transaction per batch
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert(&self, kind: ImportKind, records: &[ImportRecord]) -> Result<Vec<PersistedRow>> {
        debug!("Inserting {} rows into {}", records.len(), kind.table());
        queries::import::write_batch(&self.pool, kind, records, None).await
    }

    async fn upsert(
        &self,
        kind: ImportKind,
        records: &[ImportRecord],
        conflict_key: &[&str],
    ) -> Result<Vec<PersistedRow>> {
        debug!(
            "Upserting {} rows into {} on ({})",
            records.len(),
            kind.table(),
            conflict_key.join(", ")
        );
        queries::import::write_batch(&self.pool, kind, records, Some(conflict_key)).await
    }

    async fn super_admin_user_ids(&self) -> Result<HashSet<String>> {
        let ids = queries::import::find_admin_user_ids_by_role(&self.pool, SUPER_ADMIN_ROLE).await?;
        Ok(ids.into_iter().collect())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
