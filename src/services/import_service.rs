//! Bulk import orchestration
//!
//! One submission = normalize -> guard (admins only) -> one batched store
//! call. Every outcome, including failures, comes back as an `ImportResult`;
//! nothing propagates to the caller as an error.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::services::admin_guard::guard_admin_candidates;
use crate::services::csv_pipeline::CsvNormalizationPipeline;
use crate::services::store::RecordStore;
use crate::types::{ImportError, ImportKind, ImportRecord, ImportResult, PersistedRow};

const FAILURE_MESSAGE: &str = "Failed to process import.";
const REPORTED_ID_COUNT: usize = 3;

/// Runs import submissions against one store
pub struct ImportService {
    store: Arc<dyn RecordStore>,
}

impl ImportService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Import a raw CSV payload; `allow_update` selects upsert over insert-only
    pub async fn run(&self, raw_text: &str, kind: ImportKind, allow_update: bool) -> ImportResult {
        let started = Instant::now();
        info!(
            kind = %kind,
            store = self.store.name(),
            "Starting import ({})",
            if allow_update { "upsert" } else { "insert only" }
        );

        match self.submit(raw_text, kind, allow_update).await {
            Ok((count, rows)) => {
                info!(
                    kind = %kind,
                    "Import completed: {} records in {:?}",
                    count,
                    started.elapsed()
                );
                ImportResult::succeeded(count, imported_ids_summary(&rows))
            }
            Err(ImportError::EmptyInput) => {
                info!(kind = %kind, "Import rejected: no data rows");
                ImportResult::failed(ImportError::EmptyInput.to_string(), None)
            }
            Err(e) => {
                error!(kind = %kind, "Import failed: {}", e);
                ImportResult::failed(FAILURE_MESSAGE, Some(e.to_string()))
            }
        }
    }

    /// Returns the number of records handed to the store and the rows it wrote
    async fn submit(
        &self,
        raw_text: &str,
        kind: ImportKind,
        allow_update: bool,
    ) -> Result<(usize, Vec<PersistedRow>), ImportError> {
        let records = CsvNormalizationPipeline::new(kind).normalize(raw_text)?;
        if records.is_empty() {
            return Err(ImportError::EmptyInput);
        }

        let records = if kind == ImportKind::Admins {
            guard_admin_candidates(self.store.as_ref(), records, allow_update)
                .await
                .map_err(persistence_error)?
        } else {
            records
        };

        if records.is_empty() {
            info!(kind = %kind, "Nothing left to persist after filtering");
            return Ok((0, Vec::new()));
        }

        let rows = self
            .persist(kind, &records, allow_update)
            .await
            .map_err(persistence_error)?;

        Ok((records.len(), rows))
    }

    async fn persist(
        &self,
        kind: ImportKind,
        records: &[ImportRecord],
        allow_update: bool,
    ) -> anyhow::Result<Vec<PersistedRow>> {
        if allow_update {
            self.store.upsert(kind, records, kind.conflict_key()).await
        } else {
            self.store.insert(kind, records).await
        }
    }
}

fn persistence_error(e: anyhow::Error) -> ImportError {
    ImportError::Persistence(format!("{:#}", e))
}

/// `Imported IDs: a, b, c...` from the first returned rows, if any carry one
fn imported_ids_summary(rows: &[PersistedRow]) -> Option<String> {
    let ids: Vec<&str> = rows
        .iter()
        .filter_map(|row| {
            row.get("id")
                .and_then(|v| v.as_str())
                .or_else(|| row.get("person_id").and_then(|v| v.as_str()))
        })
        .take(REPORTED_ID_COUNT)
        .collect();

    if ids.is_empty() {
        None
    } else {
        Some(format!("Imported IDs: {}...", ids.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::memory::{MemoryStore, StoreCall};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    const EVENT_ID: &str = "123e4567-e89b-12d3-a456-426614174000";
    const PERSON_ID: &str = "9b2f1c1e-8d4a-4f7e-9c3b-2a1d0e5f6a7b";
    const USER_ID: &str = "11111111-1111-4111-8111-111111111111";

    fn service() -> (ImportService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ImportService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_people_import_inserts_when_updates_disabled() {
        let (service, store) = service();
        let result = service
            .run("full_name,phone\nA,1\nB,2", ImportKind::People, false)
            .await;

        assert!(result.success);
        assert_eq!(result.message, "Successfully processed 2 records.");
        assert_eq!(result.record_count, 2);
        assert!(result.details.unwrap().starts_with("Imported IDs: "));
        assert_eq!(
            store.write_calls(),
            vec![StoreCall::Insert { kind: ImportKind::People, count: 2 }]
        );
    }

    #[tokio::test]
    async fn test_update_mode_upserts_on_kind_conflict_key() {
        let (service, store) = service();
        let csv = format!("event_id,person_id,status\n{},{},attended", EVENT_ID, PERSON_ID);
        let result = service.run(&csv, ImportKind::Attendance, true).await;

        assert!(result.success);
        assert_eq!(
            store.write_calls(),
            vec![StoreCall::Upsert {
                kind: ImportKind::Attendance,
                count: 1,
                conflict_key: vec!["event_id".to_string(), "person_id".to_string()],
            }]
        );
        assert_eq!(result.details.as_deref(), Some(format!("Imported IDs: {}...", PERSON_ID).as_str()));
    }

    #[tokio::test]
    async fn test_empty_file_is_reported_without_store_call() {
        let (service, store) = service();
        let result = service.run("full_name,phone\n", ImportKind::People, true).await;

        assert!(!result.success);
        assert_eq!(result.message, "The CSV file appears to be empty.");
        assert!(result.details.is_none());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_file_with_only_unknown_columns_counts_as_empty() {
        let (service, store) = service();
        let result = service.run("nickname\nJJ", ImportKind::People, false).await;

        assert!(!result.success);
        assert_eq!(result.message, "The CSV file appears to be empty.");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_with_details() {
        let (service, store) = service();
        store.fail_writes_with("permission denied for table events");

        let result = service.run("title\nMeetup", ImportKind::Events, false).await;

        assert!(!result.success);
        assert_eq!(result.message, "Failed to process import.");
        assert_eq!(result.details.as_deref(), Some("permission denied for table events"));
        assert_eq!(result.record_count, 0);
    }

    #[tokio::test]
    async fn test_insert_only_conflict_fails_whole_batch() {
        let (service, store) = service();
        store.seed(ImportKind::People, vec![json!({"id": PERSON_ID, "phone": "1"})]);

        let result = service
            .run("full_name,phone\nNew,2\nClash,1", ImportKind::People, false)
            .await;

        assert!(!result.success);
        assert!(result.details.unwrap().contains("duplicate key"));
        assert_eq!(store.rows(ImportKind::People).len(), 1);
    }

    #[tokio::test]
    async fn test_super_admin_row_never_reaches_store() {
        let (service, store) = service();
        let result = service
            .run("user_id,role\nu1,super_admin", ImportKind::Admins, true)
            .await;

        assert!(result.success);
        assert_eq!(result.message, "Successfully processed 0 records.");
        assert_eq!(result.record_count, 0);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_super_admin_is_not_modified() {
        let (service, store) = service();
        store.seed(ImportKind::Admins, vec![json!({"user_id": USER_ID, "role": "super_admin"})]);

        let csv = format!("user_id,role\n{},volunteer\n{},admin", USER_ID, PERSON_ID);
        let result = service.run(&csv, ImportKind::Admins, true).await;

        assert!(result.success);
        assert_eq!(result.record_count, 1);
        let admins = store.rows(ImportKind::Admins);
        assert!(admins.contains(&json!({"user_id": USER_ID, "role": "super_admin"})));
        assert!(admins.contains(&json!({"user_id": PERSON_ID, "role": "admin"})));
    }

    #[tokio::test]
    async fn test_spelled_out_super_admin_is_caught() {
        let (service, store) = service();
        let csv = format!("user_id,role\n{},Super Admin", USER_ID);
        let result = service.run(&csv, ImportKind::Admins, false).await;

        assert_eq!(result.record_count, 0);
        assert!(store.write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_submit_surfaces_error_classes() {
        let (service, store) = service();
        assert_ok!(service.submit("title\nMeetup", ImportKind::Events, true).await);

        let empty = assert_err!(service.submit("", ImportKind::Events, true).await);
        assert!(matches!(empty, ImportError::EmptyInput));

        store.fail_writes_with("timeout");
        let failed = assert_err!(service.submit("title\nMeetup", ImportKind::Events, true).await);
        assert!(matches!(failed, ImportError::Persistence(ref m) if m == "timeout"));
    }

    #[test]
    fn test_imported_ids_summary_uses_first_three() {
        let rows = vec![
            json!({"id": "a"}),
            json!({"person_id": "b"}),
            json!({"name": "no id"}),
            json!({"id": "c"}),
            json!({"id": "d"}),
        ];
        assert_eq!(imported_ids_summary(&rows).as_deref(), Some("Imported IDs: a, b, c..."));
        assert!(imported_ids_summary(&[]).is_none());
    }
}
