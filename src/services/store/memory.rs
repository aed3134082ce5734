//! In-memory record store
//!
//! Behaves like the real tables closely enough for import tests: conflict
//! keys are unique, inserts fail on duplicates, upserts merge into the
//! matching row, and missing `id`s on people/events are generated. Every
//! call is recorded so tests can assert what reached the store.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{RecordStore, SUPER_ADMIN_ROLE};
use crate::types::{ImportKind, ImportRecord, PersistedRow};

/// A call that reached the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Insert { kind: ImportKind, count: usize },
    Upsert { kind: ImportKind, count: usize, conflict_key: Vec<String> },
    SuperAdminLookup,
}

type Row = Map<String, Value>;

pub struct MemoryStore {
    tables: Mutex<HashMap<ImportKind, Vec<Row>>>,
    calls: Mutex<Vec<StoreCall>>,
    failure: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    fn check_failure(&self) -> Result<()> {
        if let Some(message) = self.failure.lock().as_ref() {
            bail!("{}", message);
        }
        Ok(())
    }
}

// Test inspection and fault injection
#[cfg(test)]
impl MemoryStore {
    /// Put rows in place without recording a call
    pub fn seed(&self, kind: ImportKind, rows: Vec<Value>) {
        let mut tables = self.tables.lock();
        let table = tables.entry(kind).or_default();
        for row in rows {
            if let Value::Object(map) = row {
                table.push(map);
            }
        }
    }

    /// Make every subsequent write fail with `message`
    pub fn fail_writes_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Calls that wrote data (lookups excluded)
    pub fn write_calls(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| !matches!(c, StoreCall::SuperAdminLookup))
            .cloned()
            .collect()
    }

    pub fn rows(&self, kind: ImportKind) -> Vec<Value> {
        self.tables
            .lock()
            .get(&kind)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_row(kind: ImportKind, record: &ImportRecord) -> Result<Row> {
    let mut row = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => bail!("record serialized to non-object: {}", other),
    };
    if matches!(kind, ImportKind::People | ImportKind::Events) && !row.contains_key("id") {
        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    Ok(row)
}

/// Key values of a row, `None` when any key column is absent or null
fn key_of(row: &Row, conflict_key: &[&str]) -> Option<Vec<Value>> {
    conflict_key
        .iter()
        .map(|column| match row.get(*column) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        })
        .collect()
}

fn position_of(table: &[Row], key: &[Value], conflict_key: &[&str]) -> Option<usize> {
    table
        .iter()
        .position(|row| key_of(row, conflict_key).as_deref() == Some(key))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, kind: ImportKind, records: &[ImportRecord]) -> Result<Vec<PersistedRow>> {
        self.calls.lock().push(StoreCall::Insert { kind, count: records.len() });
        self.check_failure()?;

        let unique = kind.conflict_key();
        let mut tables = self.tables.lock();
        let table = tables.entry(kind).or_default();

        let mut staged: Vec<Row> = Vec::with_capacity(records.len());
        for record in records {
            let row = to_row(kind, record)?;
            if let Some(key) = key_of(&row, unique) {
                if position_of(table, &key, unique).is_some() || position_of(&staged, &key, unique).is_some() {
                    bail!(
                        "duplicate key value violates unique constraint \"{}_{}_key\"",
                        kind.table(),
                        unique.join("_")
                    );
                }
            }
            staged.push(row);
        }

        table.extend(staged.iter().cloned());
        Ok(staged.into_iter().map(Value::Object).collect())
    }

    async fn upsert(
        &self,
        kind: ImportKind,
        records: &[ImportRecord],
        conflict_key: &[&str],
    ) -> Result<Vec<PersistedRow>> {
        self.calls.lock().push(StoreCall::Upsert {
            kind,
            count: records.len(),
            conflict_key: conflict_key.iter().map(|c| c.to_string()).collect(),
        });
        self.check_failure()?;

        let mut tables = self.tables.lock();
        let table = tables.entry(kind).or_default();
        let mut written = Vec::with_capacity(records.len());

        for record in records {
            let incoming = serde_json::to_value(record)?;
            let existing = match &incoming {
                Value::Object(map) => key_of(map, conflict_key)
                    .and_then(|key| position_of(table, &key, conflict_key)),
                _ => None,
            };

            match (existing, incoming) {
                (Some(index), Value::Object(fields)) => {
                    let row = &mut table[index];
                    for (column, value) in fields {
                        row.insert(column, value);
                    }
                    written.push(Value::Object(row.clone()));
                }
                _ => {
                    let row = to_row(kind, record)?;
                    table.push(row.clone());
                    written.push(Value::Object(row));
                }
            }
        }

        Ok(written)
    }

    async fn super_admin_user_ids(&self) -> Result<HashSet<String>> {
        self.calls.lock().push(StoreCall::SuperAdminLookup);

        let tables = self.tables.lock();
        let ids: HashSet<String> = tables
            .get(&ImportKind::Admins)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.get("role").and_then(Value::as_str) == Some(SUPER_ADMIN_ROLE))
                    .filter_map(|row| row.get("user_id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;
    use serde_json::json;

    fn person(phone: &str, name: &str) -> ImportRecord {
        vec![("phone", CellValue::from(phone)), ("full_name", CellValue::from(name))]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_insert_generates_ids_for_people() {
        let store = MemoryStore::new();
        let rows = store.insert(ImportKind::People, &[person("1", "A")]).await.unwrap();

        let id = rows[0]["id"].as_str().unwrap();
        assert!(Uuid::try_parse(id).is_ok());
        assert_eq!(store.rows(ImportKind::People).len(), 1);
    }

    #[tokio::test]
    async fn test_insert_fails_on_conflict_and_writes_nothing() {
        let store = MemoryStore::new();
        store.insert(ImportKind::People, &[person("1", "A")]).await.unwrap();

        let result = store
            .insert(ImportKind::People, &[person("2", "B"), person("1", "A again")])
            .await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("people_phone_key"), "{}", err);
        assert_eq!(store.rows(ImportKind::People).len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_merges_on_conflict_key() {
        let store = MemoryStore::new();
        store.insert(ImportKind::People, &[person("1", "A")]).await.unwrap();

        let rows = store
            .upsert(ImportKind::People, &[person("1", "A. Renamed"), person("2", "B")], &["phone"])
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        let stored = store.rows(ImportKind::People);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0]["full_name"], json!("A. Renamed"));
    }

    #[tokio::test]
    async fn test_super_admin_lookup_reads_admin_rows() {
        let store = MemoryStore::new();
        store.seed(
            ImportKind::Admins,
            vec![
                json!({"user_id": "u1", "role": "super_admin"}),
                json!({"user_id": "u2", "role": "admin"}),
            ],
        );

        let ids = store.super_admin_user_ids().await.unwrap();
        assert_eq!(ids, HashSet::from(["u1".to_string()]));
        assert_eq!(store.calls(), vec![StoreCall::SuperAdminLookup]);
        assert!(store.write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_rejects_writes() {
        let store = MemoryStore::new();
        store.fail_writes_with("connection reset");

        let err = store.insert(ImportKind::Events, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(store.write_calls().len(), 1);
    }
}
