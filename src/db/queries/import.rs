//! Bulk import database queries

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::types::{ImportKind, ImportRecord, PersistedRow};

/// Quote an identifier for interpolation into SQL
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Group records by their exact column set, keeping first-seen order.
///
/// `jsonb_populate_recordset` turns absent keys into NULL, which would
/// override column defaults; writing each column set separately keeps
/// absent columns absent.
fn group_by_columns(records: &[ImportRecord]) -> Vec<(Vec<String>, Vec<&ImportRecord>)> {
    let mut groups: Vec<(Vec<String>, Vec<&ImportRecord>)> = Vec::new();
    for record in records {
        let columns: Vec<String> = record.columns().map(str::to_string).collect();
        match groups.iter_mut().find(|(cols, _)| *cols == columns) {
            Some((_, members)) => members.push(record),
            None => groups.push((columns, vec![record])),
        }
    }
    groups
}

/// Build the INSERT (or upsert when `conflict_key` is given) for one column set
fn build_write_sql(table: &str, columns: &[String], conflict_key: Option<&[&str]>) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let table_ident = quote_ident(table);

    let mut sql = format!(
        "INSERT INTO {table} AS t ({cols}) SELECT {cols} FROM jsonb_populate_recordset(NULL::{table}, $1)",
        table = table_ident,
        cols = column_list,
    );

    if let Some(key) = conflict_key {
        let mut updates: Vec<&str> = columns
            .iter()
            .map(String::as_str)
            .filter(|c| !key.contains(c))
            .collect();
        // nothing to update still has to touch the row so RETURNING reports it
        if updates.is_empty() {
            updates = key.to_vec();
        }
        let set_list = updates
            .iter()
            .map(|c| format!("{col} = EXCLUDED.{col}", col = quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let key_list = key.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        sql.push_str(&format!(" ON CONFLICT ({}) DO UPDATE SET {}", key_list, set_list));
    }

    sql.push_str(" RETURNING to_jsonb(t)");
    sql
}

/// Write a batch in one transaction; any failing statement rolls back all
pub async fn write_batch(
    pool: &PgPool,
    kind: ImportKind,
    records: &[ImportRecord],
    conflict_key: Option<&[&str]>,
) -> Result<Vec<PersistedRow>> {
    let mut tx = pool.begin().await.context("Failed to open transaction")?;
    let mut written = Vec::with_capacity(records.len());

    for (columns, members) in group_by_columns(records) {
        let sql = build_write_sql(kind.table(), &columns, conflict_key);
        let payload = serde_json::to_value(&members)?;

        let rows: Vec<serde_json::Value> = sqlx::query_scalar(&sql)
            .bind(payload)
            .fetch_all(&mut *tx)
            .await?;
        written.extend(rows);
    }

    tx.commit().await.context("Failed to commit import batch")?;
    Ok(written)
}

/// `user_id`s of admins holding `role`
pub async fn find_admin_user_ids_by_role(pool: &PgPool, role: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT user_id::text FROM admins WHERE role = $1 AND user_id IS NOT NULL"
    )
    .bind(role)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
