//! Hosted registry REST API store (PostgREST dialect)

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use super::{column_union, RecordStore, SUPER_ADMIN_ROLE};
use crate::types::{ImportKind, ImportRecord, PersistedRow};

const PREFER_INSERT: &str = "return=representation,missing=default";
const PREFER_UPSERT: &str = "return=representation,missing=default,resolution=merge-duplicates";

/// Error body returned by the REST API
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdminUserIdRow {
    user_id: Option<String>,
}

/// REST API client writing whole batches in one request
pub struct PostgrestStore {
    base_url: String,
    client: reqwest::Client,
}

impl PostgrestStore {
    /// Create a new client for `base_url` authenticated with `api_key`
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key).context("API key is not a valid header value")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("API key is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent("registry-importer/0.1")
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn table_url(&self, kind: ImportKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, kind.table())
    }

    /// Bulk POST; `columns` lists every key in the batch so rows missing a
    /// column take its default instead of being cut to the first row's keys
    async fn write(
        &self,
        kind: ImportKind,
        records: &[ImportRecord],
        prefer: &'static str,
        conflict_key: Option<&[&str]>,
    ) -> Result<Vec<PersistedRow>> {
        let mut request = self
            .client
            .post(self.table_url(kind))
            .header("Prefer", prefer)
            .query(&[("columns", column_union(records).join(","))])
            .json(records);

        if let Some(key) = conflict_key {
            request = request.query(&[("on_conflict", key.join(","))]);
        }

        debug!("POST {} ({} records)", kind.table(), records.len());

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} write request", kind.table()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(anyhow!(api_error_message(status, &body)));
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).context("Failed to parse write response")
    }
}

/// Prefer the API's own message; fall back to the raw body
fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody { message: Some(message), details, hint }) => {
            let mut text = message;
            if let Some(details) = details.filter(|d| !d.is_empty()) {
                text.push_str(&format!(" ({})", details));
            }
            if let Some(hint) = hint.filter(|h| !h.is_empty()) {
                text.push_str(&format!(" Hint: {}", hint));
            }
            text
        }
        _ => format!("Registry API returned {} - {}", status, body),
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn insert(&self, kind: ImportKind, records: &[ImportRecord]) -> Result<Vec<PersistedRow>> {
        self.write(kind, records, PREFER_INSERT, None).await
    }

    async fn upsert(
        &self,
        kind: ImportKind,
        records: &[ImportRecord],
        conflict_key: &[&str],
    ) -> Result<Vec<PersistedRow>> {
        self.write(kind, records, PREFER_UPSERT, Some(conflict_key)).await
    }

    async fn super_admin_user_ids(&self) -> Result<HashSet<String>> {
        let role_filter = format!("eq.{}", SUPER_ADMIN_ROLE);
        let response = self
            .client
            .get(self.table_url(ImportKind::Admins))
            .query(&[("select", "user_id"), ("role", role_filter.as_str())])
            .send()
            .await
            .context("Failed to send super admin lookup request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(api_error_message(status, &body)));
        }

        let rows: Vec<AdminUserIdRow> = response
            .json()
            .await
            .context("Failed to parse super admin lookup response")?;

        Ok(rows.into_iter().filter_map(|row| row.user_id).collect())
    }

    fn name(&self) -> &'static str {
        "postgrest"
    }
}
