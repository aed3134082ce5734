//! Import types for bulk CSV import functionality

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IMPORT KIND
// =============================================================================

/// Target record kind of a bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    People,
    Events,
    Attendance,
    Admins,
}

impl ImportKind {
    pub const ALL: [ImportKind; 4] = [
        ImportKind::People,
        ImportKind::Events,
        ImportKind::Attendance,
        ImportKind::Admins,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::People => "people",
            ImportKind::Events => "events",
            ImportKind::Attendance => "attendance",
            ImportKind::Admins => "admins",
        }
    }

    /// Database table the records of this kind land in
    pub fn table(&self) -> &'static str {
        match self {
            ImportKind::People => "people",
            ImportKind::Events => "events",
            ImportKind::Attendance => "event_participants",
            ImportKind::Admins => "admins",
        }
    }

    /// Columns an upsert uses to decide between update and insert
    pub fn conflict_key(&self) -> &'static [&'static str] {
        match self {
            ImportKind::People => &["phone"],
            ImportKind::Events => &["id"],
            ImportKind::Attendance => &["event_id", "person_id"],
            ImportKind::Admins => &["user_id"],
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "people" | "person" => Ok(ImportKind::People),
            "events" | "event" => Ok(ImportKind::Events),
            "attendance" | "participants" | "event_participants" => Ok(ImportKind::Attendance),
            "admins" | "admin" => Ok(ImportKind::Admins),
            _ => Err(ImportError::UnknownKind(s.to_string())),
        }
    }
}

// =============================================================================
// CELL VALUES AND RECORDS
// =============================================================================

/// A single normalized cell, typed once during coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// One normalized CSV row: canonical column name -> typed value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportRecord {
    fields: BTreeMap<String, CellValue>,
}

impl ImportRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        self.fields.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields.get(column)
    }

    /// Text value of a column, `None` for missing, null or non-text cells
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(CellValue::as_text)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for ImportRecord {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Row as returned by the store after a write
pub type PersistedRow = serde_json::Value;

// =============================================================================
// RESULTS AND ERRORS
// =============================================================================

/// Caller-visible outcome of one import submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub record_count: usize,
    pub processed_at: DateTime<Utc>,
}

impl ImportResult {
    pub fn succeeded(record_count: usize, details: Option<String>) -> Self {
        Self {
            success: true,
            message: format!("Successfully processed {} records.", record_count),
            details,
            record_count,
            processed_at: Utc::now(),
        }
    }

    pub fn failed(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details,
            record_count: 0,
            processed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    /// Payload has no header plus data row, or every row was elided
    #[error("The CSV file appears to be empty.")]
    EmptyInput,

    /// The batched store call was rejected
    #[error("{0}")]
    Persistence(String),

    #[error("Unknown import kind '{0}' (expected people, events, attendance or admins)")]
    UnknownKind(String),
}
