//! CSV normalization pipeline
//!
//! Turns a raw CSV payload into typed `ImportRecord`s for one record kind:
//! - header aliasing onto canonical column names
//! - cell coercion (blank -> null, `true`/`false` -> bool, `skills` -> list)
//! - categorical remapping with per-column defaults
//! - UUID validation (malformed foreign keys -> null, malformed `id` -> omitted)
//! - unknown columns dropped, rows without any known column elided
//!
//! The pipeline is pure: no I/O, no state across calls. Cell content never
//! fails a row; only a payload without a header and a data row is an error.

use tracing::{debug, info, warn};

use crate::services::column_schema::{
    is_canonical_uuid, is_list_column, is_uuid_column, ColumnSchema, LIST_SEPARATOR,
    PRIMARY_ID_COLUMN,
};
use crate::types::{CellValue, ImportError, ImportKind, ImportRecord};

/// Result of one normalization pass, with bookkeeping for previews and logs
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<ImportRecord>,
    /// Data rows skipped as blank or without any known column
    pub skipped_rows: usize,
    /// Canonical headers not accepted by the schema
    pub ignored_columns: Vec<String>,
}

/// Stateless CSV -> `ImportRecord` converter for a single record kind
pub struct CsvNormalizationPipeline {
    schema: &'static ColumnSchema,
}

impl CsvNormalizationPipeline {
    pub fn new(kind: ImportKind) -> Self {
        Self {
            schema: ColumnSchema::for_kind(kind),
        }
    }

    pub fn kind(&self) -> ImportKind {
        self.schema.kind
    }

    /// Normalize a payload into records, in row order
    pub fn normalize(&self, raw_text: &str) -> Result<Vec<ImportRecord>, ImportError> {
        Ok(self.normalize_batch(raw_text)?.records)
    }

    /// Normalize a payload, also reporting skipped rows and ignored columns
    pub fn normalize_batch(&self, raw_text: &str) -> Result<NormalizedBatch, ImportError> {
        let text = raw_text.trim_start_matches('\u{feff}');

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = match reader.headers() {
            Ok(record) => record.iter().map(|h| self.schema.canonical_header(h)).collect(),
            Err(e) => {
                warn!("Failed to read CSV header row: {}", e);
                return Err(ImportError::EmptyInput);
            }
        };

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::EmptyInput);
        }

        let mut ignored_columns: Vec<String> = Vec::new();
        for header in &headers {
            if !self.schema.is_valid_column(header) && !ignored_columns.contains(header) {
                ignored_columns.push(header.clone());
            }
        }
        debug!(
            kind = %self.kind(),
            "Canonical headers: {:?}, ignored: {:?}",
            headers, ignored_columns
        );

        let mut batch = NormalizedBatch {
            ignored_columns,
            ..Default::default()
        };
        let mut data_rows = 0usize;

        for (index, result) in reader.records().enumerate() {
            // header is line 1
            let line = index + 2;
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping unreadable CSV row {}: {}", line, e);
                    batch.skipped_rows += 1;
                    continue;
                }
            };

            if row.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            data_rows += 1;

            let record = self.normalize_row(&headers, &row);
            if record.is_empty() {
                debug!("Row {} has no known columns, skipping", line);
                batch.skipped_rows += 1;
                continue;
            }
            batch.records.push(record);
        }

        if data_rows == 0 {
            return Err(ImportError::EmptyInput);
        }

        info!(
            kind = %self.kind(),
            "Normalized {} records ({} rows skipped)",
            batch.records.len(),
            batch.skipped_rows
        );

        Ok(batch)
    }

    fn normalize_row(&self, headers: &[String], row: &csv::StringRecord) -> ImportRecord {
        let mut record = ImportRecord::new();

        for (index, column) in headers.iter().enumerate() {
            if !self.schema.is_valid_column(column) {
                continue;
            }

            let raw = strip_outer_quotes(row.get(index).unwrap_or(""));
            if let Some(value) = self.coerce_cell(column, raw) {
                record.insert(column.as_str(), value);
            }
        }

        record
    }

    /// Coerce one cell for a canonical column; `None` means the key is omitted
    fn coerce_cell(&self, column: &str, raw: &str) -> Option<CellValue> {
        let mut value = coerce_scalar(column, raw);

        if let Some(map) = self.schema.categorical(column) {
            value = match value {
                CellValue::Null => CellValue::Null,
                CellValue::Bool(b) => CellValue::Text(map.normalize_bool(b).to_string()),
                CellValue::Text(s) => CellValue::Text(map.normalize(&s).to_string()),
                CellValue::List(_) => CellValue::Text(map.default.to_string()),
            };
        }

        if is_uuid_column(column) {
            let well_formed = matches!(&value, CellValue::Text(s) if is_canonical_uuid(s));
            if column == PRIMARY_ID_COLUMN {
                // lets the store generate a fresh identifier
                if !well_formed {
                    return None;
                }
            } else if !well_formed && !value.is_null() {
                value = CellValue::Null;
            }
        }

        Some(value)
    }
}

/// Blank -> null, literal `true`/`false` -> bool, list columns -> split list
fn coerce_scalar(column: &str, raw: &str) -> CellValue {
    match raw {
        "" => CellValue::Null,
        "true" => CellValue::Bool(true),
        "false" => CellValue::Bool(false),
        _ if is_list_column(column) => CellValue::List(
            raw.split(LIST_SEPARATOR)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => CellValue::Text(raw.to_string()),
    }
}

/// Strip one layer of enclosing quotes the CSV reader left in place
/// (a quoted cell preceded by whitespace is read literally)
fn strip_outer_quotes(cell: &str) -> &str {
    let cell = cell.trim();
    if cell.len() >= 2 && cell.starts_with('"') && cell.ends_with('"') {
        cell[1..cell.len() - 1].trim()
    } else {
        cell
    }
}
