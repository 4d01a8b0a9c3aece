//! Labelled corpus loading from CSV.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use duckdb::Connection;
use notedx_core::schema::{self, require_columns};
use notedx_core::{Note, notes_from_batches};
use tracing::info;

use crate::StoreError;

/// Read a CSV with `note_text`, `label` and optional `note_id` columns.
///
/// Parsing and type sniffing are DuckDB's `read_csv_auto`. Required columns
/// are checked against the sniffed schema before any row is read, so a
/// header-only file with a wrong header still fails.
pub fn read_corpus_csv(path: &Path) -> Result<Vec<Note>, StoreError> {
    if !path.exists() {
        return Err(StoreError::FileNotFound(path.to_path_buf()));
    }

    let batches = read_csv_batches(path)?;
    let notes = notes_from_batches(&batches)?;
    info!(path = %path.display(), count = notes.len(), "loaded corpus");
    Ok(notes)
}

fn read_csv_batches(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let conn = Connection::open_in_memory()?;
    let sql = format!(
        "SELECT * FROM read_csv_auto('{}', header = true)",
        sql_string(&path.display().to_string())
    );
    let mut stmt = conn.prepare(&sql)?;
    let arrow = stmt.query_arrow([])?;
    require_columns(&arrow.get_schema(), schema::REQUIRED_CORPUS_COLUMNS)?;
    Ok(arrow.collect())
}

/// Escape a value for use inside a single-quoted SQL literal.
fn sql_string(value: &str) -> String {
    value.replace('\'', "''")
}
