//! DuckDB note store.

use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use duckdb::{Connection, params};
use notedx_core::schema::CREATE_TABLES_SQL;
use notedx_core::{Note, StoreBackend, notes_from_batches};
use tracing::{debug, info};

use crate::store::{effective_limit, last_write_per_id, probabilities_to_json};
use crate::{NoteStore, StoreError, StoredPrediction};

enum Target {
    /// Root handle of an in-memory database. Operations work on clones so
    /// the data outlives each individual connection.
    Memory(Connection),
    File(PathBuf),
}

/// DuckDB store for the `notes` and `predictions` tables.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Each operation opens its own connection and drops it before returning;
/// nothing is shared between operations except the database itself.
pub struct DuckStore {
    target: Target,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES_SQL)?;
        Ok(Self {
            target: Target::Memory(conn),
        })
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES_SQL)?;
        info!(path = %path.display(), "opened duckdb note store");
        Ok(Self {
            target: Target::File(path.to_path_buf()),
        })
    }

    /// A fresh connection with the schema in place.
    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = match &self.target {
            Target::Memory(root) => root.try_clone()?,
            Target::File(path) => Connection::open(path)?,
        };
        conn.execute_batch(CREATE_TABLES_SQL)?;
        Ok(conn)
    }

    // ── Counts ──

    /// Number of rows in the `notes` table.
    pub fn notes_count(&self) -> Result<usize, StoreError> {
        self.count_table("notes")
    }

    /// Number of rows in the `predictions` table.
    pub fn predictions_count(&self) -> Result<usize, StoreError> {
        self.count_table("predictions")
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let conn = self.connect()?;
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ── Escape hatch ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}

impl NoteStore for DuckStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::DuckDb
    }

    fn insert_notes(&self, notes: &[Note]) -> Result<usize, StoreError> {
        let latest = last_write_per_id(notes);
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO notes (note_id, note_text, label) VALUES (?, ?, ?)
                 ON CONFLICT (note_id) DO UPDATE
                 SET note_text = excluded.note_text, label = excluded.label",
            )?;
            for note in &latest {
                stmt.execute(params![note.id, note.text, note.label])?;
            }
        }
        tx.commit()?;
        info!(count = latest.len(), "upserted notes");
        Ok(latest.len())
    }

    fn fetch_notes(&self, limit: Option<usize>) -> Result<Vec<Note>, StoreError> {
        let mut sql = String::from("SELECT note_id, note_text, label FROM notes ORDER BY note_id");
        if let Some(n) = effective_limit(limit) {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        let batches = self.query_arrow(&sql)?;
        let notes = notes_from_batches(&batches)?;
        debug!(count = notes.len(), "fetched notes");
        Ok(notes)
    }

    fn save_prediction(
        &self,
        note_id: i64,
        label: &str,
        probabilities: Option<&[(String, f64)]>,
    ) -> Result<i64, StoreError> {
        let proba_json = probabilities_to_json(probabilities)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let pred_id: i64 = tx.query_row(
            "INSERT INTO predictions (note_id, predicted_label, proba_json)
             VALUES (?, ?, ?) RETURNING pred_id",
            params![note_id, label, proba_json],
            |row| row.get(0),
        )?;
        tx.commit()?;
        debug!(pred_id, note_id, label, "saved prediction");
        Ok(pred_id)
    }

    fn fetch_predictions(&self, note_id: Option<i64>) -> Result<Vec<StoredPrediction>, StoreError> {
        let conn = self.connect()?;
        let mut sql = String::from(
            "SELECT pred_id, note_id, predicted_label, proba_json, CAST(created_at AS VARCHAR)
             FROM predictions",
        );
        if note_id.is_some() {
            sql.push_str(" WHERE note_id = ?");
        }
        sql.push_str(" ORDER BY pred_id");

        let mut stmt = conn.prepare(&sql)?;
        let map_row = |row: &duckdb::Row<'_>| -> duckdb::Result<StoredPrediction> {
            Ok(StoredPrediction {
                pred_id: row.get(0)?,
                note_id: row.get(1)?,
                predicted_label: row.get(2)?,
                proba_json: row.get(3)?,
                created_at: row.get(4)?,
            })
        };
        let rows = match note_id {
            Some(id) => stmt.query_map([id], map_row)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_notes() -> Vec<Note> {
        vec![
            Note::labelled(1, "fever and body aches", "flu"),
            Note::labelled(2, "throbbing headache with aura", "migraine"),
            Note::new(3, "wheezing at night"),
        ]
    }

    #[test]
    fn open_in_memory() {
        let store = DuckStore::open().unwrap();
        let batches = store.query_arrow("SELECT 1 AS x").unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 1);
        assert_eq!(store.notes_count().unwrap(), 0);
    }

    #[test]
    fn data_survives_per_operation_connections() {
        let store = DuckStore::open().unwrap();
        store.insert_notes(&sample_notes()).unwrap();
        assert_eq!(store.notes_count().unwrap(), 3);

        let notes = store.fetch_notes(None).unwrap();
        assert_eq!(notes, sample_notes());
    }

    #[test]
    fn insert_is_an_upsert() {
        let store = DuckStore::open().unwrap();
        store.insert_notes(&sample_notes()).unwrap();
        store.insert_notes(&sample_notes()).unwrap();
        store
            .insert_notes(&[Note::labelled(3, "nocturnal wheeze", "asthma")])
            .unwrap();

        assert_eq!(store.notes_count().unwrap(), 3);
        let notes = store.fetch_notes(None).unwrap();
        assert_eq!(notes[2], Note::labelled(3, "nocturnal wheeze", "asthma"));
    }

    #[test]
    fn repeated_id_in_one_batch_keeps_last() {
        let store = DuckStore::open().unwrap();
        store.insert_notes(&sample_notes()).unwrap();
        let written = store
            .insert_notes(&[
                Note::labelled(2, "aura", "migraine"),
                Note::labelled(4, "itchy rash", "eczema"),
                Note::labelled(2, "photophobia and aura", "migraine"),
            ])
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.notes_count().unwrap(), 4);
        let notes = store.fetch_notes(None).unwrap();
        assert_eq!(notes[1], Note::labelled(2, "photophobia and aura", "migraine"));
        assert_eq!(notes[3], Note::labelled(4, "itchy rash", "eczema"));
    }

    #[test]
    fn fetch_with_limit() {
        let store = DuckStore::open().unwrap();
        store.insert_notes(&sample_notes()).unwrap();

        let notes = store.fetch_notes(Some(2)).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, 1);
        assert_eq!(store.fetch_notes(Some(0)).unwrap().len(), 3);
    }

    #[test]
    fn fetch_from_empty_table() {
        let store = DuckStore::open().unwrap();
        assert!(store.fetch_notes(None).unwrap().is_empty());
    }

    #[test]
    fn save_and_read_predictions() {
        let store = DuckStore::open().unwrap();
        store.insert_notes(&sample_notes()).unwrap();

        let probs = vec![("flu".to_string(), 0.8), ("migraine".to_string(), 0.2)];
        let first = store.save_prediction(1, "flu", Some(&probs)).unwrap();
        let second = store.save_prediction(2, "migraine", None).unwrap();
        assert!(second > first);
        assert_eq!(store.predictions_count().unwrap(), 2);

        let rows = store.fetch_predictions(Some(1)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].predicted_label, "flu");
        assert_eq!(rows[0].probabilities().unwrap().unwrap(), probs);
        assert!(!rows[0].created_at.is_empty());

        let all = store.fetch_predictions(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].proba_json, None);
    }

    #[test]
    fn predictions_are_appended_not_replaced() {
        let store = DuckStore::open().unwrap();
        store.save_prediction(1, "flu", None).unwrap();
        store.save_prediction(1, "flu", None).unwrap();
        assert_eq!(store.fetch_predictions(Some(1)).unwrap().len(), 2);
    }

    // ── Persistent storage tests ──

    #[test]
    fn open_persistent_creates_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("notes.duckdb");
        assert!(!db_path.exists());

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(store.notes_count().unwrap(), 0);
    }

    #[test]
    fn persistent_insert_and_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("notes.duckdb");

        let store = DuckStore::open_persistent(&db_path).unwrap();
        store.insert_notes(&sample_notes()).unwrap();
        store.save_prediction(2, "migraine", None).unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert_eq!(store.fetch_notes(None).unwrap(), sample_notes());
        assert_eq!(store.predictions_count().unwrap(), 1);
    }
}
