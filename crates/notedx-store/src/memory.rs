//! Process-local note store.
//!
//! Same contract as the DuckDB backend, without a database. Used by tests
//! and for dry runs of the batch command.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use notedx_core::{Note, StoreBackend};
use tracing::debug;

use crate::store::{effective_limit, last_write_per_id, probabilities_to_json};
use crate::{NoteStore, StoreError, StoredPrediction};

#[derive(Default)]
struct Tables {
    notes: BTreeMap<i64, Note>,
    predictions: Vec<StoredPrediction>,
    next_pred_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T, StoreError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Other("memory store lock poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

impl NoteStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    fn insert_notes(&self, notes: &[Note]) -> Result<usize, StoreError> {
        let latest = last_write_per_id(notes);
        self.with_tables(|t| {
            for note in &latest {
                t.notes.insert(note.id, (*note).clone());
            }
            debug!(count = latest.len(), "upserted notes");
            latest.len()
        })
    }

    fn fetch_notes(&self, limit: Option<usize>) -> Result<Vec<Note>, StoreError> {
        let limit = effective_limit(limit).unwrap_or(usize::MAX);
        self.with_tables(|t| t.notes.values().take(limit).cloned().collect())
    }

    fn save_prediction(
        &self,
        note_id: i64,
        label: &str,
        probabilities: Option<&[(String, f64)]>,
    ) -> Result<i64, StoreError> {
        let proba_json = probabilities_to_json(probabilities)?;
        self.with_tables(|t| {
            t.next_pred_id += 1;
            let pred_id = t.next_pred_id;
            t.predictions.push(StoredPrediction {
                pred_id,
                note_id,
                predicted_label: label.to_string(),
                proba_json,
                created_at: Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            });
            pred_id
        })
    }

    fn fetch_predictions(&self, note_id: Option<i64>) -> Result<Vec<StoredPrediction>, StoreError> {
        self.with_tables(|t| {
            t.predictions
                .iter()
                .filter(|p| note_id.is_none_or(|id| p.note_id == id))
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_by_id() {
        let store = MemoryStore::new();
        store
            .insert_notes(&[
                Note::labelled(1, "cough", "flu"),
                Note::labelled(2, "aura", "migraine"),
            ])
            .unwrap();
        store
            .insert_notes(&[Note::labelled(1, "dry cough", "cold")])
            .unwrap();

        let notes = store.fetch_notes(None).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0], Note::labelled(1, "dry cough", "cold"));
    }

    #[test]
    fn repeated_id_in_one_batch_keeps_last() {
        let store = MemoryStore::new();
        let written = store
            .insert_notes(&[
                Note::labelled(1, "cough", "flu"),
                Note::labelled(1, "dry cough", "cold"),
            ])
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(
            store.fetch_notes(None).unwrap(),
            vec![Note::labelled(1, "dry cough", "cold")]
        );
    }

    #[test]
    fn fetch_respects_limit_and_order() {
        let store = MemoryStore::new();
        store
            .insert_notes(&[Note::new(3, "c"), Note::new(1, "a"), Note::new(2, "b")])
            .unwrap();

        let ids: Vec<i64> = store
            .fetch_notes(Some(2))
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.fetch_notes(Some(0)).unwrap().len(), 3);
    }

    #[test]
    fn predictions_append_with_increasing_ids() {
        let store = MemoryStore::new();
        let probs = vec![("flu".to_string(), 0.9), ("cold".to_string(), 0.1)];
        let a = store.save_prediction(1, "flu", Some(&probs)).unwrap();
        let b = store.save_prediction(1, "flu", None).unwrap();
        let c = store.save_prediction(2, "cold", None).unwrap();
        assert!(a < b && b < c);

        let for_one = store.fetch_predictions(Some(1)).unwrap();
        assert_eq!(for_one.len(), 2);
        assert_eq!(
            for_one[0].probabilities().unwrap().unwrap(),
            vec![("cold".to_string(), 0.1), ("flu".to_string(), 0.9)]
        );
        assert_eq!(for_one[1].proba_json, None);
        assert_eq!(store.fetch_predictions(None).unwrap().len(), 3);
    }
}
