//! The note store contract shared by every backend.

use std::collections::BTreeMap;

use notedx_core::{Note, StoreBackend, StoreConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{MemoryStore, StoreError};

/// Persistence for notes and the predictions made on them.
///
/// Every call is self-contained: implementations acquire whatever connection
/// they need, run inside a single transaction where they write, and release
/// it before returning, on success and on error alike.
pub trait NoteStore {
    fn backend(&self) -> StoreBackend;

    /// Upsert keyed by `note.id`. When `notes` repeats an id, the last
    /// occurrence wins. Returns the number of distinct ids written.
    fn insert_notes(&self, notes: &[Note]) -> Result<usize, StoreError>;

    /// Notes ordered by id. `None` and `Some(0)` both mean "no limit".
    fn fetch_notes(&self, limit: Option<usize>) -> Result<Vec<Note>, StoreError>;

    /// Append a timestamped prediction row and return its `pred_id`.
    ///
    /// `probabilities` is stored as a JSON object (label → probability) or NULL.
    fn save_prediction(
        &self,
        note_id: i64,
        label: &str,
        probabilities: Option<&[(String, f64)]>,
    ) -> Result<i64, StoreError>;

    /// Predictions ordered by `pred_id`, optionally for one note only.
    fn fetch_predictions(&self, note_id: Option<i64>) -> Result<Vec<StoredPrediction>, StoreError>;
}

/// A row of the `predictions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrediction {
    pub pred_id: i64,
    pub note_id: i64,
    pub predicted_label: String,
    pub proba_json: Option<String>,
    /// Insert time as rendered by the backend (`YYYY-MM-DD HH:MM:SS[.ffffff]`).
    pub created_at: String,
}

impl StoredPrediction {
    /// Decode `proba_json` back into `(label, probability)` pairs sorted by label.
    pub fn probabilities(&self) -> Result<Option<Vec<(String, f64)>>, StoreError> {
        let Some(json) = &self.proba_json else {
            return Ok(None);
        };
        let map: std::collections::BTreeMap<String, f64> = serde_json::from_str(json)?;
        Ok(Some(map.into_iter().collect()))
    }
}

/// Open the backend named by `config`.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn NoteStore>, StoreError> {
    info!(backend = %config.backend, path = %config.path.display(), "opening note store");
    match config.backend {
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
        #[cfg(feature = "duckdb")]
        StoreBackend::DuckDb => {
            let store = if config.is_in_memory() {
                crate::DuckStore::open()?
            } else {
                crate::DuckStore::open_persistent(&config.path)?
            };
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "duckdb"))]
        StoreBackend::DuckDb => Err(StoreError::BackendUnavailable("duckdb")),
    }
}

/// Serialize probabilities as a JSON object keyed by label.
pub(crate) fn probabilities_to_json(
    probabilities: Option<&[(String, f64)]>,
) -> Result<Option<String>, StoreError> {
    probabilities
        .map(|pairs| {
            let map: serde_json::Map<String, serde_json::Value> = pairs
                .iter()
                .map(|(label, p)| (label.clone(), serde_json::Value::from(*p)))
                .collect();
            serde_json::to_string(&map)
        })
        .transpose()
        .map_err(StoreError::from)
}

/// One note per id, the last occurrence in `notes`, ordered by id.
pub(crate) fn last_write_per_id(notes: &[Note]) -> Vec<&Note> {
    let mut latest: BTreeMap<i64, &Note> = BTreeMap::new();
    for note in notes {
        latest.insert(note.id, note);
    }
    latest.into_values().collect()
}

/// Treat `Some(0)` like the unlimited case.
pub(crate) fn effective_limit(limit: Option<usize>) -> Option<usize> {
    limit.filter(|&n| n > 0)
}
