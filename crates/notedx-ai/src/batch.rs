//! Score stored notes and append the predictions to the store.

use notedx_store::NoteStore;
use serde::Serialize;
use tracing::{info, warn};

use crate::{PipelineError, Predictor};

/// Counts from one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub fetched: usize,
    pub saved: usize,
    /// Notes whose text normalized to nothing; they are still scored.
    pub empty_text: usize,
}

pub struct BatchRunner<'a> {
    predictor: &'a Predictor,
    store: &'a dyn NoteStore,
}

impl<'a> BatchRunner<'a> {
    pub fn new(predictor: &'a Predictor, store: &'a dyn NoteStore) -> Self {
        Self { predictor, store }
    }

    /// Fetch up to `limit` notes (all when `None` or `Some(0)`), predict
    /// each, and save one prediction row per note. Stops at the first store
    /// error; rows saved before it stay saved.
    pub fn run(&self, limit: Option<usize>) -> Result<BatchSummary, PipelineError> {
        let notes = self
            .store
            .fetch_notes(limit)
            .map_err(PipelineError::store("fetch notes"))?;

        let mut summary = BatchSummary {
            fetched: notes.len(),
            ..BatchSummary::default()
        };

        for note in &notes {
            let normalized = self.predictor.normalize(&note.text);
            if normalized.is_empty() {
                warn!(note_id = note.id, "note text normalized to empty");
                summary.empty_text += 1;
            }
            let result = self.predictor.predict_normalized(&normalized);
            self.store
                .save_prediction(note.id, &result.label, result.probabilities.as_deref())
                .map_err(PipelineError::store("save prediction"))?;
            summary.saved += 1;
        }

        info!(
            backend = %self.store.backend(),
            fetched = summary.fetched,
            saved = summary.saved,
            "batch prediction complete"
        );
        Ok(summary)
    }
}
