//! Full-corpus evaluation of a persisted model.

use std::path::Path;

use notedx_core::Note;
use tracing::info;

use crate::artifact::save_report;
use crate::metrics::{ClassificationReport, classification_report};
use crate::{PipelineError, Predictor};

/// Scores every labelled note with an already-fitted model. Training notes
/// are included, so the numbers are optimistic by construction.
pub struct Evaluator<'a> {
    predictor: &'a Predictor,
}

impl<'a> Evaluator<'a> {
    pub fn new(predictor: &'a Predictor) -> Self {
        Self { predictor }
    }

    pub fn evaluate(&self, corpus: &[Note]) -> Result<ClassificationReport, PipelineError> {
        let mut y_true = Vec::with_capacity(corpus.len());
        let mut y_pred = Vec::with_capacity(corpus.len());
        for (row, note) in corpus.iter().enumerate() {
            let label = note.label.clone().ok_or_else(|| PipelineError::MissingField {
                column: "label".into(),
                row,
            })?;
            y_true.push(label);
            y_pred.push(self.predictor.predict_one(&note.text).label);
        }

        let report = classification_report(&y_true, &y_pred);
        info!(samples = report.n_samples, accuracy = report.accuracy, "evaluated corpus");
        Ok(report)
    }

    /// [`evaluate`](Self::evaluate) and write the report to `path`.
    pub fn run(&self, corpus: &[Note], path: &Path) -> Result<ClassificationReport, PipelineError> {
        let report = self.evaluate(corpus)?;
        save_report(&report, path)?;
        Ok(report)
    }
}
