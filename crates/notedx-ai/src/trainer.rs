//! Offline training: validate, normalize, split, fit, score, persist.

use notedx_core::{Normalizer, Note, Settings};
use tracing::{info, warn};

use crate::artifact::{save_model, save_report};
use crate::metrics::{ClassificationReport, classification_report};
use crate::split::{Split, stratified_holdout};
use crate::{FeatureModel, Pipeline, PipelineError};

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model: FeatureModel,
    /// Scores on the held-out partition.
    pub report: ClassificationReport,
    pub split: Split,
}

pub struct Trainer {
    settings: Settings,
    normalizer: Normalizer,
}

impl Trainer {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            normalizer: Normalizer::shared().clone(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Fit on a labelled corpus and score the per-class holdout. Nothing is
    /// written to disk.
    pub fn train(&self, corpus: &[Note]) -> Result<TrainOutcome, PipelineError> {
        if corpus.is_empty() {
            return Err(PipelineError::EmptyCorpus("corpus has no notes".into()));
        }

        let mut texts = Vec::with_capacity(corpus.len());
        let mut labels = Vec::with_capacity(corpus.len());
        for (row, note) in corpus.iter().enumerate() {
            let label = match note.label.as_deref() {
                Some(label) if !label.trim().is_empty() => label,
                _ => {
                    return Err(PipelineError::MissingField {
                        column: "label".into(),
                        row,
                    });
                }
            };
            texts.push(self.normalizer.normalize(&note.text));
            labels.push(label.to_string());
        }

        let empty = texts.iter().filter(|t| t.is_empty()).count();
        if empty > 0 {
            warn!(count = empty, "notes normalized to empty text");
        }

        let split = stratified_holdout(&labels, self.settings.seed);
        if split.train.is_empty() {
            return Err(PipelineError::EmptyCorpus(
                "every label has a single example, so all of them are held out".into(),
            ));
        }

        let pick = |indices: &[usize], source: &[String]| -> Vec<String> {
            indices.iter().map(|&i| source[i].clone()).collect()
        };
        let train_x = pick(&split.train, &texts);
        let train_y = pick(&split.train, &labels);
        let test_x = pick(&split.test, &texts);
        let test_y = pick(&split.test, &labels);

        info!(
            train = train_x.len(),
            test = test_x.len(),
            labels = split.test.len(),
            "split corpus"
        );

        let model = Pipeline::new(self.settings.classifier.clone(), self.settings.seed)
            .with_normalizer(&self.normalizer)
            .fit(&train_x, &train_y)?;

        let predicted = model.predict(&test_x);
        let report = classification_report(&test_y, &predicted);
        info!(accuracy = report.accuracy, "scored holdout");

        Ok(TrainOutcome {
            model,
            report,
            split,
        })
    }

    /// [`train`](Self::train), then replace the artifact and the holdout
    /// report under the configured directories.
    pub fn run(&self, corpus: &[Note]) -> Result<TrainOutcome, PipelineError> {
        let outcome = self.train(corpus)?;
        save_model(&outcome.model, &self.settings.artifact_path())?;
        save_report(&outcome.report, &self.settings.report_path())?;
        Ok(outcome)
    }
}
