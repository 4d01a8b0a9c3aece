//! Vectorizer plus classifier as one fit/predict unit.

use std::collections::BTreeSet;

use notedx_core::{ClassifierConfig, ClassifierStrategy, Normalizer, PredictionResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::PipelineError;
use crate::classifier::ClassifierModel;
use crate::vectorizer::{SparseVec, TfidfVectorizer};

/// Fits a [`FeatureModel`] from normalized texts and labels.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ClassifierConfig,
    seed: u64,
    normalizer_fingerprint: u32,
}

impl Pipeline {
    /// A pipeline for texts produced by the default [`Normalizer`].
    pub fn new(config: ClassifierConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            normalizer_fingerprint: Normalizer::shared().fingerprint(),
        }
    }

    /// Record a different normalizer in the fitted model.
    pub fn with_normalizer(mut self, normalizer: &Normalizer) -> Self {
        self.normalizer_fingerprint = normalizer.fingerprint();
        self
    }

    /// Fit on normalized texts `x` with labels `y`. Classes are ordered
    /// lexicographically; that order is fixed for the life of the model.
    pub fn fit(&self, x: &[String], y: &[String]) -> Result<FeatureModel, PipelineError> {
        if x.len() != y.len() {
            return Err(PipelineError::Fit(format!(
                "{} texts but {} labels",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(PipelineError::EmptyCorpus("no training examples".into()));
        }

        let classes: Vec<String> = y.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let targets: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let vectorizer =
            TfidfVectorizer::fit(x, self.config.ngram_range, self.config.max_features)?;
        let rows = vectorizer.transform_many(x);
        let classifier = ClassifierModel::fit(
            &rows,
            &targets,
            classes.len(),
            vectorizer.n_features(),
            &self.config,
            self.seed,
        );

        info!(
            strategy = %self.config.strategy,
            samples = x.len(),
            classes = classes.len(),
            features = vectorizer.n_features(),
            supports_proba = classifier.supports_proba(),
            "fitted pipeline"
        );

        Ok(FeatureModel {
            vectorizer,
            classifier,
            classes,
            normalizer_fingerprint: self.normalizer_fingerprint,
        })
    }
}

/// Fitted vectorizer and classifier, the unit that gets persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureModel {
    vectorizer: TfidfVectorizer,
    classifier: ClassifierModel,
    classes: Vec<String>,
    normalizer_fingerprint: u32,
}

impl FeatureModel {
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn strategy(&self) -> ClassifierStrategy {
        self.classifier.strategy()
    }

    /// Whether [`predict_proba`](Self::predict_proba) returns values. Fixed
    /// when the model is fitted.
    pub fn supports_proba(&self) -> bool {
        self.classifier.supports_proba()
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    /// Fingerprint of the normalizer the training texts went through.
    pub fn normalizer_fingerprint(&self) -> u32 {
        self.normalizer_fingerprint
    }

    /// Most likely class per normalized text.
    pub fn predict(&self, x: &[String]) -> Vec<String> {
        x.iter().map(|text| self.predict_one(text).label).collect()
    }

    /// One row per text, one value per class in [`classes`](Self::classes)
    /// order, each row summing to 1.
    pub fn predict_proba(&self, x: &[String]) -> Option<Vec<Vec<f64>>> {
        if !self.supports_proba() {
            return None;
        }
        x.iter()
            .map(|text| self.proba_row(&self.vectorizer.transform(text)))
            .collect()
    }

    /// Label plus `(class, probability)` pairs for one normalized text.
    pub fn predict_one(&self, normalized: &str) -> PredictionResult {
        let row = self.vectorizer.transform(normalized);
        match self.proba_row(&row) {
            Some(probs) => {
                let label = self.classes[argmax(&probs)].clone();
                let probabilities = self.classes.iter().cloned().zip(probs).collect();
                PredictionResult {
                    label,
                    probabilities: Some(probabilities),
                }
            }
            None => {
                let margins = self.classifier.decision(&row);
                PredictionResult::label_only(self.classes[argmax(&margins)].clone())
            }
        }
    }

    fn proba_row(&self, row: &SparseVec) -> Option<Vec<f64>> {
        self.classifier.raw_proba(row).map(renormalize)
    }
}

/// Shared by every strategy: clamp to [0, 1] and rescale to sum 1. An
/// all-zero row becomes uniform.
pub(crate) fn renormalize(scores: Vec<f64>) -> Vec<f64> {
    let clamped: Vec<f64> = scores
        .into_iter()
        .map(|p| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 })
        .collect();
    let sum: f64 = clamped.iter().sum();
    if sum > 0.0 {
        clamped.into_iter().map(|p| p / sum).collect()
    } else {
        let n = clamped.len() as f64;
        vec![1.0 / n; clamped.len()]
    }
}

/// Index of the largest value; ties go to the earliest index.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
