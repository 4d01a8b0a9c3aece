//! Single-text inference over a fitted model.

use std::path::Path;

use notedx_core::{Normalizer, PredictionResult};

use crate::{FeatureModel, PipelineError, load_model};

/// A fitted model paired with the normalizer its training texts went
/// through. Read-only; never writes anywhere.
#[derive(Debug, Clone)]
pub struct Predictor {
    model: FeatureModel,
    normalizer: Normalizer,
}

impl Predictor {
    /// Load the artifact at `path`. A missing file is
    /// [`PipelineError::MissingArtifact`].
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        Self::from_model(load_model(path)?)
    }

    pub fn from_model(model: FeatureModel) -> Result<Self, PipelineError> {
        Self::with_normalizer(model, Normalizer::shared().clone())
    }

    /// Fails when `normalizer` differs from the one recorded in `model`.
    pub fn with_normalizer(
        model: FeatureModel,
        normalizer: Normalizer,
    ) -> Result<Self, PipelineError> {
        let expected = model.normalizer_fingerprint();
        let actual = normalizer.fingerprint();
        if expected != actual {
            return Err(PipelineError::IncompatibleArtifact(format!(
                "model was trained with normalizer {expected:08x}, this build uses {actual:08x}"
            )));
        }
        Ok(Self { model, normalizer })
    }

    pub fn model(&self) -> &FeatureModel {
        &self.model
    }

    pub fn normalize(&self, text: &str) -> String {
        self.normalizer.normalize(text)
    }

    pub fn predict_one(&self, text: &str) -> PredictionResult {
        self.predict_normalized(&self.normalize(text))
    }

    pub fn predict_many<S: AsRef<str>>(&self, texts: &[S]) -> Vec<PredictionResult> {
        texts.iter().map(|t| self.predict_one(t.as_ref())).collect()
    }

    pub(crate) fn predict_normalized(&self, normalized: &str) -> PredictionResult {
        self.model.predict_one(normalized)
    }
}

#[cfg(test)]
mod tests {
    use notedx_core::{ClassifierConfig, ClassifierStrategy, normalize};

    use super::*;
    use crate::{Pipeline, save_model};

    fn fitted(strategy: ClassifierStrategy) -> FeatureModel {
        let raw = [
            ("Fever, chills and a dry cough", "flu"),
            ("High fever with body aches and cough", "flu"),
            ("Throbbing headache with visual aura", "migraine"),
            ("Severe headache, nausea and light sensitivity", "migraine"),
        ];
        let x: Vec<String> = raw.iter().map(|(t, _)| normalize(t)).collect();
        let y: Vec<String> = raw.iter().map(|(_, l)| l.to_string()).collect();
        let config = ClassifierConfig {
            strategy,
            ..ClassifierConfig::default()
        };
        Pipeline::new(config, 42).fit(&x, &y).unwrap()
    }

    #[test]
    fn normalizes_before_predicting() {
        let predictor = Predictor::from_model(fitted(ClassifierStrategy::Logistic)).unwrap();
        let loud = predictor.predict_one("FEVER!!! and COUGH...");
        let quiet = predictor.predict_one("fever and cough");
        assert_eq!(loud, quiet);
        assert_eq!(loud.label, "flu");
    }

    #[test]
    fn probabilities_cover_every_class_once() {
        let predictor = Predictor::from_model(fitted(ClassifierStrategy::Logistic)).unwrap();
        let result = predictor.predict_one("pounding headache");
        let probs = result.probabilities.as_ref().unwrap();
        assert_eq!(probs.len(), 2);
        assert!((probs.iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-6);
        assert_eq!(result.label, "migraine");
    }

    #[test]
    fn reload_predicts_identically() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("model_pipeline.bin");
        let model = fitted(ClassifierStrategy::LinearSvm);
        let in_memory = Predictor::from_model(model.clone()).unwrap();
        save_model(&model, &path).unwrap();
        let reloaded = Predictor::load(&path).unwrap();

        for text in ["fever and cough", "aura", "", "Patient 42 reports SEVERE headache!!"] {
            assert_eq!(in_memory.predict_one(text), reloaded.predict_one(text), "{text:?}");
        }
    }

    #[test]
    fn empty_text_still_gets_a_label() {
        let predictor = Predictor::from_model(fitted(ClassifierStrategy::Logistic)).unwrap();
        let result = predictor.predict_one("?? 123 !!");
        assert!(predictor.model().classes().contains(&result.label));
    }

    #[test]
    fn predict_many_matches_predict_one() {
        let predictor = Predictor::from_model(fitted(ClassifierStrategy::Logistic)).unwrap();
        let texts = ["fever", "headache"];
        let many = predictor.predict_many(&texts);
        assert_eq!(many[0], predictor.predict_one("fever"));
        assert_eq!(many[1], predictor.predict_one("headache"));
    }

    #[test]
    fn inference_before_training_names_the_artifact() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("models").join("model_pipeline.bin");
        let err = Predictor::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::MissingArtifact(_)));
        assert!(err.to_string().contains(&path.display().to_string()));
    }
}
