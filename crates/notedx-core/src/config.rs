//! Explicit runtime configuration.
//!
//! A [`Settings`] value is built once at process start (the CLI fills it from
//! flags and environment) and handed to the trainer, predictor and store
//! constructors. Nothing here reads the environment on its own.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// File name of the fitted pipeline inside `model_dir`.
pub const ARTIFACT_FILE: &str = "model_pipeline.bin";
/// Holdout report written by a training run.
pub const REPORT_FILE: &str = "classification_report.json";
/// Full-dataset report written by the evaluator.
pub const EVAL_REPORT_FILE: &str = "eval_full_dataset.json";

/// Seed shared by the stratified split and the SGD shuffle.
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Labelled CSV used by `train`, `evaluate` and `load-csv`.
    pub data_path: PathBuf,
    pub model_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub seed: u64,
    pub store: StoreConfig,
    pub classifier: ClassifierConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/synthetic_notes.csv"),
            model_dir: PathBuf::from("models"),
            reports_dir: PathBuf::from("reports"),
            seed: DEFAULT_SEED,
            store: StoreConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl Settings {
    pub fn artifact_path(&self) -> PathBuf {
        self.model_dir.join(ARTIFACT_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.reports_dir.join(REPORT_FILE)
    }

    pub fn eval_report_path(&self) -> PathBuf {
        self.reports_dir.join(EVAL_REPORT_FILE)
    }
}

// ── Store ──

/// Which note store implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// DuckDB, file-backed (or in-memory when the path is `:memory:`).
    #[default]
    DuckDb,
    /// Process-local store; contents vanish on exit.
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuckDb => "duckdb",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duckdb" | "duck" => Ok(Self::DuckDb),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!(
                "unknown store backend '{other}' (expected 'duckdb' or 'memory')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file for the DuckDB backend. Ignored by the memory backend.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::DuckDb,
            path: PathBuf::from("./local.duckdb"),
        }
    }
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::new(),
        }
    }

    pub fn duckdb(path: impl AsRef<Path>) -> Self {
        Self {
            backend: StoreBackend::DuckDb,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// True when the DuckDB backend should run without a backing file.
    pub fn is_in_memory(&self) -> bool {
        self.backend == StoreBackend::Memory
            || self.path.as_os_str().is_empty()
            || self.path == Path::new(":memory:")
    }
}

// ── Classifier ──

/// Linear classifier fitted on the TF-IDF matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStrategy {
    /// Multinomial logistic regression with native probabilities.
    #[default]
    Logistic,
    /// One-vs-rest hinge-loss SVM, optionally Platt-calibrated.
    LinearSvm,
}

impl ClassifierStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logistic => "logistic",
            Self::LinearSvm => "linear_svm",
        }
    }
}

impl fmt::Display for ClassifierStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "logistic" | "logreg" | "logistic_regression" => Ok(Self::Logistic),
            "linear_svm" | "svm" => Ok(Self::LinearSvm),
            other => Err(format!(
                "unknown classifier strategy '{other}' (expected 'logistic' or 'svm')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub strategy: ClassifierStrategy,
    /// Wrap the SVM margins in a cross-validated sigmoid calibrator.
    /// Without it the fitted model has no probability output.
    pub calibrate: bool,
    pub calibration_folds: usize,
    /// Vocabulary cap, applied by corpus term frequency.
    pub max_features: usize,
    /// Inclusive n-gram range.
    pub ngram_range: (usize, usize),
    /// Inverse L2 regularisation strength for logistic regression.
    pub c: f64,
    /// Gradient descent iterations for logistic regression.
    pub max_iter: usize,
    /// Passes over the training set for the SVM.
    pub sgd_epochs: usize,
    /// L2 regularisation for the SVM.
    pub sgd_alpha: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::Logistic,
            calibrate: true,
            calibration_folds: 3,
            max_features: 10_000,
            ngram_range: (1, 2),
            c: 1.0,
            max_iter: 300,
            sgd_epochs: 50,
            sgd_alpha: 1e-4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths() {
        let s = Settings::default();
        assert_eq!(s.artifact_path(), PathBuf::from("models/model_pipeline.bin"));
        assert_eq!(
            s.report_path(),
            PathBuf::from("reports/classification_report.json")
        );
        assert_eq!(
            s.eval_report_path(),
            PathBuf::from("reports/eval_full_dataset.json")
        );
        assert_eq!(s.seed, 42);
    }

    #[test]
    fn default_classifier_matches_training_setup() {
        let c = ClassifierConfig::default();
        assert_eq!(c.strategy, ClassifierStrategy::Logistic);
        assert_eq!(c.max_features, 10_000);
        assert_eq!(c.ngram_range, (1, 2));
        assert!(c.calibrate);
        assert_eq!(c.calibration_folds, 3);
    }

    #[test]
    fn parse_backend() {
        assert_eq!("duckdb".parse::<StoreBackend>(), Ok(StoreBackend::DuckDb));
        assert_eq!("MEMORY".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("mysql".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn parse_strategy() {
        assert_eq!(
            "logistic".parse::<ClassifierStrategy>(),
            Ok(ClassifierStrategy::Logistic)
        );
        assert_eq!(
            "linear-svm".parse::<ClassifierStrategy>(),
            Ok(ClassifierStrategy::LinearSvm)
        );
        assert_eq!("svm".parse::<ClassifierStrategy>(), Ok(ClassifierStrategy::LinearSvm));
        assert!("forest".parse::<ClassifierStrategy>().is_err());
    }

    #[test]
    fn strategy_display_roundtrips() {
        for s in [ClassifierStrategy::Logistic, ClassifierStrategy::LinearSvm] {
            assert_eq!(s.to_string().parse::<ClassifierStrategy>(), Ok(s));
        }
    }

    #[test]
    fn in_memory_detection() {
        assert!(StoreConfig::memory().is_in_memory());
        assert!(StoreConfig::duckdb(":memory:").is_in_memory());
        assert!(!StoreConfig::duckdb("notes.duckdb").is_in_memory());
    }
}
