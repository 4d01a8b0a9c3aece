//! Text classification layer: TF-IDF features and linear classifiers behind
//! a single fit/predict unit, plus the training, inference, evaluation and
//! batch scoring flows built on it.

mod artifact;
mod batch;
mod calibration;
mod classifier;
mod error;
mod evaluator;
mod metrics;
mod pipeline;
mod predictor;
mod split;
mod trainer;
mod vectorizer;

pub use artifact::{load_model, save_model};
pub use batch::{BatchRunner, BatchSummary};
pub use error::PipelineError;
pub use evaluator::Evaluator;
pub use metrics::{ClassMetrics, ClassificationReport, classification_report};
pub use pipeline::{FeatureModel, Pipeline};
pub use predictor::Predictor;
pub use split::{Split, stratified_holdout};
pub use trainer::{TrainOutcome, Trainer};
pub use vectorizer::{SparseVec, TfidfVectorizer};
