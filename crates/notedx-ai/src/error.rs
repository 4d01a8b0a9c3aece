use std::path::PathBuf;

use notedx_store::StoreError;
use thiserror::Error;

/// Failures of the training and inference flows.
///
/// Each message starts with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("load: no fitted model at {0} (run `notedx train` first)")]
    MissingArtifact(PathBuf),

    #[error("load: incompatible model artifact: {0}")]
    IncompatibleArtifact(String),

    #[error("normalize: missing value for '{column}' at row {row}")]
    MissingField { column: String, row: usize },

    #[error("fit: empty training set ({0})")]
    EmptyCorpus(String),

    #[error("fit: {0}")]
    Fit(String),

    #[error("{stage}: {path}: {source}")]
    Io {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("persist: artifact encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("load: artifact decoding failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("persist: report serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{stage}: {source}")]
    Store {
        stage: &'static str,
        source: StoreError,
    },
}

impl PipelineError {
    pub(crate) fn io(
        stage: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            stage,
            path,
            source,
        }
    }

    pub(crate) fn store(stage: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { stage, source }
    }
}
