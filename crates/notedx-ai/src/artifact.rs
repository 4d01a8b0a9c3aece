//! On-disk model artifact and report files.
//!
//! The artifact is a bincode header (`magic`, `format_version`) followed by
//! the bincode-encoded [`FeatureModel`]. Files are written to a temp file in
//! the destination directory and renamed into place, so readers never see a
//! partial artifact.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::metrics::ClassificationReport;
use crate::{FeatureModel, PipelineError};

const MAGIC: &str = "notedx-model";
const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: String,
    format_version: u32,
}

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

pub(crate) fn encode_model(model: &FeatureModel) -> Result<Vec<u8>, PipelineError> {
    let header = Header {
        magic: MAGIC.to_string(),
        format_version: FORMAT_VERSION,
    };
    let mut bytes = bincode::serde::encode_to_vec(&header, bincode_config())?;
    bytes.extend(bincode::serde::encode_to_vec(model, bincode_config())?);
    Ok(bytes)
}

pub(crate) fn decode_model(bytes: &[u8]) -> Result<FeatureModel, PipelineError> {
    let (header, read): (Header, usize) =
        bincode::serde::decode_from_slice(bytes, bincode_config()).map_err(|_| {
            PipelineError::IncompatibleArtifact("not a notedx model file".into())
        })?;
    if header.magic != MAGIC {
        return Err(PipelineError::IncompatibleArtifact(format!(
            "unexpected magic '{}'",
            header.magic
        )));
    }
    if header.format_version != FORMAT_VERSION {
        return Err(PipelineError::IncompatibleArtifact(format!(
            "format version {} (this build reads version {FORMAT_VERSION})",
            header.format_version
        )));
    }

    let (model, _): (FeatureModel, usize) =
        bincode::serde::decode_from_slice(&bytes[read..], bincode_config())?;
    Ok(model)
}

/// Persist `model` at `path`, replacing any previous artifact atomically.
pub fn save_model(model: &FeatureModel, path: &Path) -> Result<(), PipelineError> {
    let bytes = encode_model(model)?;
    write_atomic(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "saved model artifact");
    Ok(())
}

/// Read an artifact written by [`save_model`].
pub fn load_model(path: &Path) -> Result<FeatureModel, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingArtifact(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(PipelineError::io("load", path))?;
    let model = decode_model(&bytes)?;
    info!(
        path = %path.display(),
        classes = model.classes().len(),
        strategy = %model.strategy(),
        features = model.vectorizer().n_features(),
        ngram_range = ?model.vectorizer().ngram_range(),
        max_features = model.vectorizer().max_features(),
        "loaded model artifact"
    );
    Ok(model)
}

/// Write `report` as pretty JSON, replacing any previous file.
pub(crate) fn save_report(report: &ClassificationReport, path: &Path) -> Result<(), PipelineError> {
    let mut json = serde_json::to_vec_pretty(report)?;
    json.push(b'\n');
    write_atomic(path, &json)?;
    info!(path = %path.display(), accuracy = report.accuracy, "wrote classification report");
    Ok(())
}

/// Write to a temp file next to `path`, then rename over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(PipelineError::io("persist", dir))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(PipelineError::io("persist", dir))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(PipelineError::io("persist", tmp.path()))?;
    tmp.persist(path)
        .map_err(|e| PipelineError::io("persist", path)(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use notedx_core::ClassifierConfig;

    use super::*;
    use crate::Pipeline;

    fn model() -> FeatureModel {
        let x: Vec<String> = ["fever cough", "fever chill", "headache aura", "aura nausea"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let y: Vec<String> = ["flu", "flu", "migraine", "migraine"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Pipeline::new(ClassifierConfig::default(), 42).fit(&x, &y).unwrap()
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("models").join("model_pipeline.bin");
        let model = model();

        save_model(&model, &path).unwrap();
        assert!(path.exists());
        assert_eq!(load_model(&path).unwrap(), model);
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode_model(&model()).unwrap(), encode_model(&model()).unwrap());
    }

    #[test]
    fn overwrite_replaces_previous_artifact() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("model_pipeline.bin");
        std::fs::write(&path, b"stale").unwrap();

        save_model(&model(), &path).unwrap();
        assert_eq!(load_model(&path).unwrap(), model());
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_artifact_names_the_path() {
        let path = Path::new("/nonexistent/models/model_pipeline.bin");
        let err = load_model(path).unwrap_err();
        assert!(matches!(err, PipelineError::MissingArtifact(ref p) if p == path));
        assert!(err.to_string().contains("model_pipeline.bin"));
    }

    #[test]
    fn garbage_is_incompatible() {
        let err = decode_model(b"\xff\xff\xff\xff").unwrap_err();
        assert!(matches!(err, PipelineError::IncompatibleArtifact(_)));
    }

    #[test]
    fn wrong_version_is_incompatible() {
        let header = Header {
            magic: MAGIC.to_string(),
            format_version: FORMAT_VERSION + 1,
        };
        let bytes = bincode::serde::encode_to_vec(&header, bincode_config()).unwrap();
        let err = decode_model(&bytes).unwrap_err();
        assert!(err.to_string().contains("format version 2"), "got {err}");
    }

    #[test]
    fn report_is_pretty_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("reports").join("classification_report.json");
        let y = vec!["flu".to_string()];
        save_report(&crate::classification_report(&y, &y), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"accuracy\": 1.0"));
    }
}
