//! Errors raised while reading or writing cached tensors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to access artifact '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Artifact '{}' is not a valid tensor file: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid tensor dimensions '{dimensions}': {message}")]
    InvalidDimensions { dimensions: String, message: String },

    #[error("Artifact '{artifact_id}' expected {expected} tensors, found {found}")]
    CountMismatch {
        artifact_id: String,
        expected: usize,
        found: usize,
    },

    #[error("Tensor {index} of '{artifact_id}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        artifact_id: String,
        index: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;
