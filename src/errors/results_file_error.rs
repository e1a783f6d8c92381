//! Errors raised while merging a record into the results file.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResultsFileError {
    #[error("Failed to access results file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Results file '{}' is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Results file '{}' has no \"benchmarks\" list; it must be pre-populated", path.display())]
    MissingBenchmarks { path: PathBuf },

    #[error("Failed to serialize benchmark record: {source}")]
    Serialize { source: serde_json::Error },
}

pub type ResultsFileResult<T> = std::result::Result<T, ResultsFileError>;
