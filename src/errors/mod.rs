//! Error types for the benchmark harness.
//!
//! Each concern owns a specific error enum instead of a generic wrapper like
//! `anyhow` or `Box<dyn Error>`, so callers can tell fatal failures (lookup,
//! artifacts, results file, configuration) apart from contained ones
//! (execution, isolation).

mod artifact_error;
mod config_error;
mod execution_error;
mod isolation_error;
mod lookup_error;
mod results_file_error;

pub use artifact_error::{ArtifactError, ArtifactResult};
pub use config_error::{ConfigError, ConfigResult};
pub use execution_error::{ExecutionError, ExecutionResult};
pub use isolation_error::{IsolationError, IsolationResult};
pub use lookup_error::LookupError;
pub use results_file_error::{ResultsFileError, ResultsFileResult};

use thiserror::Error;

/// Result type alias for registry lookups.
pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Fatal errors surfaced by the binaries.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    ResultsFile(#[from] ResultsFileError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Failed to parse definitions table '{path}': {message}")]
    Definitions { path: String, message: String },
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
