//! Errors raised by the parent side of an isolated worker run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IsolationError {
    #[error("Failed to spawn worker process '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Worker pipe error: {source}")]
    Pipe { source: std::io::Error },

    #[error("Worker timed out after {seconds}s and was killed")]
    Timeout { seconds: u64 },

    #[error("Worker exited with {status} before sending a response")]
    ChildExited { status: String },

    #[error("Malformed worker message: {message}")]
    Protocol { message: String },
}

pub type IsolationResult<T> = std::result::Result<T, IsolationError>;
