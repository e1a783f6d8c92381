//! Errors raised while building, compiling, or running a model on a device.

use thiserror::Error;

/// Runtime execution failures.
///
/// These never escape the benchmark runner: they are logged and the run
/// commits no metrics.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Unsupported device '{device}'. Supported: cpu, gpu")]
    UnsupportedDevice { device: String },

    #[error("Device '{device}' is not available: {message}")]
    DeviceUnavailable { device: String, message: String },

    #[error("Input shape mismatch for {model}: expected {expected}, got {actual:?}")]
    ShapeMismatch {
        model: String,
        expected: String,
        actual: Vec<usize>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Compilation failed: {message}")]
    Compilation { message: String },

    #[error("GPU error: {message}")]
    Gpu { message: String },
}

pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;
