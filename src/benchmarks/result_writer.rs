//! Merges benchmark records into a pre-populated results file.

use super::benchmark_types::BenchmarkRecord;
use crate::errors::{ResultsFileError, ResultsFileResult};
use log::info;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

/// Host and harness metadata stored under `execution_environment`.
pub fn environment_info() -> Value {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .ok();
    let executable = std::env::current_exe()
        .ok()
        .map(|path| path.display().to_string());

    json!({
        "rust_environment": {
            "package": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "family": std::env::consts::FAMILY,
            "available_parallelism": parallelism,
            "executable": executable,
        }
    })
}

/// Appends `record` to the file's `benchmarks` list and refreshes
/// `execution_environment`.
///
/// The file must already hold an object with a `benchmarks` array; it is
/// never created. Not atomic: concurrent writers to one file are unsupported.
pub fn dump_result(path: &Path, record: &BenchmarkRecord) -> ResultsFileResult<()> {
    let content = fs::read_to_string(path).map_err(|source| ResultsFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut document: Value =
        serde_json::from_str(&content).map_err(|source| ResultsFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let record = serde_json::to_value(record)
        .map_err(|source| ResultsFileError::Serialize { source })?;

    let object = document
        .as_object_mut()
        .ok_or_else(|| ResultsFileError::MissingBenchmarks {
            path: path.to_path_buf(),
        })?;
    object
        .get_mut("benchmarks")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ResultsFileError::MissingBenchmarks {
            path: path.to_path_buf(),
        })?
        .push(record);
    object.insert("execution_environment".to_string(), environment_info());

    let serialized = serde_json::to_string(&document)
        .map_err(|source| ResultsFileError::Serialize { source })?;
    fs::write(path, serialized).map_err(|source| ResultsFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Appended result to {}", path.display());
    Ok(())
}
