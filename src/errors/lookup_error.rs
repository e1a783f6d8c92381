//! Errors raised while resolving a benchmark identifier.

use thiserror::Error;

/// Failures of [`crate::registry::BenchmarkLookup::lookup`].
///
/// Both kinds abort the invocation before any device work happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error(
        "Id {id} does not exist in model suite. Expected one of:\n  {}",
        known.join("\n  ")
    )]
    UnknownBenchmark { id: String, known: Vec<String> },

    #[error(
        "Model definition not supported: {id} is registered but matches no supported model family (registry and family tables are inconsistent)"
    )]
    UnsupportedModel { id: String },
}
