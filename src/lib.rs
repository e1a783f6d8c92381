//! Framework-level latency benchmark harness.
//!
//! Resolves a benchmark id to a model definition, loads cached inputs and
//! expected outputs, runs a JIT-compiled model on the requested device (in
//! process or in an isolated worker), summarizes warmup and steady-state
//! latencies, and appends the record to a pre-populated JSON results file.

pub mod activation;
pub mod artifacts;
pub mod benchmarks;
pub mod compare;
pub mod config;
pub mod device;
pub mod errors;
pub mod jit;
pub mod matmul_config;
pub mod models;
pub mod registry;
pub mod tensor;

pub use activation::Activation;
pub use compare::{ComparisonReport, Tolerance, compare_results};
pub use config::{ConfigLoader, HarnessConfig};
pub use device::{Backend, Device};
pub use jit::JitFunction;
pub use models::{Model, ModelFamily};
pub use registry::{BenchmarkLookup, DataType, ModelDefinition, ModelDefinitionTable};
pub use tensor::{ElementType, Tensor, TensorShape};
