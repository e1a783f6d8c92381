//! Framework-level benchmarking: run, isolate, summarize, and record.

pub mod benchmark_runner;
pub mod benchmark_types;
pub mod isolation;
pub mod performance_metrics;
pub mod result_writer;

pub use benchmark_runner::{ExecutionMode, execute_benchmark, run_benchmark, run_framework_benchmark};
pub use benchmark_types::{
    BenchmarkDefinition, BenchmarkRecord, BenchmarkRequest, FrameworkMetrics, MetricsSink,
    RecordMetrics,
};
pub use isolation::{WORKER_FLAG, WorkerCommand, WorkerResponse, run_isolated, serve_worker};
pub use performance_metrics::{SummaryStatistics, summarize, timed_call};
pub use result_writer::{dump_result, environment_info};
