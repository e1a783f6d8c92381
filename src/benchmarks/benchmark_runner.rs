//! Framework-level benchmark runner.

use super::benchmark_types::{BenchmarkRequest, FrameworkMetrics, MetricsSink};
use super::isolation::{WorkerCommand, WorkerResponse, run_isolated};
use super::performance_metrics::timed_call;
use crate::compare::{Tolerance, compare_results};
use crate::device::Backend;
use crate::errors::{ExecutionError, ExecutionResult};
use crate::jit::JitFunction;
use crate::tensor::Tensor;
use log::{error, info, warn};
use std::time::Instant;

/// Where a benchmark executes relative to the caller.
#[derive(Debug, Clone)]
pub enum ExecutionMode {
    InProcess,
    Isolated(WorkerCommand),
}

/// Runs `request` in the given mode. Never fails: on any error the sink is
/// left empty and the error is logged.
pub fn run_benchmark(request: &BenchmarkRequest, mode: &ExecutionMode, sink: &mut MetricsSink) {
    match mode {
        ExecutionMode::InProcess => run_framework_benchmark(request, sink),
        ExecutionMode::Isolated(command) => match run_isolated(request, command) {
            Ok(WorkerResponse::Completed { metrics }) => commit(request, &metrics, sink),
            Ok(WorkerResponse::Failed { message }) => log_failure(request, &message),
            Err(e) => log_failure(request, &e.to_string()),
        },
    }
}

/// Runs `request` on the calling thread and commits metrics only on success.
pub fn run_framework_benchmark(request: &BenchmarkRequest, sink: &mut MetricsSink) {
    match execute_benchmark(request) {
        Ok(metrics) => commit(request, &metrics, sink),
        Err(e) => log_failure(request, &e.to_string()),
    }
}

fn commit(request: &BenchmarkRequest, metrics: &FrameworkMetrics, sink: &mut MetricsSink) {
    if let Err(e) = sink.commit(metrics) {
        log_failure(request, &e.to_string());
    }
}

fn log_failure(request: &BenchmarkRequest, message: &str) {
    error!(
        "Failed to benchmark model {}. Exception: {}",
        request.model_name, message
    );
}

/// Binds the device, builds and JIT-compiles the model, then measures the
/// warmup and measurement phases.
pub fn execute_benchmark(request: &BenchmarkRequest) -> ExecutionResult<FrameworkMetrics> {
    let backend = Backend::bind(&request.device)?;
    let model = request.family.build(request.data_type);
    let expected = request
        .expected_outputs
        .first()
        .ok_or_else(|| ExecutionError::InvalidInput {
            message: "no expected outputs to compare against".to_string(),
        })?;

    let start = Instant::now();
    let inputs = backend.transfer(&request.inputs, request.data_type);
    let input_data_transfer_ms = start.elapsed().as_secs_f64() * 1000.0;

    let mut jit = JitFunction::new(&model, backend);
    let mut mismatches = 0;

    info!(
        "Benchmarking {} ({} warmup, {} iterations)...",
        request.model_name, request.warmup_iterations, request.benchmark_iterations
    );

    let mut warmup_latencies = Vec::with_capacity(request.warmup_iterations);
    for _ in 0..request.warmup_iterations {
        let (output, latency) = timed_call(|| jit.call(&inputs))?;
        if !output_matches(&request.model_name, &output, expected, request.tolerance) {
            mismatches += 1;
        }
        warmup_latencies.push(latency);
    }

    let mut latencies = Vec::with_capacity(request.benchmark_iterations);
    for i in 0..request.benchmark_iterations {
        let (output, latency) = timed_call(|| jit.call(&inputs))?;
        if !output_matches(&request.model_name, &output, expected, request.tolerance) {
            mismatches += 1;
        }
        latencies.push(latency);

        let step = (request.benchmark_iterations / 10).max(1);
        if (i + 1) % step == 0 {
            info!("  Progress: {}/{}", i + 1, request.benchmark_iterations);
        }
    }

    let metrics = FrameworkMetrics::from_samples(
        &warmup_latencies,
        &latencies,
        input_data_transfer_ms,
        mismatches,
    );
    info!(
        "{}: compiled {} executable(s), mean latency {:?} ms, {} mismatched outputs",
        request.model_name,
        jit.compilations(),
        metrics.mean_latency_ms,
        mismatches
    );
    Ok(metrics)
}

fn output_matches(model_name: &str, output: &Tensor, expected: &Tensor, tolerance: Tolerance) -> bool {
    let report = compare_results(output, expected, tolerance);
    if !report.passed() {
        warn!(
            "Output mismatch for {}: {}/{} elements outside tolerance, max error {}",
            model_name, report.mismatched_elements, report.total_elements, report.max_abs_error
        );
    }
    report.passed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelFamily;
    use crate::registry::DataType;
    use crate::tensor::ElementType;

    fn request(device: &str, warmup: usize, iterations: usize) -> BenchmarkRequest {
        let family = ModelFamily::Resnet50;
        let data_type = DataType::Fp32;
        let input = Tensor::filled(vec![1, 4, 4, 3], ElementType::F32, 0.25);
        let expected = family.build(data_type).forward(std::slice::from_ref(&input)).unwrap();

        BenchmarkRequest {
            model_name: family.name().to_string(),
            family,
            data_type,
            device: device.to_string(),
            inputs: vec![input],
            expected_outputs: expected,
            warmup_iterations: warmup,
            benchmark_iterations: iterations,
            tolerance: Tolerance::new(0.0, 0.0),
        }
    }

    #[test]
    fn test_in_process_run_commits_metrics() {
        let mut sink = MetricsSink::new();
        run_framework_benchmark(&request("cpu", 2, 3), &mut sink);

        let metrics = sink.metrics().expect("metrics committed");
        assert_eq!(metrics.warmup_iterations, 2);
        assert_eq!(metrics.benchmark_iterations, 3);
        assert_eq!(metrics.output_mismatches, 0);
    }

    #[test]
    fn test_unsupported_device_leaves_sink_empty() {
        let mut sink = MetricsSink::new();
        run_framework_benchmark(&request("tpu", 1, 1), &mut sink);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_wrong_expected_output_is_counted_not_fatal() {
        let mut req = request("cpu", 1, 2);
        for value in req.expected_outputs[0].data.iter_mut() {
            *value += 1.0;
        }
        let mut sink = MetricsSink::new();
        run_framework_benchmark(&req, &mut sink);

        let metrics = sink.metrics().expect("metrics committed");
        assert_eq!(metrics.output_mismatches, 3);
    }

    #[test]
    fn test_missing_expected_outputs_is_an_error() {
        let mut req = request("cpu", 1, 1);
        req.expected_outputs.clear();
        assert!(matches!(
            execute_benchmark(&req),
            Err(ExecutionError::InvalidInput { .. })
        ));
    }
}
