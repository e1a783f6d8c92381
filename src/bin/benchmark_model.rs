//! Benchmarks one model and appends the result to a results file.
//!
//! By default the benchmark runs in a child process: this binary re-executes
//! itself with the hidden `--worker` flag and talks to the child over pipes.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use framework_bench::artifacts::retrieve_model_data;
use framework_bench::benchmarks::{
    BenchmarkDefinition, BenchmarkRecord, BenchmarkRequest, ExecutionMode, MetricsSink,
    WorkerCommand, dump_result, run_benchmark, serve_worker,
};
use framework_bench::config::{ConfigLoader, ConfigOverrides};
use framework_bench::errors::{HarnessResult, ResultsFileError};
use framework_bench::registry::{BenchmarkLookup, FamilyTable, ModelDefinitionTable};
use log::{error, info};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "benchmark_model", about = "Framework-level model latency benchmark")]
struct Args {
    /// Results JSON file; must already contain a "benchmarks" list.
    #[arg(short = 'o', long, required_unless_present = "worker")]
    output_path: Option<PathBuf>,

    /// Unique id of the benchmark to run.
    #[arg(long, required_unless_present = "worker")]
    benchmark_id: Option<String>,

    /// Number of warmup iterations [default: 5].
    #[arg(short = 'w', long)]
    warmup_iterations: Option<usize>,

    /// Number of measured iterations [default: 100].
    #[arg(long)]
    iterations: Option<usize>,

    /// Device to run on: `cpu` or `gpu` [default: gpu].
    #[arg(short = 'd', long)]
    device: Option<String>,

    /// Run the benchmark in this process instead of a worker.
    #[arg(long)]
    run_in_process: bool,

    /// Directory holding cached input and expected-output tensors.
    #[arg(long, required_unless_present = "worker")]
    cache_dir: Option<PathBuf>,

    /// Harness configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model definitions JSON; the built-in suite is used when absent.
    #[arg(long)]
    definitions: Option<PathBuf>,

    /// Worker timeout in seconds [default: 3600].
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Serve one benchmark request from stdin and answer on stdout.
    #[arg(long, hide = true)]
    worker: bool,
}

fn required<T>(value: Option<T>, flag: &str) -> T {
    match value {
        Some(value) => value,
        None => Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                format!("{} is required", flag),
            )
            .exit(),
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.worker {
        if let Err(e) = serve_worker(io::stdin().lock(), io::stdout().lock()) {
            error!("Worker failed: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if let Err(e) = run(args) {
        error!("Benchmark execution failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> HarnessResult<()> {
    let output_path = required(args.output_path, "--output-path");
    let benchmark_id = required(args.benchmark_id, "--benchmark-id");
    let cache_dir = required(args.cache_dir, "--cache-dir");

    let config = ConfigLoader::load_harness_config(args.config.as_deref())?.with_overrides(
        ConfigOverrides {
            warmup_iterations: args.warmup_iterations,
            iterations: args.iterations,
            device: args.device,
            worker_timeout_secs: args.timeout_secs,
        },
    )?;
    let timeout = Duration::from_secs(config.worker_timeout_secs);

    let table = match &args.definitions {
        Some(path) => ModelDefinitionTable::from_json_file(path)?,
        None => ModelDefinitionTable::builtin(),
    };
    let lookup = BenchmarkLookup::new(table, FamilyTable::supported());
    let resolved = lookup.lookup(&benchmark_id)?;

    println!(
        "\n\n--- {} {} -------------------------------------",
        resolved.model_name, benchmark_id
    );

    let model_definition = &resolved.definition;
    let definition = BenchmarkDefinition::from_definition(model_definition, &config.device);
    let inputs = retrieve_model_data(&model_definition.inputs, &cache_dir)?;
    let expected_outputs = retrieve_model_data(&model_definition.outputs, &cache_dir)?;

    let data_type = model_definition.meta_model.data_type;
    let request = BenchmarkRequest {
        model_name: resolved.model_name.to_string(),
        family: resolved.family,
        data_type,
        device: config.device.clone(),
        inputs,
        expected_outputs,
        warmup_iterations: config.warmup_iterations,
        benchmark_iterations: config.iterations,
        tolerance: config.tolerance.for_data_type(data_type),
    };

    let mut sink = MetricsSink::new();
    if args.run_in_process {
        run_benchmark(&request, &ExecutionMode::InProcess, &mut sink);
    } else {
        match WorkerCommand::current_exe(timeout) {
            Ok(command) => run_benchmark(&request, &ExecutionMode::Isolated(command), &mut sink),
            Err(e) => error!(
                "Failed to benchmark model {}. Exception: {}",
                request.model_name, e
            ),
        }
    }
    if sink.is_empty() {
        info!("No metrics recorded for {}", benchmark_id);
    }

    let record = BenchmarkRecord::new(definition, sink);
    let pretty = serde_json::to_string_pretty(&record)
        .map_err(|source| ResultsFileError::Serialize { source })?;
    println!("{}", pretty);

    dump_result(&output_path, &record)?;
    Ok(())
}
