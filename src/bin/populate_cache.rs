//! Fills the artifact cache with inputs and reference outputs.
//!
//! Reference outputs come from host execution at the model's precision.

use clap::Parser;
use framework_bench::artifacts::{generate_inputs, store_model_data};
use framework_bench::errors::HarnessResult;
use framework_bench::registry::{BenchmarkLookup, FamilyTable, ModelDefinitionTable};
use log::{error, info};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "populate_cache", about = "Generate cached tensors for benchmarks")]
struct Args {
    /// Artifact cache directory.
    #[arg(long)]
    cache_dir: PathBuf,

    /// Model definitions JSON; the built-in suite is used when absent.
    #[arg(long)]
    definitions: Option<PathBuf>,

    /// Benchmark ids to populate; repeatable. Defaults to every known id.
    #[arg(long = "benchmark-id")]
    benchmark_ids: Vec<String>,

    /// Seed for generated inputs.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Args::parse()) {
        error!("Cache population failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> HarnessResult<()> {
    let table = match &args.definitions {
        Some(path) => ModelDefinitionTable::from_json_file(path)?,
        None => ModelDefinitionTable::builtin(),
    };
    let ids = if args.benchmark_ids.is_empty() {
        table.ids()
    } else {
        args.benchmark_ids.clone()
    };
    let lookup = BenchmarkLookup::new(table, FamilyTable::supported());

    for id in &ids {
        let resolved = lookup.lookup(id)?;
        let definition = &resolved.definition;
        let start = Instant::now();

        let inputs = generate_inputs(&definition.inputs, args.seed)?;
        let model = resolved.family.build(definition.meta_model.data_type);
        let outputs = model.forward(&inputs)?;

        store_model_data(&definition.inputs, &args.cache_dir, &inputs)?;
        store_model_data(&definition.outputs, &args.cache_dir, &outputs)?;
        info!(
            "Populated {} in {:.1} ms",
            id,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    println!("Populated {} benchmark(s) in {}", ids.len(), args.cache_dir.display());
    Ok(())
}
