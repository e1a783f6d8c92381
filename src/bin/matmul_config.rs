//! Prints a templated matmul problem and its compiler flags.

use clap::Parser;
use framework_bench::matmul_config::{
    StrategyConfig, append_td_graph_script, make_fill_matmul_f32_problem,
    make_iree_baseline_options, make_iree_td_options,
};

#[derive(Parser, Debug)]
#[command(name = "matmul_config", about = "Matmul transform-dialect strategy templating")]
struct Args {
    #[arg(short = 'm', long)]
    m: usize,

    #[arg(short = 'n', long)]
    n: usize,

    #[arg(short = 'k', long)]
    k: usize,

    /// Block tile sizes, e.g. 128,128,32. Enables the strategy flags.
    #[arg(long, requires_all = ["tds", "wps"])]
    blk: Option<String>,

    /// Threads per block, e.g. 64,2,1.
    #[arg(long, requires = "blk")]
    tds: Option<String>,

    /// Warps per block, e.g. 2,2,1.
    #[arg(long, requires = "blk")]
    wps: Option<String>,

    /// Pipeline depth.
    #[arg(long, default_value_t = 3)]
    p: u32,

    /// Reduction tile size.
    #[arg(long, default_value_t = 16)]
    r: u32,

    /// Use async copies.
    #[arg(long)]
    acp: bool,

    /// Use mma.sync.
    #[arg(long)]
    mma: bool,

    /// Add transform-dialect repro flags.
    #[arg(long)]
    td_repro: bool,

    /// Transform-dialect script applied at dispatch formation.
    #[arg(long)]
    graph_script: Option<String>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match (&args.blk, &args.tds, &args.wps) {
        (Some(blk), Some(tds), Some(wps)) => Some(StrategyConfig {
            blk: blk.clone(),
            tds: tds.clone(),
            wps: wps.clone(),
            p: args.p,
            r: args.r,
            acp: args.acp,
            mma: args.mma,
        }),
        _ => None,
    };

    let problem = make_fill_matmul_f32_problem(args.m, args.n, args.k, config.as_ref());
    let options = match &config {
        Some(config) => make_iree_td_options(config, args.td_repro),
        None => make_iree_baseline_options(args.td_repro),
    };
    let options = append_td_graph_script(options, args.graph_script.as_deref());

    println!("// {}", problem.fn_name);
    println!("{}", problem.mlir);
    for option in options {
        println!("{}", option);
    }
}
