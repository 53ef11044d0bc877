//! Gossip simulator CLI.
//!
//! Runs one or more propagation/publishing experiments and writes one
//! CSV result row per experiment.
//!
//! # Example
//!
//! ```bash
//! # A single 60-second experiment with the default network
//! gossipsim
//!
//! # Five seeds of a bandwidth-starved sparse network
//! gossipsim -n 5 --bandwidth 0.5 --blocktime-ms 5000 -o starved.csv
//! ```

use clap::Parser;
use gossipsim_simulation::SimConfig;
use gossipsim_simulator::{run_sweep, seed_variations, write_rows, ExperimentReport, SweepConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Gossip propagation and block publishing simulator.
///
/// Every experiment is fully deterministic: the same seed produces
/// identical results every run.
#[derive(Parser, Debug)]
#[command(name = "gossipsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Total number of peers
    #[arg(short = 'p', long, default_value = "30")]
    peers: u32,

    /// Number of validator peers
    #[arg(short = 'v', long, default_value = "7")]
    validators: u32,

    /// Connect every pair of peers instead of sampling a sparse graph
    #[arg(long)]
    full_mesh: bool,

    /// Minimum target degree per peer (sparse mode)
    #[arg(long, default_value = "3")]
    min_conn: u32,

    /// Maximum degree per peer
    #[arg(long, default_value = "12")]
    max_conn: u32,

    /// Run length in simulated milliseconds
    #[arg(short = 'd', long, default_value = "60000")]
    duration_ms: u64,

    /// Transactions injected per tick
    #[arg(long, default_value = "150000")]
    injection_count: u32,

    /// Tick length in milliseconds
    #[arg(long, default_value = "1000")]
    step_ms: u32,

    /// Coverage threshold (%) for a validator's quorum vote
    #[arg(long, default_value = "95.0")]
    threshold: f64,

    /// Forced-publish horizon in milliseconds
    #[arg(long, default_value = "3000")]
    blocktime_ms: u32,

    /// Per-sender bandwidth budget in kB/ms
    #[arg(long, default_value = "1000.0")]
    bandwidth: f64,

    /// Random seed for the first experiment
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of experiments to run, with consecutive seeds
    #[arg(short = 'n', long, default_value = "1")]
    runs: u32,

    /// Result CSV path
    #[arg(short = 'o', long, default_value = "results.csv")]
    output: PathBuf,

    /// Print a detailed report per experiment
    #[arg(long)]
    detailed: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("warn,gossipsim_simulator=info,gossipsim_simulation=info")
        }))
        .init();

    let args = Args::parse();

    let base = SimConfig::new(args.peers, args.validators)
        .with_degree_bounds(args.min_conn, args.max_conn)
        .with_total_simulation_ms(args.duration_ms)
        .with_injection_count(args.injection_count)
        .with_step_ms(args.step_ms)
        .with_publish_threshold(args.threshold)
        .with_blocktime_ms(args.blocktime_ms)
        .with_bandwidth_kb_per_ms(args.bandwidth)
        .with_seed(args.seed);
    let base = if args.full_mesh {
        base.with_full_mesh()
    } else {
        base
    };

    let sweep = SweepConfig::new(seed_variations(base, args.runs.max(1)), args.output);
    info!(
        experiments = sweep.experiments.len(),
        output = %sweep.output_path.display(),
        "starting sweep"
    );

    let outcomes = run_sweep(sweep.experiments).expect("experiment configuration invalid");

    for (row, stats) in &outcomes {
        if args.detailed {
            let report = ExperimentReport::from_run(row.result.clone(), stats);
            report.print_summary();
        } else {
            println!(
                "experiment {}: published {} txs, {:.2} tps, {:.2} MB/s, {} forced, {} pending",
                row.experiment_id,
                row.result.total_published_global,
                row.result.tps,
                row.result.mb_per_sec,
                row.result.forced_publish_count,
                row.result.final_pending_count,
            );
        }
    }

    let rows: Vec<_> = outcomes.into_iter().map(|(row, _)| row).collect();
    if let Err(e) = write_rows(&sweep.output_path, &rows) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    info!(rows = rows.len(), "results written");
}
