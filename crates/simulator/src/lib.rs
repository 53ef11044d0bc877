//! Experiment orchestration for the gossip simulator.
//!
//! Wraps the deterministic core with sweep execution across seeds and
//! parameter variations, per-experiment reporting, and CSV result
//! serialization. The core engine is single-threaded; independent
//! experiments of a sweep run in parallel via rayon.

mod config;
mod metrics;
mod report;
mod sweep;

pub use config::{seed_variations, SweepConfig};
pub use metrics::ExperimentReport;
pub use report::{write_rows, ExperimentRow, ReportError, CSV_HEADER};
pub use sweep::{run_sweep, SweepError};
