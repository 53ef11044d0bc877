//! CSV result serialization.
//!
//! One row per experiment: the experiment id, the full configuration,
//! and the result record. The result file is the only piece of I/O whose
//! failure is surfaced to the caller; everything else in the simulator is
//! in-memory.

use gossipsim_simulation::{ExperimentResult, SimConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Header row of the result file.
pub const CSV_HEADER: &str = "experiment_id,num_peers,full_mesh,min_conn,max_conn,\
delay_min,delay_max,delay_multiplier,num_validators,tx_size_min,tx_size_max,\
total_simulation_ms,injection_count,simulation_step_ms,publish_threshold,\
blocktime_ms,bandwidth_kb_per_ms,max_transactions,max_block_size_kb,\
known_rows,known_cols,total_published_global,tps,published_mb,mb_per_sec,\
forced_publish_count,final_pending_count";

/// One result row: an experiment's configuration and outcome.
#[derive(Debug, Clone)]
pub struct ExperimentRow {
    /// Position of the experiment within the sweep.
    pub experiment_id: usize,
    /// Configuration the experiment ran with.
    pub config: SimConfig,
    /// Result record.
    pub result: ExperimentResult,
}

impl ExperimentRow {
    /// Format the row as a CSV line (no trailing newline).
    pub fn to_csv(&self) -> String {
        let c = &self.config;
        let r = &self.result;
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{:.6},{:.6},{:.6},{},{}",
            self.experiment_id,
            c.num_peers,
            c.full_mesh,
            c.min_conn,
            c.max_conn,
            c.delay_min_ms,
            c.delay_max_ms,
            c.delay_multiplier,
            c.num_validators,
            c.tx_size_min_kb,
            c.tx_size_max_kb,
            c.total_simulation_ms,
            c.injection_count,
            c.simulation_step_ms,
            c.publish_threshold_pct,
            c.blocktime_ms,
            c.bandwidth_kb_per_ms,
            c.max_transactions,
            c.max_block_size_kb,
            c.known_rows,
            c.known_cols,
            r.total_published_global,
            r.tps,
            r.published_mb,
            r.mb_per_sec,
            r.forced_publish_count,
            r.final_pending_count,
        )
    }
}

/// Errors writing the result file.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The result file could not be created.
    #[error("failed to open result file {path}: {source}")]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A row or the header could not be written.
    #[error("failed to write result file: {0}")]
    Write(#[from] io::Error),
}

/// Write the header and one line per row to `path`, replacing any
/// existing file.
pub fn write_rows(path: &Path, rows: &[ExperimentRow]) -> Result<(), ReportError> {
    let file = File::create(path).map_err(|source| ReportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", CSV_HEADER)?;
    for row in rows {
        writeln!(writer, "{}", row.to_csv())?;
    }
    writer.flush()?;
    Ok(())
}
