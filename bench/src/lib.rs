//! Lookbound benchmark harness
//!
//! Measures mean per-query latency of two position oracles, a pre-trained
//! two-stage regression model and a piecewise linear index built at start-up,
//! over the same seeded workload on each dataset. Every lookup is verified
//! against ground truth inside the timed loop.
//!
//! # Architecture
//!
//! ```text
//! bench
//! ├── config      # layered configuration (defaults, file, LOOKBOUND__ env)
//! ├── workload/   # key sampling policies, precomputed expected results
//! ├── runner/     # per-dataset harness, timed passes, verifier
//! └── metrics/    # pass timings, CSV and JSON reports
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use lookbound_bench::{run_suite, BenchConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = BenchConfig::load(None)?;
//!     let reports = run_suite(config, std::io::stdout())?;
//!     println!("{} datasets measured", reports.len());
//!     Ok(())
//! }
//! ```

use std::io::Write;

use anyhow::Result;

pub mod config;
pub mod metrics;
pub mod runner;
pub mod workload;

pub use config::{BenchConfig, DatasetSpec};
pub use metrics::{DatasetReport, OracleReport, PassTiming, ResultsReporter};
pub use runner::{BenchmarkRunner, ContractViolation, Verifier};
pub use workload::{Query, QueryWorkload, ResultMode, SamplingPolicy, WorkloadConfig};

/// Benchmark every configured dataset, writing the CSV report to `out`.
///
/// Every dataset header and model blob is checked before anything is
/// written, so a bad input leaves `out` empty. After that the header is
/// written and each row is flushed as soon as its dataset completes.
/// Returns the full reports for every dataset.
pub fn run_suite<W: Write>(config: BenchConfig, out: W) -> Result<Vec<DatasetReport>> {
    config.validate()?;
    let mut runner = BenchmarkRunner::new(config);
    runner.preflight()?;
    let mut reporter = ResultsReporter::new(out)?;
    runner.run_all(|report| {
        metrics::reporter::log_summary(report);
        reporter.write_row(report)
    })?;
    reporter.into_inner()?;
    Ok(runner.collect_results())
}
