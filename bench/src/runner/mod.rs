use std::time::Instant;

use anyhow::{Context, Result};
use lookbound_engine::{Dataset, PiecewiseIndex, PositionOracle, RegressionOracle};
use tracing::{debug, info};

pub mod executor;
pub mod verify;

pub use executor::timed_pass;
pub use verify::{ContractViolation, Verifier};

use crate::config::{BenchConfig, DatasetSpec};
use crate::metrics::{DatasetReport, OracleReport, PassTiming, PiecewiseShape};
use crate::workload::{Payload, QueryWorkload, ResultMode};

/// Benchmarks every configured dataset in turn.
///
/// Each dataset is loaded, indexed, measured and released before the next
/// one starts, so at most one dataset and its two oracles are resident.
pub struct BenchmarkRunner {
    config: BenchConfig,
    results: Vec<DatasetReport>,
}

impl BenchmarkRunner {
    pub fn new(config: BenchConfig) -> Self {
        Self {
            config,
            results: Vec::new(),
        }
    }

    /// Check every dataset header and model blob before any measurement.
    ///
    /// Catches missing files, truncated or malformed blobs, empty datasets
    /// and models trained on a different key count, without reading keys
    /// or leaves.
    pub fn preflight(&self) -> Result<()> {
        for spec in &self.config.datasets {
            let keys = Dataset::read_len(&spec.keys)
                .with_context(|| format!("dataset '{}' failed", spec.name))?;
            if keys == 0 {
                anyhow::bail!(
                    "dataset '{}' failed: {} contains no keys",
                    spec.name,
                    spec.keys.display()
                );
            }
            let header = RegressionOracle::check(&spec.model, keys)
                .with_context(|| format!("dataset '{}' failed", spec.name))?;
            debug!(dataset = %spec.name, keys, leaves = header.leaf_count, "model blob checked");
        }
        Ok(())
    }

    /// Run all datasets, handing each report to `on_report` as it completes.
    ///
    /// Stops at the first failure; reports already handed out stay valid.
    pub fn run_all(&mut self, mut on_report: impl FnMut(&DatasetReport) -> Result<()>) -> Result<()> {
        info!(
            datasets = self.config.datasets.len(),
            lookups = self.config.num_lookups,
            sampling = self.config.sampling.as_str(),
            mode = self.config.mode.as_str(),
            search = self.config.search.as_str(),
            "starting benchmark"
        );
        for spec in self.config.datasets.clone() {
            let report = self
                .run_dataset(&spec)
                .with_context(|| format!("dataset '{}' failed", spec.name))?;
            on_report(&report)?;
            self.results.push(report);
        }
        Ok(())
    }

    /// Load, index and measure one dataset.
    pub fn run_dataset(&self, spec: &DatasetSpec) -> Result<DatasetReport> {
        info!(dataset = %spec.name, path = %spec.keys.display(), "loading dataset");
        let dataset = Dataset::load(&spec.keys)?;
        if dataset.is_empty() {
            anyhow::bail!("{} contains no keys", spec.keys.display());
        }
        info!(dataset = %spec.name, keys = dataset.len(), "dataset loaded");

        let rmi = RegressionOracle::load(&spec.model, dataset.len())?;
        info!(
            dataset = %spec.name,
            leaves = rmi.model().leaves().len(),
            build_ns = rmi.model().build_time_ns(),
            index_bytes = rmi.size_in_bytes(),
            "regression model ready"
        );

        let start = Instant::now();
        let pgm = PiecewiseIndex::build_with(
            dataset.keys(),
            self.config.pgm_epsilon,
            self.config.pgm_epsilon_recursive,
        );
        let pgm_build_ns = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        info!(
            dataset = %spec.name,
            segments = pgm.segment_count(),
            levels = pgm.height(),
            build_ns = pgm_build_ns,
            index_bytes = pgm.size_in_bytes(),
            "piecewise index built"
        );

        let [rmi_timing, pgm_timing] = match self.config.mode {
            ResultMode::Aggregate => {
                let rows = dataset.rows();
                self.measure(&rows, &rmi, &pgm)?
            }
            ResultMode::Position => self.measure(dataset.keys(), &rmi, &pgm)?,
        };

        Ok(DatasetReport {
            dataset: spec.name.clone(),
            keys: dataset.len(),
            lookups: rmi_timing.queries,
            sampling: self.config.sampling.as_str().to_string(),
            mode: self.config.mode.as_str().to_string(),
            search: self.config.search.as_str().to_string(),
            rmi: OracleReport::new(&rmi_timing, rmi.model().build_time_ns(), rmi.size_in_bytes()),
            pgm: OracleReport::new(&pgm_timing, pgm_build_ns, pgm.size_in_bytes()),
            rmi_leaves: rmi.model().leaves().len(),
            pgm_shape: PiecewiseShape {
                epsilon: pgm.epsilon(),
                epsilon_recursive: pgm.epsilon_recursive(),
                segments: pgm.segment_count(),
                levels: pgm.height(),
            },
        })
    }

    /// Generate the shared workload, then time both oracles over it.
    fn measure<T: Payload>(
        &self,
        data: &[T],
        rmi: &RegressionOracle,
        pgm: &PiecewiseIndex,
    ) -> Result<[PassTiming; 2]> {
        let workload = QueryWorkload::generate(data, &self.config.workload())?;
        let verifier = Verifier::new(data, self.config.mode, self.config.search);

        let rmi_timing = logged_pass(&verifier, rmi, &workload)?;
        let pgm_timing = logged_pass(&verifier, pgm, &workload)?;
        Ok([rmi_timing, pgm_timing])
    }

    pub fn collect_results(self) -> Vec<DatasetReport> {
        self.results
    }
}

/// One timed pass, logged. Monomorphized per oracle type.
fn logged_pass<T: Payload, O: PositionOracle>(
    verifier: &Verifier<'_, T>,
    oracle: &O,
    workload: &QueryWorkload,
) -> Result<PassTiming> {
    let timing = timed_pass(verifier, oracle, workload)?;
    info!(
        oracle = %timing.oracle,
        mean_ns = timing.mean_ns(),
        checksum = timing.checksum,
        "timed pass complete"
    );
    Ok(timing)
}
