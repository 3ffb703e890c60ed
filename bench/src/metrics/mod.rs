use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod reporter;
pub use reporter::ResultsReporter;

/// Outcome of one timed pass of a workload through one oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassTiming {
    pub oracle: String,
    pub queries: usize,
    /// Wall-clock time for the whole pass, never below 1ns
    pub elapsed: Duration,
    /// Wrapping sum of every verified result
    pub checksum: u64,
}

impl PassTiming {
    /// Mean wall-clock nanoseconds per query.
    pub fn mean_ns(&self) -> f64 {
        self.elapsed.as_nanos().max(1) as f64 / self.queries.max(1) as f64
    }
}

/// Latency plus construction cost of one oracle on one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleReport {
    pub name: String,
    pub mean_ns: f64,
    pub total_ns: u64,
    /// Build time: recorded in the blob for the regression model, measured
    /// at run time for the piecewise index
    pub build_ns: u64,
    pub size_bytes: usize,
}

impl OracleReport {
    pub fn new(timing: &PassTiming, build_ns: u64, size_bytes: usize) -> Self {
        Self {
            name: timing.oracle.clone(),
            mean_ns: timing.mean_ns(),
            total_ns: u64::try_from(timing.elapsed.as_nanos()).unwrap_or(u64::MAX),
            build_ns,
            size_bytes,
        }
    }
}

/// Shape of the piecewise index built for a dataset
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PiecewiseShape {
    pub epsilon: usize,
    pub epsilon_recursive: usize,
    pub segments: usize,
    pub levels: usize,
}

/// Everything measured for one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub keys: usize,
    pub lookups: usize,
    pub sampling: String,
    pub mode: String,
    pub search: String,
    pub rmi: OracleReport,
    pub pgm: OracleReport,
    pub rmi_leaves: usize,
    pub pgm_shape: PiecewiseShape,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(nanos: u64, queries: usize) -> PassTiming {
        PassTiming {
            oracle: "RMI".to_string(),
            queries,
            elapsed: Duration::from_nanos(nanos),
            checksum: 0,
        }
    }

    #[test]
    fn test_mean_ns() {
        assert_eq!(timing(1_000, 4).mean_ns(), 250.0);
        assert_eq!(timing(5, 2).mean_ns(), 2.5);
    }

    #[test]
    fn test_zero_elapsed_is_floored() {
        assert_eq!(timing(0, 1).mean_ns(), 1.0);
        assert!(timing(0, 10).mean_ns() > 0.0);
    }

    #[test]
    fn test_oracle_report_from_timing() {
        let report = OracleReport::new(&timing(2_000, 1_000), 123, 4_096);
        assert_eq!(report.name, "RMI");
        assert_eq!(report.mean_ns, 2.0);
        assert_eq!(report.total_ns, 2_000);
        assert_eq!(report.build_ns, 123);
        assert_eq!(report.size_bytes, 4_096);
    }
}
