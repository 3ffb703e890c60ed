use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::DatasetReport;

pub const CSV_HEADER: [&str; 3] = ["Dataset", "RMI", "PGM"];

/// Writes one CSV row per dataset as soon as it is measured.
pub struct ResultsReporter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResultsReporter<W> {
    /// Wrap `out` and write the header row.
    pub fn new(out: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn write_row(&mut self, report: &DatasetReport) -> Result<()> {
        self.writer.write_record([
            report.dataset.clone(),
            format!("{:.2}", report.rmi.mean_ns),
            format!("{:.2}", report.pgm.mean_ns),
        ])?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush CSV report: {}", e.error()))
    }
}

/// Log construction and latency statistics for a measured dataset.
pub fn log_summary(report: &DatasetReport) {
    info!(
        dataset = %report.dataset,
        keys = report.keys,
        rmi_ns = report.rmi.mean_ns,
        pgm_ns = report.pgm.mean_ns,
        rmi_build_ns = report.rmi.build_ns,
        rmi_bytes = report.rmi.size_bytes,
        rmi_leaves = report.rmi_leaves,
        pgm_build_ns = report.pgm.build_ns,
        pgm_bytes = report.pgm.size_bytes,
        pgm_segments = report.pgm_shape.segments,
        pgm_levels = report.pgm_shape.levels,
        "dataset complete"
    );
}

/// Write every report as pretty-printed JSON.
pub fn write_json(path: impl AsRef<Path>, reports: &[DatasetReport]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, reports)
        .with_context(|| format!("failed to write {}", path.display()))?;
    out.flush()?;
    Ok(())
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - RMI {:.2} ns, PGM {:.2} ns over {} lookups",
            self.dataset, self.rmi.mean_ns, self.pgm.mean_ns, self.lookups
        )
    }
}
