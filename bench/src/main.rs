use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lookbound_bench::metrics::reporter;
use lookbound_bench::{run_suite, BenchConfig, DatasetSpec, ResultMode, SamplingPolicy};
use lookbound_engine::rmi_core::ModelHeader;
use lookbound_engine::{RegressionModel, SearchStrategy};
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SamplingArg {
    Index,
    KeyRange,
    DuplicateBounded,
}

impl From<SamplingArg> for SamplingPolicy {
    fn from(value: SamplingArg) -> Self {
        match value {
            SamplingArg::Index => SamplingPolicy::Index,
            SamplingArg::KeyRange => SamplingPolicy::KeyRange,
            SamplingArg::DuplicateBounded => SamplingPolicy::DuplicateBounded,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Aggregate,
    Position,
}

impl From<ModeArg> for ResultMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Aggregate => ResultMode::Aggregate,
            ModeArg::Position => ResultMode::Position,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SearchArg {
    Branchless,
    Standard,
}

impl From<SearchArg> for SearchStrategy {
    fn from(value: SearchArg) -> Self {
        match value {
            SearchArg::Branchless => SearchStrategy::Branchless,
            SearchArg::Standard => SearchStrategy::Standard,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "lookbound-bench",
    about = "Verified per-query latency of learned position oracles over sorted u64 datasets"
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark both oracles on every dataset and print a CSV report
    Run(RunArgs),

    /// Print the header and error statistics of a regression model blob
    InspectModel {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Dataset as NAME=KEYS:MODEL; repeatable, replaces configured datasets
    #[arg(long = "dataset", value_name = "NAME=KEYS:MODEL")]
    datasets: Vec<String>,

    /// Lookups per dataset
    #[arg(long)]
    lookups: Option<usize>,

    /// Workload seed
    #[arg(long)]
    seed: Option<u64>,

    /// Piecewise index error bound
    #[arg(long)]
    epsilon: Option<usize>,

    #[arg(long, value_enum)]
    sampling: Option<SamplingArg>,

    /// Longest duplicate run eligible under duplicate-bounded sampling
    #[arg(long)]
    duplicate_cap: Option<usize>,

    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    #[arg(long, value_enum)]
    search: Option<SearchArg>,

    /// Also write full per-dataset statistics as JSON
    #[arg(long, value_name = "FILE")]
    json_out: Option<PathBuf>,
}

impl RunArgs {
    /// Overlay command-line values on the loaded configuration.
    ///
    /// Validation happens afterwards, in [`run_suite`].
    fn apply(&self, config: &mut BenchConfig) -> Result<()> {
        if !self.datasets.is_empty() {
            config.datasets = self
                .datasets
                .iter()
                .map(|d| DatasetSpec::parse(d))
                .collect::<Result<_>>()?;
        }
        if let Some(lookups) = self.lookups {
            config.num_lookups = lookups;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(epsilon) = self.epsilon {
            config.pgm_epsilon = epsilon;
        }
        if let Some(sampling) = self.sampling {
            config.sampling = sampling.into();
        }
        if let Some(cap) = self.duplicate_cap {
            config.duplicate_cap = cap;
        }
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(search) = self.search {
            config.search = search.into();
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ModelSummary {
    path: PathBuf,
    #[serde(flatten)]
    header: ModelHeader,
    size_bytes: usize,
    max_error: u64,
    mean_error: f64,
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = BenchConfig::load(args.config.as_deref())?;
    args.apply(&mut config)?;

    let reports = run_suite(config, std::io::stdout())?;
    if let Some(path) = &args.json_out {
        reporter::write_json(path, &reports)?;
        tracing::info!(path = %path.display(), "wrote statistics");
    }
    Ok(())
}

fn inspect_model(path: PathBuf) -> Result<()> {
    let model = RegressionModel::load(&path)?;
    let errors = model.leaves().iter().map(|leaf| leaf.error);
    let summary = ModelSummary {
        header: model.header(),
        size_bytes: model.size_in_bytes(),
        max_error: errors.clone().max().unwrap_or(0),
        mean_error: errors.map(|e| e as f64).sum::<f64>() / model.leaves().len() as f64,
        path,
    };
    let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the report
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::InspectModel { path } => inspect_model(path),
    };
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "aborting");
    }
    result
}
