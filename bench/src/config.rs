// bench/src/config.rs
//
// Benchmark configuration.
// Priority order (highest to lowest):
// 1. Command-line arguments (applied by the binary after load())
// 2. Environment variables (LOOKBOUND__* prefix)
// 3. Config file (TOML/YAML/JSON, by extension)
// 4. Built-in defaults

use std::path::PathBuf;

use anyhow::{Context, Result};
use lookbound_engine::pgm::{DEFAULT_EPSILON, DEFAULT_EPSILON_RECURSIVE};
use lookbound_engine::SearchStrategy;
use serde::{Deserialize, Serialize};

use crate::workload::{ResultMode, SamplingPolicy, WorkloadConfig};

pub const DEFAULT_NUM_LOOKUPS: usize = 10_000_000;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_DUPLICATE_CAP: usize = 100;

/// Complete benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Queries per dataset, shared by both timed passes
    pub num_lookups: usize,

    /// Seed for query generation
    pub seed: u64,

    /// Maximum error of the piecewise index's data level
    pub pgm_epsilon: usize,

    /// Maximum error of the piecewise index's upper levels
    pub pgm_epsilon_recursive: usize,

    pub sampling: SamplingPolicy,

    /// Longest duplicate run eligible under duplicate-bounded sampling
    pub duplicate_cap: usize,

    pub mode: ResultMode,

    pub search: SearchStrategy,

    /// Datasets benchmarked in order
    pub datasets: Vec<DatasetSpec>,
}

/// One dataset and the regression model trained on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSpec {
    pub name: String,
    pub keys: PathBuf,
    pub model: PathBuf,
}

impl DatasetSpec {
    pub fn new(name: impl Into<String>, keys: impl Into<PathBuf>, model: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            keys: keys.into(),
            model: model.into(),
        }
    }

    /// Parse `NAME=KEYS:MODEL`.
    pub fn parse(s: &str) -> Result<Self> {
        let (name, paths) = s
            .split_once('=')
            .with_context(|| format!("dataset '{s}' is not of the form NAME=KEYS:MODEL"))?;
        let (keys, model) = paths
            .rsplit_once(':')
            .with_context(|| format!("dataset '{s}' is missing ':MODEL'"))?;
        if name.is_empty() || keys.is_empty() || model.is_empty() {
            anyhow::bail!("dataset '{}' has an empty NAME, KEYS or MODEL", s);
        }
        Ok(Self::new(name, keys, model))
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        let datasets = [
            ("books_200M_uint64", "books"),
            ("osm_cellids_200M_uint64", "osm"),
            ("wiki_ts_200M_uint64", "wiki"),
            ("fb_200M_uint64", "fb"),
        ]
        .into_iter()
        .map(|(file, model)| {
            DatasetSpec::new(
                file,
                PathBuf::from("data").join(file),
                PathBuf::from("rmi_data").join(format!("{model}.rmi")),
            )
        })
        .collect();

        Self {
            num_lookups: DEFAULT_NUM_LOOKUPS,
            seed: DEFAULT_SEED,
            pgm_epsilon: DEFAULT_EPSILON,
            pgm_epsilon_recursive: DEFAULT_EPSILON_RECURSIVE,
            sampling: SamplingPolicy::Index,
            duplicate_cap: DEFAULT_DUPLICATE_CAP,
            mode: ResultMode::Aggregate,
            search: SearchStrategy::Branchless,
            datasets,
        }
    }
}

impl BenchConfig {
    /// Load configuration: defaults, then optional file, then environment.
    ///
    /// Not validated here; callers apply their own overrides first and then
    /// call [`BenchConfig::validate`].
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let defaults = Self::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize defaults")?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LOOKBOUND")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().context("Failed to build config")?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize config")?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a meaningful measurement.
    pub fn validate(&self) -> Result<()> {
        if self.num_lookups == 0 {
            anyhow::bail!("num_lookups must be > 0: an empty workload has no mean latency");
        }
        if self.pgm_epsilon == 0 {
            anyhow::bail!("pgm_epsilon must be > 0");
        }
        if self.pgm_epsilon_recursive == 0 {
            anyhow::bail!("pgm_epsilon_recursive must be > 0");
        }
        if self.duplicate_cap == 0 {
            anyhow::bail!("duplicate_cap must be > 0");
        }
        if self.datasets.is_empty() {
            anyhow::bail!("no datasets configured");
        }
        let mut names: Vec<&str> = self.datasets.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            anyhow::bail!("dataset '{}' configured more than once", dup[0]);
        }
        Ok(())
    }

    pub fn workload(&self) -> WorkloadConfig {
        WorkloadConfig {
            num_lookups: self.num_lookups,
            seed: self.seed,
            sampling: self.sampling,
            duplicate_cap: self.duplicate_cap,
            mode: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Loads read the process environment; serialize them with env mutation.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_are_valid() {
        let config = BenchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.num_lookups, 10_000_000);
        assert_eq!(config.seed, 42);
        assert_eq!(config.pgm_epsilon, 64);
        assert_eq!(config.datasets.len(), 4);
        assert_eq!(config.datasets[2].keys, PathBuf::from("data/wiki_ts_200M_uint64"));
        assert_eq!(config.datasets[2].model, PathBuf::from("rmi_data/wiki.rmi"));
    }

    #[test]
    fn test_validate_rejects_empty_workload() {
        let config = BenchConfig {
            num_lookups: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("num_lookups"));
    }

    #[test]
    fn test_validate_rejects_duplicate_dataset_names() {
        let spec = DatasetSpec::new("a", "a.keys", "a.rmi");
        let config = BenchConfig {
            datasets: vec![spec.clone(), spec],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
num_lookups = 1000
sampling = "duplicate_bounded"
mode = "position"
search = "standard"

[[datasets]]
name = "tiny"
keys = "/tmp/tiny_uint64"
model = "/tmp/tiny.rmi"
"#
        )
        .unwrap();

        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let config = BenchConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.num_lookups, 1000);
        assert_eq!(config.sampling, SamplingPolicy::DuplicateBounded);
        assert_eq!(config.mode, ResultMode::Position);
        assert_eq!(config.search, SearchStrategy::Standard);
        assert_eq!(config.datasets, vec![DatasetSpec::new("tiny", "/tmp/tiny_uint64", "/tmp/tiny.rmi")]);
        assert_eq!(config.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "num_lookupz = 5").unwrap();
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        assert!(BenchConfig::load(file.path().to_str()).is_err());
    }

    #[test]
    fn test_load_defers_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "num_lookups = 0").unwrap();
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut config = BenchConfig::load(file.path().to_str()).unwrap();
        assert!(config.validate().is_err());

        config.num_lookups = 10;
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "seed = 7\nnum_lookups = 500").unwrap();

        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("LOOKBOUND__SEED", "1234");
        let loaded = BenchConfig::load(file.path().to_str());
        std::env::remove_var("LOOKBOUND__SEED");

        let config = loaded.unwrap();
        assert_eq!(config.seed, 1234);
        assert_eq!(config.num_lookups, 500);
    }

    #[test]
    fn test_dataset_spec_parse() {
        let spec = DatasetSpec::parse("wiki=data/wiki_ts_200M_uint64:rmi_data/wiki.rmi").unwrap();
        assert_eq!(spec, DatasetSpec::new("wiki", "data/wiki_ts_200M_uint64", "rmi_data/wiki.rmi"));
        assert!(DatasetSpec::parse("wiki").is_err());
        assert!(DatasetSpec::parse("wiki=data").is_err());
        assert!(DatasetSpec::parse("=a:b").is_err());
    }
}
