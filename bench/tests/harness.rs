use std::path::Path;

use lookbound_bench::{
    run_suite, BenchConfig, ContractViolation, DatasetSpec, ResultMode, SamplingPolicy,
};
use lookbound_engine::testing::{duplicate_heavy_keys, train_two_stage, uniform_keys};
use lookbound_engine::{write_keys, LeafModel, LoadError, RegressionModel, SearchStrategy};
use tempfile::TempDir;

/// Write `keys` and a model trained on them under `dir`.
fn fixture(dir: &Path, name: &str, keys: &[u64], leaves: usize) -> DatasetSpec {
    let keys_path = dir.join(format!("{name}_uint64"));
    let model_path = dir.join(format!("{name}.rmi"));
    write_keys(&keys_path, keys).unwrap();
    train_two_stage(keys, leaves).write_to(&model_path).unwrap();
    DatasetSpec::new(name, keys_path, model_path)
}

fn config(datasets: Vec<DatasetSpec>) -> BenchConfig {
    BenchConfig {
        num_lookups: 3_000,
        datasets,
        ..Default::default()
    }
}

fn csv_lines(out: &[u8]) -> Vec<String> {
    String::from_utf8(out.to_vec())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_reports_one_row_per_dataset_in_order() {
    let dir = TempDir::new().unwrap();
    let uniform = fixture(dir.path(), "uniform", &uniform_keys(20_000, 1 << 40, 7), 64);
    let dups = fixture(dir.path(), "dups", &duplicate_heavy_keys(5_000, 200, 9), 32);

    let mut out = Vec::new();
    let reports = run_suite(config(vec![uniform, dups]), &mut out).unwrap();

    let lines = csv_lines(&out);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Dataset,RMI,PGM");
    assert!(lines[1].starts_with("uniform,"));
    assert!(lines[2].starts_with("dups,"));
    for line in &lines[1..] {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 3);
        for latency in &fields[1..] {
            let value: f64 = latency.parse().unwrap();
            assert!(value > 0.0);
            assert_eq!(latency.split('.').nth(1).map(str::len), Some(2));
        }
    }

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].keys, 20_000);
    assert_eq!(reports[0].lookups, 3_000);
    assert_eq!(reports[0].rmi.name, "RMI");
    assert_eq!(reports[0].pgm.name, "PGM");
    assert_eq!(reports[0].rmi_leaves, 64);
    assert!(reports[0].pgm_shape.segments >= 1);
}

#[test]
fn test_every_policy_mode_and_strategy_verifies() {
    let dir = TempDir::new().unwrap();
    let keys = duplicate_heavy_keys(3_000, 150, 3);
    let spec = fixture(dir.path(), "mixed", &keys, 16);

    for sampling in [
        SamplingPolicy::Index,
        SamplingPolicy::KeyRange,
        SamplingPolicy::DuplicateBounded,
    ] {
        for mode in [ResultMode::Aggregate, ResultMode::Position] {
            for search in [SearchStrategy::Branchless, SearchStrategy::Standard] {
                let config = BenchConfig {
                    sampling,
                    mode,
                    search,
                    ..config(vec![spec.clone()])
                };
                let reports = run_suite(config, std::io::sink())
                    .unwrap_or_else(|e| panic!("{sampling:?}/{mode:?}/{search:?}: {e:#}"));
                assert_eq!(reports[0].mode, mode.as_str());
                assert_eq!(reports[0].search, search.as_str());
            }
        }
    }
}

#[test]
fn test_missing_dataset_fails_before_any_output() {
    let dir = TempDir::new().unwrap();
    let good = fixture(dir.path(), "good", &uniform_keys(5_000, 1 << 30, 1), 8);
    let missing = DatasetSpec::new(
        "missing",
        dir.path().join("missing_uint64"),
        dir.path().join("missing.rmi"),
    );

    let mut out = Vec::new();
    let err = run_suite(config(vec![good, missing]), &mut out).unwrap_err();
    assert!(out.is_empty());

    let load = err.downcast_ref::<LoadError>().expect("load error in chain");
    assert!(matches!(load, LoadError::Open { .. }));
    assert!(format!("{err:#}").contains("missing_uint64"));
}

#[test]
fn test_missing_model_on_later_dataset_fails_before_any_output() {
    let dir = TempDir::new().unwrap();
    let first = fixture(dir.path(), "first", &uniform_keys(5_000, 1 << 30, 1), 8);
    let second = fixture(dir.path(), "second", &uniform_keys(2_000, 1 << 30, 2), 8);
    std::fs::remove_file(&second.model).unwrap();

    let mut out = Vec::new();
    let err = run_suite(config(vec![first, second]), &mut out).unwrap_err();
    assert!(out.is_empty());

    let load = err.downcast_ref::<LoadError>().expect("load error in chain");
    assert!(matches!(load, LoadError::Open { .. }));
    assert!(load.path().ends_with("second.rmi"));
    assert!(format!("{err:#}").contains("dataset 'second' failed"));
}

#[test]
fn test_mismatched_model_on_later_dataset_fails_before_any_output() {
    let dir = TempDir::new().unwrap();
    let keys = uniform_keys(3_000, 1 << 30, 4);
    let first = fixture(dir.path(), "first", &keys, 8);
    let mut second = fixture(dir.path(), "second", &keys, 8);
    second.model = fixture(dir.path(), "shorter", &keys[..500], 8).model;

    let mut out = Vec::new();
    let err = run_suite(config(vec![first, second]), &mut out).unwrap_err();
    assert!(out.is_empty());
    assert!(matches!(
        err.downcast_ref::<LoadError>(),
        Some(LoadError::Malformed { .. })
    ));
}

#[test]
fn test_violation_on_later_dataset_keeps_completed_rows() {
    let dir = TempDir::new().unwrap();
    let good = fixture(dir.path(), "good", &uniform_keys(5_000, 1 << 30, 1), 8);
    let keys: Vec<u64> = (0..1_000u64).map(|i| i * 10).collect();
    let liar = fixture(dir.path(), "liar", &keys, 4);
    let flat = LeafModel {
        intercept: 0.0,
        slope: 0.0,
        error: 0,
    };
    RegressionModel::from_parts(keys.len(), [0.0; 4], vec![flat], 0)
        .unwrap()
        .write_to(&liar.model)
        .unwrap();

    let mut out = Vec::new();
    let err = run_suite(config(vec![good, liar]), &mut out).unwrap_err();

    let lines = csv_lines(&out);
    assert_eq!(lines.len(), 2, "header and the completed dataset only");
    assert!(lines[1].starts_with("good,"));
    assert!(err.downcast_ref::<ContractViolation>().is_some());
}

#[test]
fn test_model_for_other_dataset_is_rejected() {
    let dir = TempDir::new().unwrap();
    let keys = uniform_keys(4_000, 1 << 32, 5);
    let mut spec = fixture(dir.path(), "data", &keys, 8);
    let other = fixture(dir.path(), "other", &keys[..1_000], 8);
    spec.model = other.model;

    let err = run_suite(config(vec![spec]), std::io::sink()).unwrap_err();
    let load = err.downcast_ref::<LoadError>().expect("load error in chain");
    assert!(matches!(load, LoadError::Malformed { .. }));
    assert!(load.to_string().contains("1000"));
}

#[test]
fn test_truncated_model_is_rejected() {
    let dir = TempDir::new().unwrap();
    let spec = fixture(dir.path(), "cut", &uniform_keys(1_000, 1 << 20, 2), 4);
    let bytes = std::fs::read(&spec.model).unwrap();
    std::fs::write(&spec.model, &bytes[..bytes.len() - 5]).unwrap();

    let err = run_suite(config(vec![spec]), std::io::sink()).unwrap_err();
    assert!(err.downcast_ref::<LoadError>().is_some());
}

#[test]
fn test_understated_error_bound_is_a_contract_violation() {
    let dir = TempDir::new().unwrap();
    let keys: Vec<u64> = (0..1_000u64).map(|i| i * 10).collect();
    let spec = fixture(dir.path(), "liar", &keys, 4);

    // Every key predicted at position 0 with zero error
    let flat = LeafModel {
        intercept: 0.0,
        slope: 0.0,
        error: 0,
    };
    RegressionModel::from_parts(keys.len(), [0.0; 4], vec![flat], 0)
        .unwrap()
        .write_to(&spec.model)
        .unwrap();

    for mode in [ResultMode::Aggregate, ResultMode::Position] {
        let config = BenchConfig {
            mode,
            ..config(vec![spec.clone()])
        };
        let mut out = Vec::new();
        let err = run_suite(config, &mut out).unwrap_err();
        assert_eq!(csv_lines(&out), vec!["Dataset,RMI,PGM".to_string()]);

        let violation = err
            .downcast_ref::<ContractViolation>()
            .expect("contract violation in chain");
        assert_eq!(violation.oracle, "RMI");
        assert_ne!(violation.returned, violation.expected);
        assert_eq!(violation.window.lo, 0);
        assert!(violation.window.hi <= 1);
        assert!(format!("{err:#}").contains(&format!("lookup key {}", violation.key)));
    }
}

#[test]
fn test_single_key_dataset() {
    let dir = TempDir::new().unwrap();
    let spec = fixture(dir.path(), "one", &[42], 1);
    for sampling in [SamplingPolicy::Index, SamplingPolicy::KeyRange] {
        let config = BenchConfig {
            sampling,
            ..config(vec![spec.clone()])
        };
        let reports = run_suite(config, std::io::sink()).unwrap();
        assert_eq!(reports[0].keys, 1);
        assert_eq!(reports[0].pgm_shape.segments, 1);
    }
}

#[test]
fn test_empty_dataset_is_rejected() {
    let dir = TempDir::new().unwrap();
    let keys_path = dir.path().join("empty_uint64");
    write_keys(&keys_path, &[]).unwrap();
    let spec = DatasetSpec::new("empty", keys_path, dir.path().join("empty.rmi"));

    let err = run_suite(config(vec![spec]), std::io::sink()).unwrap_err();
    assert!(format!("{err:#}").contains("no keys"));
}

#[test]
fn test_zero_lookups_rejected_before_any_work() {
    let mut out = Vec::new();
    let config = BenchConfig {
        num_lookups: 0,
        ..Default::default()
    };
    assert!(run_suite(config, &mut out).is_err());
    assert!(out.is_empty());
}
