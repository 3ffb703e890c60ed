use std::str::FromStr;

use lookbound_engine::{Row, SortKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod generator;

pub use generator::{KeySampler, QueryWorkload};

/// Workload configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub num_lookups: usize,
    pub seed: u64,
    pub sampling: SamplingPolicy,
    pub duplicate_cap: usize,
    pub mode: ResultMode,
}

/// How lookup keys are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Key at a uniformly chosen index: present keys, weighted by run length
    #[default]
    Index,
    /// Uniform over `[min_key, max_key)`: mostly absent keys on sparse data
    KeyRange,
    /// Present keys whose duplicate run is no longer than the cap
    DuplicateBounded,
}

impl SamplingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SamplingPolicy::Index => "index",
            SamplingPolicy::KeyRange => "key_range",
            SamplingPolicy::DuplicateBounded => "duplicate_bounded",
        }
    }
}

impl FromStr for SamplingPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "index" => Ok(SamplingPolicy::Index),
            "key_range" | "range" => Ok(SamplingPolicy::KeyRange),
            "duplicate_bounded" | "bounded" => Ok(SamplingPolicy::DuplicateBounded),
            _ => anyhow::bail!(
                "Unknown sampling policy: {}. Use 'index', 'key_range', or 'duplicate_bounded'",
                s
            ),
        }
    }
}

/// What a lookup returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultMode {
    /// Sum of payloads over the run of entries equal to the key
    #[default]
    Aggregate,
    /// The lower-bound position itself
    Position,
}

impl ResultMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultMode::Aggregate => "aggregate",
            ResultMode::Position => "position",
        }
    }

    /// Turn a lower-bound position into the lookup result.
    #[inline(always)]
    pub fn evaluate<T: Payload>(self, data: &[T], position: usize, key: u64) -> u64 {
        match self {
            ResultMode::Position => position as u64,
            ResultMode::Aggregate => sum_run(data, position, key),
        }
    }
}

impl FromStr for ResultMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "aggregate" | "sum" => Ok(ResultMode::Aggregate),
            "position" | "pos" => Ok(ResultMode::Position),
            _ => anyhow::bail!("Unknown result mode: {}. Use 'aggregate' or 'position'", s),
        }
    }
}

/// Sorted element that carries a payload.
///
/// Bare keys carry their own position: the synthetic payload of a row is its
/// ordinal, so both representations aggregate to the same value.
pub trait Payload: SortKey {
    fn payload(&self, position: usize) -> u64;
}

impl Payload for Row {
    #[inline(always)]
    fn payload(&self, _position: usize) -> u64 {
        self.value
    }
}

impl Payload for u64 {
    #[inline(always)]
    fn payload(&self, position: usize) -> u64 {
        position as u64
    }
}

/// Sum payloads from `start` while the entry's key equals `key`.
#[inline]
pub fn sum_run<T: Payload>(data: &[T], start: usize, key: u64) -> u64 {
    let mut sum = 0u64;
    let mut pos = start;
    while pos < data.len() && data[pos].sort_key() == key {
        sum = sum.wrapping_add(data[pos].payload(pos));
        pos += 1;
    }
    sum
}

/// A lookup key and its precomputed ground truth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub key: u64,
    pub expected: u64,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkloadError {
    #[error("workload must contain at least one lookup")]
    Empty,

    #[error("cannot sample lookups from an empty dataset")]
    EmptyDataset,

    #[error("no key has a duplicate run of at most {cap} entries")]
    NoEligibleKeys { cap: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_run_starts_at_position() {
        let rows: Vec<Row> = [1u64, 3, 3, 3, 7]
            .iter()
            .enumerate()
            .map(|(i, &key)| Row {
                key,
                value: i as u64,
            })
            .collect();
        assert_eq!(sum_run(&rows, 1, 3), 1 + 2 + 3);
        assert_eq!(sum_run(&rows, 4, 7), 4);
        // Absent key: the entry at the lower bound is larger
        assert_eq!(sum_run(&rows, 4, 5), 0);
        // Past the end
        assert_eq!(sum_run(&rows, 5, 9), 0);
    }

    #[test]
    fn test_keys_and_rows_aggregate_identically() {
        let keys = [2u64, 2, 5, 5, 5, 8];
        let rows: Vec<Row> = keys
            .iter()
            .enumerate()
            .map(|(i, &key)| Row {
                key,
                value: i as u64,
            })
            .collect();
        for (start, &key) in keys.iter().enumerate() {
            assert_eq!(sum_run(&keys[..], start, key), sum_run(&rows, start, key));
        }
    }

    #[test]
    fn test_mode_evaluate() {
        let keys = [1u64, 4, 4, 9];
        assert_eq!(ResultMode::Position.evaluate(&keys[..], 1, 4), 1);
        assert_eq!(ResultMode::Aggregate.evaluate(&keys[..], 1, 4), 3);
        assert_eq!(ResultMode::Aggregate.evaluate(&keys[..], 3, 5), 0);
    }

    #[test]
    fn test_parse_policies() {
        assert_eq!("index".parse::<SamplingPolicy>().unwrap(), SamplingPolicy::Index);
        assert_eq!("KEY_RANGE".parse::<SamplingPolicy>().unwrap(), SamplingPolicy::KeyRange);
        assert_eq!(
            "duplicate_bounded".parse::<SamplingPolicy>().unwrap(),
            SamplingPolicy::DuplicateBounded
        );
        assert!("zipf".parse::<SamplingPolicy>().is_err());
        assert_eq!("position".parse::<ResultMode>().unwrap(), ResultMode::Position);
        assert!("count".parse::<ResultMode>().is_err());
    }
}
