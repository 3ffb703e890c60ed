use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use lookbound_engine::exact_lower_bound;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::{Payload, Query, SamplingPolicy, WorkloadConfig, WorkloadError};

/// Queries generated between progress bar updates.
const PROGRESS_STRIDE: usize = 1 << 16;

/// Draws lookup keys from a sorted dataset under one sampling policy.
pub struct KeySampler<'a, T> {
    rng: ChaCha8Rng,
    data: &'a [T],
    policy: SamplingPolicy,
    min_key: u64,
    max_key: u64,
    /// Start index of every distinct key whose run fits the duplicate cap.
    eligible_runs: Vec<usize>,
}

impl<'a, T: Payload> KeySampler<'a, T> {
    pub fn new(data: &'a [T], config: &WorkloadConfig) -> Result<Self, WorkloadError> {
        let (first, last) = match (data.first(), data.last()) {
            (Some(first), Some(last)) => (first.sort_key(), last.sort_key()),
            _ => return Err(WorkloadError::EmptyDataset),
        };

        let eligible_runs = match config.sampling {
            SamplingPolicy::DuplicateBounded => {
                let runs = eligible_runs(data, config.duplicate_cap);
                if runs.is_empty() {
                    return Err(WorkloadError::NoEligibleKeys {
                        cap: config.duplicate_cap,
                    });
                }
                debug!(
                    eligible = runs.len(),
                    cap = config.duplicate_cap,
                    "duplicate-bounded key pool"
                );
                runs
            }
            _ => Vec::new(),
        };

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            data,
            policy: config.sampling,
            min_key: first,
            max_key: last,
            eligible_runs,
        })
    }

    pub fn next_key(&mut self) -> u64 {
        match self.policy {
            SamplingPolicy::Index => {
                let idx = self.rng.gen_range(0..self.data.len());
                self.data[idx].sort_key()
            }
            SamplingPolicy::KeyRange => {
                if self.min_key == self.max_key {
                    self.min_key
                } else {
                    self.rng.gen_range(self.min_key..self.max_key)
                }
            }
            SamplingPolicy::DuplicateBounded => {
                // Uniform over the eligible distinct keys, which is what
                // rejection-resampling over all distinct keys converges to.
                let run = self.rng.gen_range(0..self.eligible_runs.len());
                self.data[self.eligible_runs[run]].sort_key()
            }
        }
    }
}

/// Start indices of runs no longer than `cap`.
fn eligible_runs<T: Payload>(data: &[T], cap: usize) -> Vec<usize> {
    let mut runs = Vec::new();
    let mut start = 0;
    while start < data.len() {
        let key = data[start].sort_key();
        let end = start + data[start..].partition_point(|e| e.sort_key() <= key);
        if end - start <= cap {
            runs.push(start);
        }
        start = end;
    }
    runs
}

/// A fixed, reproducible sequence of lookups with precomputed results.
///
/// Never empty: construction rejects a zero-length workload so that mean
/// latency is always defined.
#[derive(Debug, Clone)]
pub struct QueryWorkload {
    config: WorkloadConfig,
    queries: Vec<Query>,
}

impl QueryWorkload {
    /// Sample `config.num_lookups` keys from `data` and compute each expected
    /// result with a full-array exact search.
    pub fn generate<T: Payload>(data: &[T], config: &WorkloadConfig) -> Result<Self, WorkloadError> {
        if config.num_lookups == 0 {
            return Err(WorkloadError::Empty);
        }
        let mut sampler = KeySampler::new(data, config)?;

        let progress = ProgressBar::with_draw_target(
            Some(config.num_lookups as u64),
            ProgressDrawTarget::stderr(),
        );
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner} generating lookups {bar:40.cyan/blue} {pos}/{len} ({eta})",
        ) {
            progress.set_style(style.progress_chars("##-"));
        }

        let mut queries = Vec::with_capacity(config.num_lookups);
        for i in 0..config.num_lookups {
            let key = sampler.next_key();
            let lb = exact_lower_bound(data, key);
            queries.push(Query {
                key,
                expected: config.mode.evaluate(data, lb, key),
            });
            if (i + 1) % PROGRESS_STRIDE == 0 {
                progress.inc(PROGRESS_STRIDE as u64);
            }
        }
        progress.finish_and_clear();

        info!(
            lookups = queries.len(),
            sampling = config.sampling.as_str(),
            mode = config.mode.as_str(),
            seed = config.seed,
            "generated workload"
        );
        Ok(Self {
            config: *config,
            queries,
        })
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Never true for a generated workload.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }
}
