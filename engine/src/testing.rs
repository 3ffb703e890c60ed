//! Fixture builders for tests: synthetic datasets and a minimal RMI trainer.
//!
//! The trainer fits one line per leaf through the lower bounds at the ends of
//! the leaf's key range, then measures the leaf's error at every point where
//! the lower bound can change. Good enough to produce blobs that honour the
//! bounding contract for any key; not a substitute for a real RMI optimiser.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::resolver::exact_lower_bound;
use crate::rmi_core::{LeafModel, RegressionModel};

/// Train a two-stage model over sorted `keys`.
pub fn train_two_stage(keys: &[u64], leaf_count: usize) -> RegressionModel {
    assert!(!keys.is_empty(), "cannot train on an empty dataset");
    assert!(leaf_count > 0, "need at least one leaf");

    let n = keys.len();
    let min = keys[0] as f64;
    let max = keys[n - 1] as f64;
    let c = leaf_count as f64 / (max - min + 1.0);
    let level0 = [0.0, 0.0, c, -min * c];
    let blank = LeafModel {
        intercept: 0.0,
        slope: 0.0,
        error: 0,
    };
    let router = RegressionModel::from_parts(n, level0, vec![blank; leaf_count], 0)
        .expect("router parameters are finite");

    let starts: Vec<Option<u64>> = (0..leaf_count)
        .map(|j| first_key_routed_to(&router, j))
        .collect();
    let ranges: Vec<Option<(u64, u64)>> = (0..leaf_count)
        .map(|j| {
            let s = starts[j]?;
            if router.leaf_index(s) != j {
                return None;
            }
            let e = starts
                .get(j + 1)
                .copied()
                .flatten()
                .map_or(u64::MAX, |next| next - 1);
            Some((s, e))
        })
        .collect();

    let fitted: Vec<LeafModel> = ranges
        .iter()
        .map(|range| {
            let Some((s, e)) = *range else {
                return blank;
            };
            let ls = exact_lower_bound(keys, s) as f64;
            let le = exact_lower_bound(keys, e) as f64;
            let slope = if e > s { (le - ls) / (e - s) as f64 } else { 0.0 };
            LeafModel {
                intercept: ls - slope * s as f64,
                slope,
                error: 0,
            }
        })
        .collect();
    let unmeasured = RegressionModel::from_parts(n, level0, fitted.clone(), 0)
        .expect("fitted parameters are finite");

    let leaves = fitted
        .into_iter()
        .zip(&ranges)
        .map(|(mut leaf, range)| {
            if let Some((s, e)) = *range {
                leaf.error = change_points(keys, s, e)
                    .map(|x| {
                        let guess = unmeasured.predict(x).guess;
                        guess.abs_diff(exact_lower_bound(keys, x)) as u64
                    })
                    .max()
                    .unwrap_or(0);
            }
            leaf
        })
        .collect();

    RegressionModel::from_parts(n, level0, leaves, 0).expect("measured parameters are finite")
}

/// Smallest key routed to leaf `j` or beyond.
fn first_key_routed_to(model: &RegressionModel, j: usize) -> Option<u64> {
    if model.leaf_index(u64::MAX) < j {
        return None;
    }
    let (mut lo, mut hi) = (0u64, u64::MAX);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if model.leaf_index(mid) >= j {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Some(lo)
}

/// Range ends, distinct keys and gap starts inside `[s, e]`.
fn change_points(keys: &[u64], s: u64, e: u64) -> impl Iterator<Item = u64> + '_ {
    let from = exact_lower_bound(keys, s);
    let to = keys.partition_point(|&k| k <= e);
    let inner = keys[from..to]
        .iter()
        .enumerate()
        .flat_map(move |(i, &k)| {
            let next_gap = k.checked_add(1).filter(|&g| g <= e);
            let dup = i > 0 && keys[from + i - 1] == k;
            let own = (!dup).then_some(k);
            own.into_iter().chain(next_gap.filter(|_| !dup))
        });
    [s, e].into_iter().chain(inner)
}

/// Sorted uniform keys in `[0, max)`.
pub fn uniform_keys(count: usize, max: u64, seed: u64) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut keys: Vec<u64> = (0..count).map(|_| rng.gen_range(0..max)).collect();
    keys.sort_unstable();
    keys
}

/// Sorted keys with long duplicate runs and clustered gaps.
pub fn duplicate_heavy_keys(distinct: usize, max_run: usize, seed: u64) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut keys = Vec::new();
    let mut key = 0u64;
    for _ in 0..distinct {
        key += if rng.gen_bool(0.1) {
            rng.gen_range(1_000..1_000_000)
        } else {
            rng.gen_range(1..4)
        };
        let run = if rng.gen_bool(0.05) {
            max_run
        } else {
            rng.gen_range(1..=3)
        };
        keys.extend(std::iter::repeat(key).take(run));
    }
    keys
}

/// Sorted keys whose density grows exponentially, stressing linear models.
pub fn skewed_keys(count: usize, seed: u64) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut keys: Vec<u64> = (0..count)
        .map(|_| {
            let exp: f64 = rng.gen_range(0.0..40.0);
            2f64.powf(exp) as u64
        })
        .collect();
    keys.sort_unstable();
    keys
}
