//! Bounded lower-bound resolution.
//!
//! Turns an oracle window into the exact index of the first element `>= key`.
//! Comparisons use strict less-than, so the answer is the first occurrence of
//! a duplicated key without any backward scan, provided the window admits the
//! true lower bound. That precondition belongs to the oracle and is checked by
//! the verifier, not here.

use serde::{Deserialize, Serialize};

use crate::dataset::SortKey;
use crate::index::Window;
use crate::prefetch::prefetch_read;

/// Branch-minimised lower bound within `window`.
///
/// Runs `ceil(log2(width))` halving steps plus one final comparison, with
/// no allocation. Every inspected element lies in `window.lo..window.hi`; a
/// key greater than the whole window resolves to `window.hi`, which is never
/// dereferenced.
#[inline]
pub fn lower_bound_in<T: SortKey>(data: &[T], window: Window, key: u64) -> usize {
    debug_assert!(window.hi <= data.len(), "window {window} exceeds {}", data.len());

    let mut n = window.width();
    let mut offset = window.lo;
    if n == 0 {
        return offset;
    }

    while n > 1 {
        let half = n / 2;
        let mid = offset + half;
        let next_half = (n - half) / 2;

        prefetch_read(data, offset + next_half);
        prefetch_read(data, mid + next_half);

        // Arithmetic select: advance to `mid` iff it is still below the key.
        let below = (data[mid].sort_key() < key) as usize;
        offset += below * half;
        n -= half;
    }

    offset + (data[offset].sort_key() < key) as usize
}

/// Reference lower bound over the whole array.
///
/// Independent of any oracle; used to compute ground truth.
#[inline]
pub fn exact_lower_bound<T: SortKey>(data: &[T], key: u64) -> usize {
    data.partition_point(|e| e.sort_key() < key)
}

/// Which search resolves an oracle window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// [`lower_bound_in`]: arithmetic select with prefetching.
    #[default]
    Branchless,
    /// `partition_point` restricted to the window.
    Standard,
}

impl SearchStrategy {
    #[inline(always)]
    pub fn resolve<T: SortKey>(self, data: &[T], window: Window, key: u64) -> usize {
        match self {
            SearchStrategy::Branchless => lower_bound_in(data, window, key),
            SearchStrategy::Standard => {
                window.lo + data[window.lo..window.hi].partition_point(|e| e.sort_key() < key)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchStrategy::Branchless => "branchless",
            SearchStrategy::Standard => "standard",
        }
    }
}

impl std::str::FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "branchless" => Ok(SearchStrategy::Branchless),
            "standard" | "std" => Ok(SearchStrategy::Standard),
            _ => Err(format!(
                "Unknown search strategy: {s}. Use 'branchless' or 'standard'"
            )),
        }
    }
}
