//! Position oracle seam shared by the regression model and the piecewise index.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Half-open range `[lo, hi)` of dataset positions.
///
/// The resolver only inspects elements `lo..hi` and answers with a position in
/// `lo..=hi`; `hi` itself means "after every inspected element". An oracle
/// promises that the lower-bound index of the queried key lies in `lo..=hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub lo: usize,
    pub hi: usize,
}

impl Window {
    #[inline(always)]
    pub const fn new(lo: usize, hi: usize) -> Self {
        debug_assert!(lo <= hi);
        Self { lo, hi }
    }

    /// Window covering an entire array of `len` elements.
    #[inline]
    pub const fn full(len: usize) -> Self {
        Self { lo: 0, hi: len }
    }

    /// Number of elements the resolver may inspect.
    #[inline(always)]
    pub const fn width(&self) -> usize {
        self.hi - self.lo
    }

    /// Whether `position` is an admissible answer for this window.
    #[inline]
    pub const fn admits(&self, position: usize) -> bool {
        self.lo <= position && position <= self.hi
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lo, self.hi)
    }
}

/// Guess plus worst-case error radius, as produced by a regression model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointEstimate {
    pub guess: usize,
    pub radius: usize,
}

impl PointEstimate {
    /// Window admitting every position within `radius` of `guess`, clipped to
    /// an array of `len` elements.
    #[inline(always)]
    pub fn window(&self, len: usize) -> Window {
        let lo = self.guess.saturating_sub(self.radius).min(len);
        let hi = self
            .guess
            .saturating_add(self.radius)
            .saturating_add(1)
            .min(len);
        Window { lo, hi }
    }
}

/// Maps a lookup key to a window guaranteed to contain its lower-bound index.
///
/// `estimate` is infallible and deterministic: repeated calls on an unchanged
/// oracle return the same window.
pub trait PositionOracle {
    /// Short name used in reports and diagnostics.
    fn name(&self) -> &str;

    fn estimate(&self, key: u64) -> Window;

    /// Approximate memory held by the oracle's parameters.
    fn size_in_bytes(&self) -> usize;
}

impl<T: PositionOracle + ?Sized> PositionOracle for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    #[inline(always)]
    fn estimate(&self, key: u64) -> Window {
        (**self).estimate(key)
    }

    fn size_in_bytes(&self) -> usize {
        (**self).size_in_bytes()
    }
}

impl<T: PositionOracle + ?Sized> PositionOracle for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    #[inline(always)]
    fn estimate(&self, key: u64) -> Window {
        (**self).estimate(key)
    }

    fn size_in_bytes(&self) -> usize {
        (**self).size_in_bytes()
    }
}
