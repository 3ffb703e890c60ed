//! Error-bounded piecewise linear index (PGM-style), built at run time.
//!
//! Level 0 covers the dataset with linear segments whose predictions stay
//! within `epsilon` of the lower-bound position of every key they cover.
//! Each upper level indexes the first keys of the level below with
//! `epsilon_recursive`, until a level shrinks to a single segment. A query
//! descends the levels, resolving each level's window with the bounded
//! resolver, and finally returns the level-0 window.
//!
//! Segments are fitted on points `(key, first occurrence)` for every distinct
//! key, plus a point `(prev + 1, first occurrence)` at the start of every gap
//! between consecutive distinct keys. Since predictions are monotone in the
//! key, pinning both ends of a gap pins every absent key inside it, so
//! windows admit the lower bound of any key, present or not.

use std::mem;

use serde::Serialize;

use crate::dataset::SortKey;
use crate::index::{PositionOracle, Window};
use crate::resolver::lower_bound_in;

pub const DEFAULT_EPSILON: usize = 64;
pub const DEFAULT_EPSILON_RECURSIVE: usize = 4;

/// Linear model anchored at its first key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    first_key: u64,
    slope: f64,
    intercept: f64,
    /// Measured worst-case distance between prediction and true position.
    radius: usize,
}

impl SortKey for Segment {
    #[inline(always)]
    fn sort_key(&self) -> u64 {
        self.first_key
    }
}

impl Segment {
    /// Predicted position for `key >= first_key`, clamped to `[0, len]`.
    #[inline(always)]
    fn position(&self, key: u64, len: usize) -> usize {
        let dx = key.saturating_sub(self.first_key) as f64;
        let p = (self.intercept + self.slope * dx).round();
        (p.max(0.0) as usize).min(len)
    }

    #[inline(always)]
    fn window(&self, key: u64, len: usize) -> Window {
        let p = self.position(key, len);
        Window {
            lo: p.saturating_sub(self.radius),
            hi: (p + self.radius + 1).min(len),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Point {
    x: u64,
    y: usize,
    gap: bool,
}

/// Shrinking-cone segmentation over a stream of points with increasing `x`.
struct ConeFitter {
    epsilon: f64,
    len: usize,
    points: Vec<Point>,
    slope_lo: f64,
    slope_hi: f64,
    segments: Vec<Segment>,
}

impl ConeFitter {
    fn new(epsilon: usize, len: usize) -> Self {
        Self {
            // Half a position of slack absorbs the final rounding step.
            epsilon: (epsilon as f64 - 0.5).max(0.0),
            len,
            points: Vec::new(),
            slope_lo: f64::NEG_INFINITY,
            slope_hi: f64::INFINITY,
            segments: Vec::new(),
        }
    }

    fn push(&mut self, point: Point) {
        if self.try_extend(point) {
            self.points.push(point);
            return;
        }

        // A segment must never end on a gap point: keys between that gap
        // point and the next real key would route here but lie past the
        // segment's last fitted point. Reopen on the gap point instead.
        let last = *self.points.last().unwrap_or(&point);
        let restart_on_gap = last.gap && self.points.len() > 1;
        self.close();
        if restart_on_gap {
            self.points.push(last);
            let fits = self.try_extend(point);
            debug_assert!(fits, "two points always fit");
        }
        self.points.push(point);
    }

    fn try_extend(&mut self, point: Point) -> bool {
        let Some(anchor) = self.points.first() else {
            return true;
        };
        let dx = (point.x - anchor.x) as f64;
        let dy = point.y as f64 - anchor.y as f64;
        let lo = self.slope_lo.max((dy - self.epsilon) / dx);
        let hi = self.slope_hi.min((dy + self.epsilon) / dx);
        if lo > hi {
            return false;
        }
        self.slope_lo = lo;
        self.slope_hi = hi;
        true
    }

    fn close(&mut self) {
        let Some(anchor) = self.points.first().copied() else {
            return;
        };
        let slope = if self.points.len() == 1 {
            0.0
        } else {
            (self.slope_lo + self.slope_hi) / 2.0
        };
        let mut segment = Segment {
            first_key: anchor.x,
            slope,
            intercept: anchor.y as f64,
            radius: 0,
        };
        segment.radius = self
            .points
            .iter()
            .map(|p| segment.position(p.x, self.len).abs_diff(p.y))
            .max()
            .unwrap_or(0);
        self.segments.push(segment);

        self.points.clear();
        self.slope_lo = f64::NEG_INFINITY;
        self.slope_hi = f64::INFINITY;
    }

    fn finish(mut self) -> Vec<Segment> {
        self.close();
        self.segments
    }
}

/// Segment a sorted array whose lower bounds the segments must bracket.
fn build_level<T: SortKey>(keys: &[T], epsilon: usize) -> Vec<Segment> {
    let mut fitter = ConeFitter::new(epsilon, keys.len());
    let mut prev: Option<u64> = None;
    let mut i = 0;
    while i < keys.len() {
        let key = keys[i].sort_key();
        if let Some(prev) = prev {
            if key > prev + 1 {
                fitter.push(Point {
                    x: prev + 1,
                    y: i,
                    gap: true,
                });
            }
        }
        fitter.push(Point {
            x: key,
            y: i,
            gap: false,
        });
        prev = Some(key);
        i += 1;
        while i < keys.len() && keys[i].sort_key() == key {
            i += 1;
        }
    }
    fitter.finish()
}

/// Index of the last segment whose first key is `<= key`, searching `window`.
#[inline(always)]
fn route(segments: &[Segment], window: Window, key: u64) -> usize {
    let lb = lower_bound_in(segments, window, key);
    if lb < segments.len() && segments[lb].first_key == key {
        lb
    } else {
        lb.saturating_sub(1)
    }
}

/// Per-level shape of a built index.
#[derive(Debug, Clone, Serialize)]
pub struct LevelStats {
    pub segments: usize,
    pub max_radius: usize,
}

/// Multi-level piecewise index over a sorted key array.
#[derive(Debug, Clone)]
pub struct PiecewiseIndex {
    len: usize,
    first_key: u64,
    last_key: u64,
    epsilon: usize,
    epsilon_recursive: usize,
    /// `levels[0]` covers the data; each next level covers the one below.
    levels: Vec<Vec<Segment>>,
}

impl PiecewiseIndex {
    pub fn build(keys: &[u64], epsilon: usize) -> Self {
        Self::build_with(keys, epsilon, DEFAULT_EPSILON_RECURSIVE)
    }

    pub fn build_with(keys: &[u64], epsilon: usize, epsilon_recursive: usize) -> Self {
        let mut index = Self {
            len: keys.len(),
            first_key: keys.first().copied().unwrap_or(0),
            last_key: keys.last().copied().unwrap_or(0),
            epsilon,
            epsilon_recursive,
            levels: Vec::new(),
        };
        if keys.is_empty() {
            return index;
        }

        index.levels.push(build_level(keys, epsilon));
        while let Some(top) = index.levels.last() {
            if top.len() <= 1 {
                break;
            }
            let next = build_level(top, epsilon_recursive);
            // Stop once recursion no longer shrinks; the top is then searched whole.
            if next.len() >= top.len() {
                break;
            }
            index.levels.push(next);
        }

        for (level, stats) in index.level_stats().iter().enumerate() {
            tracing::debug!(
                level,
                segments = stats.segments,
                max_radius = stats.max_radius,
                "piecewise level built"
            );
        }
        index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn epsilon(&self) -> usize {
        self.epsilon
    }

    pub fn epsilon_recursive(&self) -> usize {
        self.epsilon_recursive
    }

    pub fn height(&self) -> usize {
        self.levels.len()
    }

    /// Number of level-0 segments.
    pub fn segment_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn level_stats(&self) -> Vec<LevelStats> {
        self.levels
            .iter()
            .map(|segments| LevelStats {
                segments: segments.len(),
                max_radius: segments.iter().map(|s| s.radius).max().unwrap_or(0),
            })
            .collect()
    }

    /// Window over the data for `key`.
    #[inline]
    pub fn approximate(&self, key: u64) -> Window {
        if self.len == 0 || key < self.first_key {
            return Window::new(0, 0);
        }
        if key > self.last_key {
            return Window::new(self.len, self.len);
        }

        let top = self.levels.len() - 1;
        let mut seg = route(&self.levels[top], Window::full(self.levels[top].len()), key);
        for level in (1..=top).rev() {
            let below = &self.levels[level - 1];
            let below_last = below[below.len() - 1].first_key;
            let window = if key > below_last {
                Window::new(below.len(), below.len())
            } else {
                self.levels[level][seg].window(key, below.len())
            };
            seg = route(below, window, key);
        }
        self.levels[0][seg].window(key, self.len)
    }
}

impl PositionOracle for PiecewiseIndex {
    fn name(&self) -> &str {
        "PGM"
    }

    #[inline(always)]
    fn estimate(&self, key: u64) -> Window {
        self.approximate(key)
    }

    fn size_in_bytes(&self) -> usize {
        mem::size_of::<Self>()
            + self
                .levels
                .iter()
                .map(|l| l.len() * mem::size_of::<Segment>() + mem::size_of::<Vec<Segment>>())
                .sum::<usize>()
    }
}
