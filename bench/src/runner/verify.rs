use lookbound_engine::{PositionOracle, SearchStrategy, Window};
use thiserror::Error;

use crate::workload::{Payload, Query, ResultMode};

/// An oracle returned a window that did not contain the lower bound, so the
/// resolved result differs from ground truth. Timings taken under it are void.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{oracle} returned incorrect result for lookup key {key}: \
     returned {returned}, expected {expected}, window {window}"
)]
pub struct ContractViolation {
    pub oracle: String,
    pub key: u64,
    pub returned: u64,
    pub expected: u64,
    pub window: Window,
}

/// Resolves oracle windows over one dataset and checks every result.
pub struct Verifier<'a, T> {
    data: &'a [T],
    mode: ResultMode,
    strategy: SearchStrategy,
}

impl<'a, T: Payload> Verifier<'a, T> {
    pub fn new(data: &'a [T], mode: ResultMode, strategy: SearchStrategy) -> Self {
        Self {
            data,
            mode,
            strategy,
        }
    }

    /// Answer `query` through `oracle` and compare with its expected result.
    #[inline(always)]
    pub fn check<O: PositionOracle + ?Sized>(
        &self,
        oracle: &O,
        query: &Query,
    ) -> Result<u64, ContractViolation> {
        let window = oracle.estimate(query.key);
        let position = self.strategy.resolve(self.data, window, query.key);
        let returned = self.mode.evaluate(self.data, position, query.key);
        if returned != query.expected {
            return Err(ContractViolation {
                oracle: oracle.name().to_string(),
                key: query.key,
                returned,
                expected: query.expected,
                window,
            });
        }
        Ok(returned)
    }
}
