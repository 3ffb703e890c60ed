//! Lookbound engine: position oracles over sorted `u64` key arrays and the
//! bounded search that resolves their windows into exact lower bounds.
//!
//! ```text
//! engine
//! ├── dataset     # key file loader, payload rows
//! ├── index       # PositionOracle trait, Window
//! ├── rmi_core    # two-stage regression model loaded from a blob
//! ├── pgm         # error-bounded piecewise index built at run time
//! ├── resolver    # branchless bounded lower bound
//! └── prefetch    # optional memory prefetch hints
//! ```

pub mod dataset;
pub mod error;
pub mod index;
pub mod pgm;
pub mod prefetch;
pub mod resolver;
pub mod rmi_core;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(test)]
mod test;

pub use dataset::{write_keys, Dataset, Row, SortKey};
pub use error::LoadError;
pub use index::{PointEstimate, PositionOracle, Window};
pub use pgm::PiecewiseIndex;
pub use resolver::{exact_lower_bound, lower_bound_in, SearchStrategy};
pub use rmi_core::{LeafModel, RegressionModel, RegressionOracle};
