//! Cross-module test suite for the engine.
//!
//! - `scenarios`: fixed datasets with known answers
//! - `oracle_contract`: window containment and resolution properties for both
//!   oracles over random, duplicate-heavy and boundary keys
