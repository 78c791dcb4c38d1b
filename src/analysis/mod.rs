//! Analysis modules.
//!
//! Derives dashboard values from the analysis service payload.

pub mod aggregator;

pub use aggregator::*;
