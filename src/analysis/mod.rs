//! Analysis modules.
//!
//! Aggregation that sits outside single-submission judging.

pub mod profile;

pub use profile::*;
