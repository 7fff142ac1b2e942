//! Numerical utilities: finite differences.

pub mod finite_diff;

pub use finite_diff::*;
