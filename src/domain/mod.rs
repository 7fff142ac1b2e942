//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - fit configurations (`ClusterFitConfig`, `JumpFitConfig`, `OptimizerConfig`)
//! - fit outputs (`BinomialFit`, `JumpFit`, `OrderDiagnostic`)

pub mod types;

pub use types::*;
