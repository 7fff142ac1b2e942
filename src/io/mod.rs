//! Input/output helpers.
//!
//! - raw observation ingest + validation (`ingest`)
//! - result exports (JSON) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
