//! Reporting utilities: formatted terminal output for fit results.

pub mod format;

pub use format::{format_cluster_fit, format_jump_fit};
