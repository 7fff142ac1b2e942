//! `popfit` library crate.
//!
//! The binary (`popfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitting engine is reusable from other tools and notebooks
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod histogram;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod opt;
pub mod report;
