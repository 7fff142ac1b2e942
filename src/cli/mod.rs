//! Command-line parsing for the population fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::FitGoal;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "popfit",
    version,
    about = "Mixture-model fitting with automatic model-order selection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a binomial (N, p) to observed cluster sizes.
    Clusters(ClusterArgs),
    /// Fit an exponential mixture to observed squared jump distances.
    Jumps(JumpArgs),
}

/// Options for the cluster-size fit.
#[derive(Debug, Parser, Clone)]
pub struct ClusterArgs {
    /// Input file: whitespace-separated cluster sizes.
    pub input: PathBuf,

    /// Treat size-zero clusters as unobservable and renormalize.
    #[arg(long)]
    pub zero_truncated: bool,

    /// Number of trial counts N to scan beyond the starting value.
    #[arg(long, default_value_t = 10)]
    pub max_order: usize,

    /// Extra optimizer restart iterations per order.
    #[arg(long, default_value_t = 3)]
    pub restarts: usize,

    /// Stop after this many consecutive non-improving trial counts.
    #[arg(long, default_value_t = 3)]
    pub worse_streak: usize,

    /// Objective for the global search stage.
    #[arg(long, value_enum, default_value_t = FitGoal::LeastSquares)]
    pub goal: FitGoal,

    /// Global optimizer iteration cap per call.
    #[arg(long, default_value_t = 1000)]
    pub max_iterations: usize,

    /// Global optimizer evaluation cap per call.
    #[arg(long, default_value_t = 30_000)]
    pub max_evaluations: usize,

    /// Random seed for the optimizer.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Export the fit result as JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Print fit progress to stderr.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Also print per-attempt optimizer detail (implies --verbose).
    #[arg(long)]
    pub debug: bool,
}

/// Options for the jump-distance fit.
#[derive(Debug, Parser, Clone)]
pub struct JumpArgs {
    /// Input file: whitespace-separated squared jump distances.
    pub input: PathBuf,

    /// Maximum number of mixture components to try.
    #[arg(long, default_value_t = 10)]
    pub max_order: usize,

    /// Extra optimizer restart iterations per order.
    #[arg(long, default_value_t = 3)]
    pub restarts: usize,

    /// Reject mixtures with any fraction below this value.
    #[arg(long, default_value_t = 0.1)]
    pub min_fraction: f64,

    /// Reject mixtures whose adjacent coefficients differ by less than this factor.
    #[arg(long, default_value_t = 2.0)]
    pub min_difference: f64,

    /// Global optimizer iteration cap per call.
    #[arg(long, default_value_t = 1000)]
    pub max_iterations: usize,

    /// Global optimizer evaluation cap per call.
    #[arg(long, default_value_t = 30_000)]
    pub max_evaluations: usize,

    /// Random seed for the optimizer.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Export the fit result as JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the sampled best-fit curves as JSON.
    #[arg(long = "export-curves")]
    pub export_curves: Option<PathBuf>,

    /// Print fit progress to stderr.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Also print per-attempt optimizer detail (implies --verbose).
    #[arg(long)]
    pub debug: bool,
}
