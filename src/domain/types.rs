//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON
//! - reloaded later for plotting or comparisons

use serde::{Deserialize, Serialize};

/// Objective used when scoring a parameter vector.
///
/// The derivative-free global stage minimizes this scalar; the gradient stage
/// always works on residuals regardless of the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FitGoal {
    /// Sum of squared residuals against the (cumulative) histogram.
    LeastSquares,
    /// Negative log-likelihood of the observed counts.
    MaximumLikelihood,
}

/// Configuration for the cluster-size (binomial) fit.
///
/// The trial count `N` plays the role of the model order: the selector scans
/// increasing `N` starting from the largest observed cluster size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterFitConfig {
    /// Treat the x=0 bucket as unobservable (clusters of size zero cannot be
    /// seen) and renormalize the remaining mass.
    pub zero_truncated: bool,
    /// Number of trial counts `N` to scan beyond the starting value.
    pub max_order: usize,
    /// Extra optimizer restart iterations per order (see `fit::driver`).
    pub fit_restarts: usize,
    /// Stop after this many consecutive orders scored worse than the best.
    pub worse_streak: usize,
    /// Scalar objective for the global stage.
    pub goal: FitGoal,
    /// Global optimizer iteration cap per call.
    pub max_iterations: usize,
    /// Global optimizer evaluation cap per call.
    pub max_evaluations: usize,
    /// Seed for the per-call random generator.
    pub seed: u64,
}

impl Default for ClusterFitConfig {
    fn default() -> Self {
        Self {
            zero_truncated: false,
            max_order: 10,
            fit_restarts: 3,
            worse_streak: 3,
            goal: FitGoal::LeastSquares,
            max_iterations: 1000,
            max_evaluations: 30_000,
            seed: 42,
        }
    }
}

/// Configuration for the jump-distance (exponential mixture) fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpFitConfig {
    /// Maximum number of mixture components to try.
    pub max_order: usize,
    /// Extra optimizer restart iterations per order.
    pub fit_restarts: usize,
    /// Reject a mixture if any normalized fraction falls below this value.
    pub min_fraction: f64,
    /// Reject a mixture if any two adjacent sorted coefficients are closer
    /// than this ratio (identifiability guardrail).
    pub min_difference: f64,
    /// Global optimizer iteration cap per call.
    pub max_iterations: usize,
    /// Global optimizer evaluation cap per call.
    pub max_evaluations: usize,
    /// Seed for the per-call random generator.
    pub seed: u64,
}

impl Default for JumpFitConfig {
    fn default() -> Self {
        Self {
            max_order: 10,
            fit_restarts: 3,
            min_fraction: 0.1,
            min_difference: 2.0,
            max_iterations: 1000,
            max_evaluations: 30_000,
            seed: 42,
        }
    }
}

/// Box constraints and search settings for one global optimizer call.
///
/// Built per model order by the fit driver; never mutated mid-fit.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Per-parameter lower bounds.
    pub lower: Vec<f64>,
    /// Per-parameter upper bounds.
    pub upper: Vec<f64>,
    /// Population size (lambda). The literature default is
    /// `4 + floor(3 * ln(k))`; see `OptimizerConfig::default_population`.
    pub population: usize,
    /// Initial search radius per parameter (one third of the box width).
    pub sigma: Vec<f64>,
    /// Iteration (generation) cap.
    pub max_iterations: usize,
    /// Objective evaluation cap.
    pub max_evaluations: usize,
    /// Relative tolerance of the value convergence checker.
    pub relative_tolerance: f64,
    /// Absolute tolerance of the value convergence checker.
    pub absolute_tolerance: f64,
    /// Seed for the optimizer's own random generator.
    pub seed: u64,
}

impl OptimizerConfig {
    /// Bounded search over `[lower, upper]` with the standard derived
    /// population size and sigma.
    ///
    /// `scale` is the dimension fed to the population-size heuristic. For
    /// multi-parameter models this is the parameter count; the order-1 case
    /// historically used the data length instead, and we preserve that.
    pub fn bounded(lower: Vec<f64>, upper: Vec<f64>, scale: usize, seed: u64) -> Self {
        let sigma = lower
            .iter()
            .zip(upper.iter())
            .map(|(lo, hi)| (hi - lo) / 3.0)
            .collect();
        Self {
            population: Self::default_population(scale),
            sigma,
            lower,
            upper,
            max_iterations: 1000,
            max_evaluations: 30_000,
            relative_tolerance: 1e-6,
            absolute_tolerance: 1e-10,
            seed,
        }
    }

    /// `4 + floor(3 * ln(k))`, the standard CMA-ES default. Preserved exactly;
    /// convergence behavior is tuned around it.
    pub fn default_population(k: usize) -> usize {
        4 + (3.0 * (k.max(1) as f64).ln()).floor() as usize
    }
}

/// Per-order diagnostics retained for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDiagnostic {
    pub order: usize,
    pub sum_of_squares: f64,
    pub ic: f64,
}

/// Result of the cluster-size fit: a binomial `(N, p)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinomialFit {
    /// Trial count.
    pub n_trials: usize,
    /// Success probability.
    pub p: f64,
    pub sum_of_squares: f64,
    pub ic: f64,
    /// Diagnostics for every order that produced a fit.
    pub orders: Vec<OrderDiagnostic>,
}

/// Result of the jump-distance fit: a mixture of exponential populations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpFit {
    /// Number of mixture components.
    pub order: usize,
    /// Diffusion coefficients, sorted descending.
    pub coefficients: Vec<f64>,
    /// Fractions matching `coefficients`, normalized to sum to 1.
    pub fractions: Vec<f64>,
    pub sum_of_squares: f64,
    pub ic: f64,
    /// Diagnostics for every order that produced a fit.
    pub orders: Vec<OrderDiagnostic>,
    /// Orders rejected by the validity gates, with reasons.
    pub rejected: Vec<(usize, String)>,
}

/// A fitted candidate for one model order.
///
/// Created once per successful order inside the selector loop; the selector
/// keeps only the best-seen candidate and the current one.
#[derive(Debug, Clone)]
pub struct FitCandidate {
    pub order: usize,
    /// Raw parameter vector as fitted (mixture fractions unnormalized).
    pub params: Vec<f64>,
    pub sum_of_squares: f64,
    pub ic: f64,
    /// Rate/probability coefficients sorted descending.
    pub coefficients: Vec<f64>,
    /// Normalized fractions matching `coefficients`.
    pub fractions: Vec<f64>,
}
