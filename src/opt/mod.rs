//! Two-stage optimization: bounded stochastic global search (CMA-ES)
//! polished by gradient-based nonlinear least squares (Levenberg-Marquardt).
//!
//! Non-convergence is a *status*, not an error: callers branch on
//! `OptimStatus` and treat a failed attempt as "no improvement", which keeps
//! the model-order search going.

pub mod cmaes;
pub mod refine;

pub use cmaes::optimize;
pub use refine::refine;

/// A successful optimization outcome.
#[derive(Debug, Clone)]
pub struct Optimum {
    pub params: Vec<f64>,
    /// Final objective value (sum of squares or negative log-likelihood for
    /// the global stage; residual sum of squares for the refiner).
    pub value: f64,
    /// Objective evaluations consumed.
    pub evaluations: usize,
}

/// Why an optimization attempt produced no usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimStatus {
    /// Evaluation budget exhausted before convergence.
    EvaluationLimit,
    /// Iteration budget exhausted before convergence.
    IterationLimit,
    /// Non-finite intermediate state (degenerate covariance, failed
    /// Jacobian, line-search breakdown).
    Numerical,
}

impl std::fmt::Display for OptimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimStatus::EvaluationLimit => write!(f, "evaluation limit reached"),
            OptimStatus::IterationLimit => write!(f, "iteration limit reached"),
            OptimStatus::Numerical => write!(f, "numerical failure"),
        }
    }
}

pub type OptimResult = Result<Optimum, OptimStatus>;
