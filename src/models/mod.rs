//! Parametric model functions fitted against histograms.
//!
//! The fitting machinery relies on one abstraction, `Model`, exposing:
//!
//! - a scalar objective for the derivative-free global stage
//! - a vector evaluation plus Jacobian for the gradient stage
//! - the guess/bounds policy used to seed the bounded search
//!
//! Models are implemented as small, pure structs so that the search code
//! stays generic over both fitting instances.

use nalgebra::DMatrix;

use crate::domain::FitGoal;
use crate::math::central_jacobian;

pub mod binomial;
pub mod jump;

pub use binomial::{BinomialModel, MixedBinomialModel};
pub use jump::JumpModel;

/// A parametric model evaluated at fixed histogram x-values.
pub trait Model {
    /// Number of free parameters.
    fn dim(&self) -> usize;

    /// Objective used by the derivative-free stage.
    fn goal(&self) -> FitGoal;

    /// Target histogram y-values the model is fitted against.
    fn observed(&self) -> &[f64];

    /// Model predictions at each histogram x-value.
    fn values(&self, params: &[f64]) -> Vec<f64>;

    /// Initial guess for the parameter vector.
    fn initial_guess(&self) -> Vec<f64>;

    /// Box constraints as `(lower, upper)`.
    fn bounds(&self) -> (Vec<f64>, Vec<f64>);

    /// Whether a parameter vector is physically valid.
    ///
    /// The local refiner is unconstrained, so its result is gated on this
    /// before being accepted.
    fn in_bounds(&self, params: &[f64]) -> bool {
        let (lower, upper) = self.bounds();
        params
            .iter()
            .zip(lower.iter().zip(upper.iter()))
            .all(|(p, (lo, hi))| p.is_finite() && *p >= *lo && *p <= *hi)
    }

    /// Jacobian of `values` with respect to the parameters.
    ///
    /// The default is a central finite difference with a relative step of
    /// 1e-3; models override it where a closed form is tractable.
    fn jacobian(&self, params: &[f64]) -> DMatrix<f64> {
        central_jacobian(params, |p| self.values(p))
    }

    /// Scalar objective for the global optimizer.
    fn objective(&self, params: &[f64]) -> f64 {
        let predicted = self.values(params);
        match self.goal() {
            FitGoal::LeastSquares => sum_of_squares(self.observed(), &predicted),
            FitGoal::MaximumLikelihood => {
                // Negative log-likelihood of the observed mass under the
                // predicted mass function.
                let mut nll = 0.0;
                for (obs, pred) in self.observed().iter().zip(predicted.iter()) {
                    if *obs > 0.0 {
                        nll -= obs * pred.max(1e-300).ln();
                    }
                }
                nll
            }
        }
    }
}

/// Residual sum of squares between two equal-length slices.
pub fn sum_of_squares(observed: &[f64], predicted: &[f64]) -> f64 {
    observed
        .iter()
        .zip(predicted.iter())
        .map(|(o, p)| {
            let r = o - p;
            r * r
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_squares_matches_hand_computation() {
        let ss = sum_of_squares(&[1.0, 2.0, 3.0], &[1.0, 1.5, 4.0]);
        assert!((ss - (0.25 + 1.0)).abs() < 1e-12);
    }
}
