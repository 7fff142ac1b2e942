//! Exponential jump-distance models.
//!
//! Single population: `F(x) = 1 - exp(-x / (4D))`, the cumulative
//! distribution of squared jump distances for a population diffusing with
//! coefficient `D`.
//!
//! Mixed population of order n: a normalized weighted sum,
//! `F(x) = 1 - sum_i (f_i / sum f) * exp(-x / (4 D_i))`. Fractions are stored
//! unnormalized and divided by their sum at evaluation time.

use nalgebra::DMatrix;

use crate::domain::FitGoal;
use crate::histogram::Histogram;
use crate::models::Model;

/// Factor applied to each successive component's initial coefficient to
/// break the symmetry of the mixture.
const GUESS_DECAY: f64 = 0.1;

/// Upper bound multiplier over the single-population estimate.
const BOUND_FACTOR: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct JumpModel {
    order: usize,
    x: Vec<f64>,
    /// Cumulative histogram values the model is fitted against.
    observed: Vec<f64>,
    /// Single-population coefficient estimate (mean squared distance / 4).
    d_estimate: f64,
}

impl JumpModel {
    /// Build an order-n model against a cumulative jump-distance histogram.
    pub fn new(order: usize, hist: &Histogram) -> Self {
        debug_assert!(hist.cumulative);
        debug_assert!(order >= 1);
        let mass = hist.to_non_cumulative();
        let mean: f64 = mass.x.iter().zip(mass.y.iter()).map(|(x, y)| x * y).sum();
        Self {
            order,
            x: hist.x.clone(),
            observed: hist.y.clone(),
            d_estimate: (mean / 4.0).max(f64::MIN_POSITIVE),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Decompose a fitted parameter vector into `(coefficient, fraction)`
    /// pairs, fractions normalized to sum to 1, sorted by coefficient
    /// descending.
    pub fn components(order: usize, params: &[f64]) -> Vec<(f64, f64)> {
        let mut pairs: Vec<(f64, f64)> = if order == 1 {
            vec![(params[0], 1.0)]
        } else {
            let total: f64 = (0..order).map(|i| params[2 * i]).sum();
            let total = if total > 0.0 { total } else { 1.0 };
            (0..order)
                .map(|i| (params[2 * i + 1], params[2 * i] / total))
                .collect()
        };
        pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        pairs
    }

    fn decay(x: f64, d: f64) -> f64 {
        if d <= 0.0 {
            if x <= 0.0 { 1.0 } else { 0.0 }
        } else {
            (-x / (4.0 * d)).exp()
        }
    }
}

impl Model for JumpModel {
    fn dim(&self) -> usize {
        if self.order == 1 { 1 } else { 2 * self.order }
    }

    fn goal(&self) -> FitGoal {
        FitGoal::LeastSquares
    }

    fn observed(&self) -> &[f64] {
        &self.observed
    }

    fn values(&self, params: &[f64]) -> Vec<f64> {
        if self.order == 1 {
            let d = params[0];
            return self.x.iter().map(|&x| 1.0 - Self::decay(x, d)).collect();
        }

        let total: f64 = (0..self.order).map(|i| params[2 * i]).sum();
        let total = if total > 0.0 { total } else { f64::MIN_POSITIVE };
        self.x
            .iter()
            .map(|&x| {
                let sum: f64 = (0..self.order)
                    .map(|i| params[2 * i] / total * Self::decay(x, params[2 * i + 1]))
                    .sum();
                1.0 - sum
            })
            .collect()
    }

    fn initial_guess(&self) -> Vec<f64> {
        if self.order == 1 {
            return vec![self.d_estimate];
        }
        let mut guess = Vec::with_capacity(2 * self.order);
        let mut d = self.d_estimate;
        for _ in 0..self.order {
            guess.push(1.0);
            guess.push(d);
            d *= GUESS_DECAY;
        }
        guess
    }

    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let d_upper = BOUND_FACTOR * self.d_estimate;
        if self.order == 1 {
            return (vec![0.0], vec![d_upper]);
        }
        let mut lower = Vec::with_capacity(2 * self.order);
        let mut upper = Vec::with_capacity(2 * self.order);
        for _ in 0..self.order {
            lower.push(0.0);
            upper.push(BOUND_FACTOR);
            lower.push(0.0);
            upper.push(d_upper);
        }
        (lower, upper)
    }

    /// Fractions and coefficients must be strictly positive for a refined
    /// result to be physically meaningful.
    fn in_bounds(&self, params: &[f64]) -> bool {
        if params.iter().any(|p| !p.is_finite()) {
            return false;
        }
        let (_, upper) = self.bounds();
        params
            .iter()
            .zip(upper.iter())
            .all(|(p, hi)| *p > 0.0 && *p <= *hi)
    }

    fn jacobian(&self, params: &[f64]) -> DMatrix<f64> {
        let rows = self.x.len();
        let mut jac = DMatrix::<f64>::zeros(rows, self.dim());

        if self.order == 1 {
            let d = params[0].max(f64::MIN_POSITIVE);
            for (r, &x) in self.x.iter().enumerate() {
                // dF/dD = -exp(-x/(4D)) * x / (4 D^2)
                jac[(r, 0)] = -Self::decay(x, d) * x / (4.0 * d * d);
            }
            return jac;
        }

        let n = self.order;
        let total: f64 = (0..n).map(|i| params[2 * i]).sum();
        let total = if total > 0.0 { total } else { f64::MIN_POSITIVE };
        for (r, &x) in self.x.iter().enumerate() {
            let decays: Vec<f64> = (0..n).map(|i| Self::decay(x, params[2 * i + 1])).collect();
            let weighted: f64 = (0..n).map(|i| params[2 * i] / total * decays[i]).sum();
            for i in 0..n {
                let w = params[2 * i] / total;
                let d = params[2 * i + 1].max(f64::MIN_POSITIVE);
                // Quotient rule over the normalized fraction:
                // dF/df_i = -(E_i - sum_j w_j E_j) / sum f
                jac[(r, 2 * i)] = -(decays[i] - weighted) / total;
                // dF/dD_i = -w_i * E_i * x / (4 D_i^2)
                jac[(r, 2 * i + 1)] = -w * decays[i] * x / (4.0 * d * d);
            }
        }
        jac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::build_cumulative_steps;
    use crate::math::central_jacobian;

    fn hist() -> Histogram {
        build_cumulative_steps(&[0.1, 0.2, 0.4, 0.8, 1.6, 3.2, 6.4]).unwrap()
    }

    #[test]
    fn single_population_matches_closed_form() {
        let m = JumpModel::new(1, &hist());
        let d = 0.5;
        let values = m.values(&[d]);
        for (v, &x) in values.iter().zip(m.x.iter()) {
            let expected = 1.0 - (-x / (4.0 * d)).exp();
            assert!((v - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn mixture_fractions_normalize_at_evaluation() {
        let m = JumpModel::new(2, &hist());
        // Unnormalized fractions 2:6 behave like 0.25:0.75.
        let a = m.values(&[2.0, 1.0, 6.0, 0.1]);
        let b = m.values(&[0.25, 1.0, 0.75, 0.1]);
        for (u, v) in a.iter().zip(b.iter()) {
            assert!((u - v).abs() < 1e-12);
        }
    }

    #[test]
    fn analytic_jacobian_matches_finite_difference() {
        let m = JumpModel::new(2, &hist());
        let params = [0.4, 1.0, 0.6, 0.1];
        let analytic = m.jacobian(&params);
        let numeric = central_jacobian(&params, |p| m.values(p));
        for r in 0..analytic.nrows() {
            for c in 0..analytic.ncols() {
                let a = analytic[(r, c)];
                let n = numeric[(r, c)];
                assert!((a - n).abs() < 1e-5, "({r},{c}): analytic {a} vs numeric {n}");
            }
        }
    }

    #[test]
    fn guess_decays_successive_coefficients() {
        let m = JumpModel::new(3, &hist());
        let g = m.initial_guess();
        assert_eq!(g.len(), 6);
        assert!((g[3] - g[1] * 0.1).abs() < 1e-12);
        assert!((g[5] - g[1] * 0.01).abs() < 1e-12);
    }

    #[test]
    fn components_sort_descending_and_normalize() {
        let pairs = JumpModel::components(2, &[1.0, 0.1, 3.0, 2.5]);
        assert!((pairs[0].0 - 2.5).abs() < 1e-12);
        assert!((pairs[0].1 - 0.75).abs() < 1e-12);
        assert!((pairs[1].0 - 0.1).abs() < 1e-12);
        assert!((pairs[1].1 - 0.25).abs() < 1e-12);
    }
}
