//! Binomial model for cluster-size histograms.
//!
//! For a trial count `N` and success probability `p`, the model predicts the
//! (optionally zero-truncated) binomial mass at each histogram bucket, or its
//! running sum when fitted against a cumulative histogram.
//!
//! Zero truncation rescales all buckets `k >= 1` by `1/(1 - P(X=0))`, the
//! standard zero-truncated renormalization. The gradient applies the product
//! rule to that factor: with `f = 1/(1 - pmf(0))` and base gradient `g'`,
//! `(f*g)' = f'*g + f*g'`.

use nalgebra::DMatrix;
use statrs::distribution::{Binomial, Discrete};

use crate::domain::FitGoal;
use crate::histogram::Histogram;
use crate::models::Model;

/// Guard for the `k/p` and `(N-k)/(1-p)` gradient ratios at the box edges.
const P_EPS: f64 = 1e-12;

/// Factor applied to each successive mixture component's initial probability
/// to break the symmetry of the mixture.
const GUESS_DECAY: f64 = 0.1;

/// Upper bound on unnormalized mixture fractions.
const FRACTION_BOUND: f64 = 10.0;

fn pmf(n_trials: usize, p: f64, k: f64) -> f64 {
    if k > n_trials as f64 {
        return 0.0;
    }
    let dist = Binomial::new(p.clamp(0.0, 1.0), n_trials as u64)
        .unwrap_or_else(|_| Binomial::new(0.5, n_trials as u64).unwrap());
    dist.pmf(k as u64)
}

/// `d pmf / d p`, closed form: `pmf(k) * (k/p - (N-k)/(1-p))`.
fn pmf_gradient(n_trials: usize, p: f64, k: f64) -> f64 {
    let n = n_trials as f64;
    if k > n {
        return 0.0;
    }
    let p = p.clamp(P_EPS, 1.0 - P_EPS);
    pmf(n_trials, p, k) * (k / p - (n - k) / (1.0 - p))
}

#[derive(Debug, Clone)]
pub struct BinomialModel {
    n_trials: usize,
    zero_truncated: bool,
    goal: FitGoal,
    /// Histogram bucket indices (dense, 0..=max).
    x: Vec<f64>,
    /// Fit target: cumulative mass for least squares, plain mass otherwise.
    observed: Vec<f64>,
    /// Mean of the observed histogram, used for the initial guess.
    mean: f64,
}

impl BinomialModel {
    /// Build a model against a non-cumulative cluster-size histogram.
    pub fn new(n_trials: usize, zero_truncated: bool, goal: FitGoal, hist: &Histogram) -> Self {
        debug_assert!(!hist.cumulative);
        let mean = hist.x.iter().zip(hist.y.iter()).map(|(x, y)| x * y).sum();
        let observed = match goal {
            FitGoal::LeastSquares => hist.to_cumulative().y,
            FitGoal::MaximumLikelihood => hist.y.clone(),
        };
        Self {
            n_trials,
            zero_truncated,
            goal,
            x: hist.x.clone(),
            observed,
            mean,
        }
    }

    /// Predicted (truncated) mass at each bucket.
    fn mass(&self, p: f64) -> Vec<f64> {
        if self.zero_truncated {
            let p0 = pmf(self.n_trials, p, 0.0);
            let scale = if p0 < 1.0 { 1.0 / (1.0 - p0) } else { 0.0 };
            self.x
                .iter()
                .map(|&k| {
                    if k == 0.0 {
                        0.0
                    } else {
                        scale * pmf(self.n_trials, p, k)
                    }
                })
                .collect()
        } else {
            self.x.iter().map(|&k| pmf(self.n_trials, p, k)).collect()
        }
    }

    /// `d mass / d p` at each bucket, closed form.
    ///
    /// The un-truncated gradient is `pmf(k) * (k/p - (N-k)/(1-p))`; the
    /// truncated one combines it with the renormalization factor via the
    /// product rule.
    fn mass_gradient(&self, p: f64) -> Vec<f64> {
        let n = self.n_trials;
        if self.zero_truncated {
            let p0 = pmf(n, p, 0.0);
            let dp0 = pmf_gradient(n, p, 0.0);
            let denom = (1.0 - p0).max(P_EPS);
            let scale = 1.0 / denom;
            let dscale = dp0 / (denom * denom);
            self.x
                .iter()
                .map(|&k| {
                    if k == 0.0 {
                        0.0
                    } else {
                        dscale * pmf(n, p, k) + scale * pmf_gradient(n, p, k)
                    }
                })
                .collect()
        } else {
            self.x.iter().map(|&k| pmf_gradient(n, p, k)).collect()
        }
    }
}

impl Model for BinomialModel {
    fn dim(&self) -> usize {
        1
    }

    fn goal(&self) -> FitGoal {
        self.goal
    }

    fn observed(&self) -> &[f64] {
        &self.observed
    }

    fn values(&self, params: &[f64]) -> Vec<f64> {
        let mass = self.mass(params[0]);
        match self.goal {
            FitGoal::MaximumLikelihood => mass,
            FitGoal::LeastSquares => {
                let mut acc = 0.0;
                mass.into_iter()
                    .map(|m| {
                        acc += m;
                        acc
                    })
                    .collect()
            }
        }
    }

    fn initial_guess(&self) -> Vec<f64> {
        vec![(self.mean / self.n_trials as f64).clamp(0.0, 1.0)]
    }

    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0], vec![1.0])
    }

    fn jacobian(&self, params: &[f64]) -> DMatrix<f64> {
        let grad = self.mass_gradient(params[0]);
        let column: Vec<f64> = match self.goal {
            FitGoal::MaximumLikelihood => grad,
            FitGoal::LeastSquares => {
                let mut acc = 0.0;
                grad.into_iter()
                    .map(|g| {
                        acc += g;
                        acc
                    })
                    .collect()
            }
        };
        DMatrix::from_column_slice(column.len(), 1, &column)
    }
}

/// Mixture of binomials sharing one trial count.
///
/// Order n predicts `sum_i (f_i / sum f) * pmf(k; N, p_i)` at each bucket,
/// its running sum when fitted against a cumulative histogram. Parameters
/// interleave as `[f_1, p_1, ..., f_n, p_n]`, fractions unnormalized.
#[derive(Debug, Clone)]
pub struct MixedBinomialModel {
    n_trials: usize,
    order: usize,
    goal: FitGoal,
    x: Vec<f64>,
    observed: Vec<f64>,
    mean: f64,
}

impl MixedBinomialModel {
    /// Build an order-n mixture against a non-cumulative histogram.
    pub fn new(n_trials: usize, order: usize, goal: FitGoal, hist: &Histogram) -> Self {
        debug_assert!(!hist.cumulative);
        debug_assert!(order >= 1);
        let mean = hist.x.iter().zip(hist.y.iter()).map(|(x, y)| x * y).sum();
        let observed = match goal {
            FitGoal::LeastSquares => hist.to_cumulative().y,
            FitGoal::MaximumLikelihood => hist.y.clone(),
        };
        Self {
            n_trials,
            order,
            goal,
            x: hist.x.clone(),
            observed,
            mean,
        }
    }

    /// Decompose a fitted parameter vector into `(probability, fraction)`
    /// pairs, fractions normalized, sorted by probability descending.
    pub fn components(order: usize, params: &[f64]) -> Vec<(f64, f64)> {
        let total: f64 = (0..order).map(|i| params[2 * i]).sum();
        let total = if total > 0.0 { total } else { 1.0 };
        let mut pairs: Vec<(f64, f64)> = (0..order)
            .map(|i| (params[2 * i + 1], params[2 * i] / total))
            .collect();
        pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        pairs
    }

    fn mass(&self, params: &[f64]) -> Vec<f64> {
        let total: f64 = (0..self.order).map(|i| params[2 * i]).sum();
        let total = if total > 0.0 { total } else { f64::MIN_POSITIVE };
        self.x
            .iter()
            .map(|&k| {
                (0..self.order)
                    .map(|i| params[2 * i] / total * pmf(self.n_trials, params[2 * i + 1], k))
                    .sum()
            })
            .collect()
    }

    fn cumulate(column: Vec<f64>) -> Vec<f64> {
        let mut acc = 0.0;
        column
            .into_iter()
            .map(|v| {
                acc += v;
                acc
            })
            .collect()
    }
}

impl Model for MixedBinomialModel {
    fn dim(&self) -> usize {
        2 * self.order
    }

    fn goal(&self) -> FitGoal {
        self.goal
    }

    fn observed(&self) -> &[f64] {
        &self.observed
    }

    fn values(&self, params: &[f64]) -> Vec<f64> {
        let mass = self.mass(params);
        match self.goal {
            FitGoal::MaximumLikelihood => mass,
            FitGoal::LeastSquares => Self::cumulate(mass),
        }
    }

    fn initial_guess(&self) -> Vec<f64> {
        let mut p = (self.mean / self.n_trials as f64).clamp(0.0, 1.0);
        let mut guess = Vec::with_capacity(2 * self.order);
        for _ in 0..self.order {
            guess.push(1.0);
            guess.push(p);
            p *= GUESS_DECAY;
        }
        guess
    }

    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lower = Vec::with_capacity(2 * self.order);
        let mut upper = Vec::with_capacity(2 * self.order);
        for _ in 0..self.order {
            lower.push(0.0);
            upper.push(FRACTION_BOUND);
            lower.push(0.0);
            upper.push(1.0);
        }
        (lower, upper)
    }

    /// Fractions must be strictly positive for the mixture to be meaningful.
    fn in_bounds(&self, params: &[f64]) -> bool {
        if params.iter().any(|p| !p.is_finite()) {
            return false;
        }
        (0..self.order).all(|i| {
            params[2 * i] > 0.0
                && params[2 * i] <= FRACTION_BOUND
                && (0.0..=1.0).contains(&params[2 * i + 1])
        })
    }

    fn jacobian(&self, params: &[f64]) -> DMatrix<f64> {
        let n = self.order;
        let total: f64 = (0..n).map(|i| params[2 * i]).sum();
        let total = if total > 0.0 { total } else { f64::MIN_POSITIVE };

        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(self.x.len()); 2 * n];
        for &k in &self.x {
            let masses: Vec<f64> = (0..n)
                .map(|i| pmf(self.n_trials, params[2 * i + 1], k))
                .collect();
            let weighted: f64 = (0..n).map(|i| params[2 * i] / total * masses[i]).sum();
            for i in 0..n {
                let w = params[2 * i] / total;
                // Quotient rule over the normalized fraction.
                columns[2 * i].push((masses[i] - weighted) / total);
                columns[2 * i + 1].push(w * pmf_gradient(self.n_trials, params[2 * i + 1], k));
            }
        }

        if self.goal == FitGoal::LeastSquares {
            columns = columns.into_iter().map(Self::cumulate).collect();
        }
        DMatrix::from_fn(self.x.len(), 2 * n, |r, c| columns[c][r])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::build_counts;
    use crate::math::central_jacobian;

    fn model(n_trials: usize, zero_truncated: bool) -> BinomialModel {
        let mut hist = build_counts(&[0.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 4.0], false).unwrap();
        if zero_truncated {
            hist.zero_truncate().unwrap();
        }
        BinomialModel::new(n_trials, zero_truncated, FitGoal::LeastSquares, &hist)
    }

    #[test]
    fn truncated_mass_sums_to_one_above_zero() {
        let m = model(4, true);
        let mass = m.mass(0.3);
        assert_eq!(mass[0], 0.0);
        let total: f64 = mass.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "got {total}");
    }

    #[test]
    fn cumulative_values_end_near_one() {
        let m = model(4, false);
        let values = m.values(&[0.3]);
        // Histogram spans 0..=4 = the full support of Binomial(4, p).
        assert!((values.last().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn analytic_gradient_matches_finite_difference() {
        for &trunc in &[false, true] {
            let m = model(4, trunc);
            for &p in &[0.1, 0.3, 0.7] {
                let analytic = m.jacobian(&[p]);
                let numeric = central_jacobian(&[p], |q| m.values(q));
                for i in 0..analytic.nrows() {
                    let a = analytic[(i, 0)];
                    let n = numeric[(i, 0)];
                    assert!(
                        (a - n).abs() < 1e-5,
                        "trunc={trunc} p={p} bucket {i}: analytic {a} vs numeric {n}"
                    );
                }
            }
        }
    }

    #[test]
    fn guess_is_mean_over_trials() {
        let m = model(4, false);
        let g = m.initial_guess();
        // Histogram mean is 15/8.
        assert!((g[0] - 15.0 / 8.0 / 4.0).abs() < 1e-12);
    }

    fn mixed(order: usize) -> MixedBinomialModel {
        let hist = build_counts(&[0.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 4.0], false).unwrap();
        MixedBinomialModel::new(4, order, FitGoal::LeastSquares, &hist)
    }

    #[test]
    fn mixture_of_one_matches_single_model() {
        let single = model(4, false);
        let mix = mixed(1);
        let a = single.values(&[0.3]);
        let b = mix.values(&[1.0, 0.3]);
        for (u, v) in a.iter().zip(b.iter()) {
            assert!((u - v).abs() < 1e-12);
        }
    }

    #[test]
    fn mixed_fractions_normalize_at_evaluation() {
        let m = mixed(2);
        let a = m.values(&[2.0, 0.6, 6.0, 0.2]);
        let b = m.values(&[0.25, 0.6, 0.75, 0.2]);
        for (u, v) in a.iter().zip(b.iter()) {
            assert!((u - v).abs() < 1e-12);
        }
    }

    #[test]
    fn mixed_jacobian_matches_finite_difference() {
        let m = mixed(2);
        let params = [0.4, 0.6, 0.6, 0.2];
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
    fn mixed_components_sort_by_probability() {
        let pairs = MixedBinomialModel::components(2, &[1.0, 0.2, 3.0, 0.7]);
        assert!((pairs[0].0 - 0.7).abs() < 1e-12);
        assert!((pairs[0].1 - 0.75).abs() < 1e-12);
        assert!((pairs[1].0 - 0.2).abs() < 1e-12);
    }
}
