//! Bounded CMA-ES global search.
//!
//! Canonical covariance-matrix-adaptation evolution strategy with evolution
//! paths and rank-1/rank-mu covariance updates. Box constraints are enforced
//! by mirroring violating coordinates back into the feasible region before
//! evaluation.
//!
//! Determinism: the generator is seeded from `OptimizerConfig::seed`, so a
//! call with identical inputs reproduces the same trajectory.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::domain::OptimizerConfig;
use crate::opt::{OptimResult, OptimStatus, Optimum};

/// Floor for covariance eigenvalues; keeps the sampling step well defined.
const MIN_EIGENVALUE: f64 = 1e-30;

/// Mirror a coordinate back into `[lo, hi]`.
fn mirror(mut v: f64, lo: f64, hi: f64) -> f64 {
    // A handful of reflections is enough for any realistic overshoot.
    for _ in 0..8 {
        if v < lo {
            v = lo + (lo - v);
        } else if v > hi {
            v = hi - (v - hi);
        } else {
            break;
        }
    }
    v.clamp(lo, hi)
}

/// Expected norm of an n-dimensional standard normal vector.
fn chi_n(n: f64) -> f64 {
    n.sqrt() * (1.0 - 1.0 / (4.0 * n) + 1.0 / (21.0 * n * n))
}

/// Recombination weights: log-rank weighting over the best half.
fn recombination_weights(lambda: usize) -> (Vec<f64>, usize) {
    let mu = (lambda / 2).max(1);
    let mut weights: Vec<f64> = (0..mu)
        .map(|i| (mu as f64 + 0.5).ln() - ((i + 1) as f64).ln())
        .collect();
    let total: f64 = weights.iter().sum();
    for w in weights.iter_mut() {
        *w /= total;
    }
    (weights, mu)
}

/// Minimize `objective` over the box in `config`, starting from `guess`.
///
/// Returns `Ok` with the best point when the value checker converges or the
/// iteration cap is reached, `Err(EvaluationLimit)` when the evaluation
/// budget would be exceeded, and `Err(Numerical)` on a degenerate state.
pub fn optimize<F>(mut objective: F, guess: &[f64], config: &OptimizerConfig) -> OptimResult
where
    F: FnMut(&[f64]) -> f64,
{
    let n = guess.len();
    debug_assert_eq!(config.lower.len(), n);
    debug_assert_eq!(config.upper.len(), n);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let lambda = config.population.max(4);
    let (weights, mu) = recombination_weights(lambda);
    let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

    let nf = n as f64;
    let c_sigma = (mu_eff + 2.0) / (nf + mu_eff + 5.0);
    let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (nf + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
    let c_c = (4.0 + mu_eff / nf) / (nf + 4.0 + 2.0 * mu_eff / nf);
    let c1 = 2.0 / ((nf + 1.3).powi(2) + mu_eff);
    let c_mu = (1.0 - c1).min(2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((nf + 2.0).powi(2) + mu_eff));
    let chi = chi_n(nf);

    // Scalar step size is the largest per-parameter sigma; the per-parameter
    // ratios seed the initial (diagonal) covariance.
    let sigma0 = config
        .sigma
        .iter()
        .cloned()
        .fold(0.0_f64, f64::max)
        .max(f64::MIN_POSITIVE);
    let mut sigma = sigma0;
    let mut cov = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        let ratio = (config.sigma[i] / sigma0).max(1e-12);
        cov[(i, i)] = ratio * ratio;
    }

    let mut mean = DVector::from_iterator(
        n,
        guess
            .iter()
            .enumerate()
            .map(|(i, &g)| mirror(g, config.lower[i], config.upper[i])),
    );
    let mut p_sigma = DVector::<f64>::zeros(n);
    let mut p_c = DVector::<f64>::zeros(n);

    let mut best_value = f64::INFINITY;
    let mut best_params: Vec<f64> = mean.as_slice().to_vec();
    let mut prev_gen_best = f64::INFINITY;
    let mut evaluations = 0usize;

    for generation in 0..config.max_iterations {
        if evaluations + lambda > config.max_evaluations {
            return Err(OptimStatus::EvaluationLimit);
        }

        let eigen = cov.clone().symmetric_eigen();
        if eigen.eigenvalues.iter().any(|v| !v.is_finite()) {
            return Err(OptimStatus::Numerical);
        }
        let basis = eigen.eigenvectors;
        let scale: DVector<f64> =
            eigen.eigenvalues.map(|v| v.max(MIN_EIGENVALUE).sqrt());

        // Sample and evaluate the population.
        let mut scored: Vec<(f64, DVector<f64>)> = Vec::with_capacity(lambda);
        for _ in 0..lambda {
            let z = DVector::from_iterator(n, (0..n).map(|_| rng.sample::<f64, _>(StandardNormal)));
            let y = &basis * z.component_mul(&scale);
            let mut x = &mean + y * sigma;
            for i in 0..n {
                x[i] = mirror(x[i], config.lower[i], config.upper[i]);
            }
            let value = objective(x.as_slice());
            let value = if value.is_finite() { value } else { f64::INFINITY };
            scored.push((value, x));
        }
        evaluations += lambda;
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let gen_best = scored[0].0;
        if gen_best < best_value {
            best_value = gen_best;
            best_params = scored[0].1.as_slice().to_vec();
        }

        // Weighted recombination of the best half.
        let mean_old = mean.clone();
        let mut mean_new = DVector::<f64>::zeros(n);
        for (w, (_, x)) in weights.iter().zip(scored.iter().take(mu)) {
            mean_new += x * *w;
        }
        let y_w = (&mean_new - &mean_old) / sigma;

        // C^{-1/2} via the eigendecomposition already at hand.
        let inv_scale = DMatrix::from_diagonal(&scale.map(|s| 1.0 / s));
        let inv_sqrt_cov = &basis * inv_scale * basis.transpose();

        p_sigma = &p_sigma * (1.0 - c_sigma)
            + &inv_sqrt_cov * &y_w * (c_sigma * (2.0 - c_sigma) * mu_eff).sqrt();
        let ps_norm = p_sigma.norm();

        let h_sigma = if ps_norm
            / (1.0 - (1.0 - c_sigma).powi(2 * (generation as i32 + 1))).sqrt()
            < (1.4 + 2.0 / (nf + 1.0)) * chi
        {
            1.0
        } else {
            0.0
        };
        p_c = &p_c * (1.0 - c_c) + &y_w * (h_sigma * (c_c * (2.0 - c_c) * mu_eff).sqrt());

        // Rank-mu update from the same best-half sample.
        let mut rank_mu = DMatrix::<f64>::zeros(n, n);
        for (w, (_, x)) in weights.iter().zip(scored.iter().take(mu)) {
            let y_i = (x - &mean_old) / sigma;
            rank_mu += &y_i * y_i.transpose() * *w;
        }

        let correction = (1.0 - h_sigma) * c_c * (2.0 - c_c);
        cov = &cov * (1.0 - c1 - c_mu)
            + (&p_c * p_c.transpose() + &cov * correction) * c1
            + rank_mu * c_mu;

        mean = mean_new;
        sigma *= ((c_sigma / d_sigma) * (ps_norm / chi - 1.0)).exp();
        if !sigma.is_finite() || sigma > 1e12 {
            return Err(OptimStatus::Numerical);
        }

        // Value convergence checker over consecutive generation bests.
        let delta = (prev_gen_best - gen_best).abs();
        let magnitude = prev_gen_best.abs().max(gen_best.abs());
        if generation > 0
            && (delta <= config.relative_tolerance * magnitude
                || delta <= config.absolute_tolerance)
        {
            return Ok(Optimum {
                params: best_params,
                value: best_value,
                evaluations,
            });
        }
        prev_gen_best = gen_best;
    }

    Ok(Optimum {
        params: best_params,
        value: best_value,
        evaluations,
    })
}
