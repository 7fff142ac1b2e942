//! Model-order selection loops.
//!
//! Both instances scan increasing model order, fit each order with the
//! two-stage driver, score it with a Bayesian information criterion, and
//! stop per their own policy:
//!
//! - cluster sizes: scan trial counts `N` starting at the largest observed
//!   cluster, stop after a streak of consecutive non-improving orders;
//!   scored on the residual sum of squares
//! - jump distances: scan mixture orders greedily, stop at the first order
//!   that fails to improve the criterion or fails a validity gate; scored
//!   on the mixture likelihood of the raw observations, because residuals
//!   of a cumulative histogram are correlated and an extra smooth component
//!   always absorbs some of them regardless of the true order
//!
//! A failed fit is never an error at this level; it ends the scan and the
//! best order seen so far is returned.

use crate::domain::{
    BinomialFit, ClusterFitConfig, FitCandidate, JumpFit, JumpFitConfig, OrderDiagnostic,
};
use crate::error::AppError;
use crate::fit::driver::{FitSettings, fit_model};
use crate::histogram::{build_counts, build_cumulative_steps};
use crate::logging::{CurveSampler, FitSink, NullSampler, NullSink};
use crate::models::{BinomialModel, JumpModel, Model};

/// Floor under `ss / n` inside the criterion; a perfect fit would otherwise
/// take the log of zero.
const IC_FLOOR: f64 = 1e-12;

/// Seed stride between model orders, wide enough that the per-launch offsets
/// inside the driver never collide across orders.
const ORDER_SEED_STRIDE: u64 = 1000;

/// Bayesian information criterion on a residual sum of squares.
///
/// `n ln(max(ss/n, floor)) + k ln(n)` with `n` histogram points and `k` free
/// parameters. Lower is better.
pub fn information_criterion(sum_of_squares: f64, points: usize, params: usize) -> f64 {
    let n = points as f64;
    n * (sum_of_squares / n).max(IC_FLOOR).ln() + params as f64 * n.ln()
}

/// Bayesian information criterion of an exponential mixture on the raw
/// observations: `-2 ln L + k ln n` with `n` observations and `k` free
/// parameters. Lower is better.
///
/// `coefficients` and `fractions` are the sorted, normalized components; the
/// density of one component is `f / (4D) * exp(-x / (4D))`.
pub fn mixture_likelihood_criterion(
    values: &[f64],
    coefficients: &[f64],
    fractions: &[f64],
    params: usize,
) -> f64 {
    let mut log_likelihood = 0.0;
    for &x in values {
        let density: f64 = coefficients
            .iter()
            .zip(fractions.iter())
            .map(|(&d, &f)| {
                let d = d.max(f64::MIN_POSITIVE);
                f / (4.0 * d) * (-x / (4.0 * d)).exp()
            })
            .sum();
        log_likelihood += density.max(1e-300).ln();
    }
    -2.0 * log_likelihood + params as f64 * (values.len() as f64).ln()
}

/// Fit a binomial `(N, p)` to raw cluster sizes, silently.
pub fn fit_cluster_sizes(
    values: &[f64],
    config: &ClusterFitConfig,
) -> Result<Option<BinomialFit>, AppError> {
    fit_cluster_sizes_with(values, config, &mut NullSink)
}

/// Fit a binomial `(N, p)` to raw cluster sizes, reporting progress.
///
/// Returns `Ok(None)` when the data admits no fit at all: every observation
/// is zero, or no trial count produced a converged fit.
pub fn fit_cluster_sizes_with(
    values: &[f64],
    config: &ClusterFitConfig,
    sink: &mut dyn FitSink,
) -> Result<Option<BinomialFit>, AppError> {
    let mut hist = build_counts(values, false)?;
    let max_observed = hist.x.last().copied().unwrap_or(0.0) as usize;
    if max_observed == 0 && !config.zero_truncated {
        sink.info(format_args!("all observed cluster sizes are zero; nothing to fit"));
        return Ok(None);
    }
    if config.zero_truncated {
        hist.zero_truncate()?;
    }

    let start_n = max_observed.max(1);
    let points = hist.len();

    let mut orders: Vec<OrderDiagnostic> = Vec::new();
    let mut best: Option<(usize, f64, f64, f64)> = None; // (N, p, ss, ic)
    let mut worse = 0usize;

    for step in 0..config.max_order {
        let n_trials = start_n + step;
        let seed = config.seed.wrapping_add(step as u64 * ORDER_SEED_STRIDE);

        // With zero truncation and a single trial, all mass sits at k=1 and
        // the model is exact for any p; fix p = 1 without optimizing.
        let fitted = if config.zero_truncated && n_trials == 1 {
            Some((1.0, 0.0))
        } else {
            let model = BinomialModel::new(n_trials, config.zero_truncated, config.goal, &hist);
            let settings = FitSettings {
                restarts: config.fit_restarts,
                population_scale: points,
                max_iterations: config.max_iterations,
                max_evaluations: config.max_evaluations,
                seed,
            };
            fit_model(&model, &settings, sink).map(|out| (out.params[0], out.sum_of_squares))
        };

        // A fit that fails outright ends the search; the best order seen so
        // far stands.
        let Some((p, ss)) = fitted else {
            sink.debug(format_args!("no converged fit for N = {n_trials}"));
            break;
        };

        let ic = information_criterion(ss, points, 1);
        orders.push(OrderDiagnostic {
            order: n_trials,
            sum_of_squares: ss,
            ic,
        });
        sink.info(format_args!(
            "N = {n_trials}: p = {p:.4}, ss = {ss:.6e}, ic = {ic:.3}"
        ));

        if best.as_ref().is_none_or(|b| ic < b.3) {
            best = Some((n_trials, p, ss, ic));
            worse = 0;
        } else {
            worse += 1;
            if worse >= config.worse_streak {
                break;
            }
        }

        // A perfect fit cannot be improved by a larger trial count.
        if ss == 0.0 {
            break;
        }
    }

    Ok(best.map(|(n_trials, p, sum_of_squares, ic)| BinomialFit {
        n_trials,
        p,
        sum_of_squares,
        ic,
        orders,
    }))
}

/// Fit an exponential mixture to raw jump distances, silently.
pub fn fit_jump_distances(
    values: &[f64],
    config: &JumpFitConfig,
) -> Result<Option<JumpFit>, AppError> {
    fit_jump_distances_with(values, config, &mut NullSink, &mut NullSampler)
}

/// Fit an exponential mixture to raw jump distances, reporting progress and
/// sampling the best curves.
///
/// Returns `Ok(None)` when even the single-population fit fails.
pub fn fit_jump_distances_with(
    values: &[f64],
    config: &JumpFitConfig,
    sink: &mut dyn FitSink,
    sampler: &mut dyn CurveSampler,
) -> Result<Option<JumpFit>, AppError> {
    let hist = build_cumulative_steps(values)?;
    let points = hist.len();

    let mut orders: Vec<OrderDiagnostic> = Vec::new();
    let mut rejected: Vec<(usize, String)> = Vec::new();

    let fit_order = |order: usize, sink: &mut dyn FitSink| -> Option<FitCandidate> {
        let model = JumpModel::new(order, &hist);
        let settings = FitSettings {
            restarts: config.fit_restarts,
            population_scale: if order == 1 { points } else { model.dim() },
            max_iterations: config.max_iterations,
            max_evaluations: config.max_evaluations,
            seed: config
                .seed
                .wrapping_add(order as u64 * ORDER_SEED_STRIDE),
        };
        let outcome = fit_model(&model, &settings, sink)?;
        let pairs = JumpModel::components(order, &outcome.params);
        let coefficients: Vec<f64> = pairs.iter().map(|(c, _)| *c).collect();
        let fractions: Vec<f64> = pairs.iter().map(|(_, f)| *f).collect();
        let free_params = if order == 1 { 1 } else { 2 * order - 1 };
        let ic = mixture_likelihood_criterion(values, &coefficients, &fractions, free_params);
        Some(FitCandidate {
            order,
            params: outcome.params,
            sum_of_squares: outcome.sum_of_squares,
            ic,
            coefficients,
            fractions,
        })
    };

    let Some(single) = fit_order(1, sink) else {
        sink.info(format_args!("single-population fit did not converge"));
        return Ok(None);
    };
    sink.info(format_args!(
        "order 1: coefficient = {:.4e}, ss = {:.6e}, ic = {:.3}",
        single.coefficients[0], single.sum_of_squares, single.ic
    ));
    orders.push(OrderDiagnostic {
        order: 1,
        sum_of_squares: single.sum_of_squares,
        ic: single.ic,
    });

    let mut best = single.clone();
    for order in 2..=config.max_order {
        let Some(candidate) = fit_order(order, sink) else {
            rejected.push((order, "optimizer did not converge".to_string()));
            break;
        };

        if let Err(reason) = validate_mixture(&candidate, config) {
            sink.info(format_args!("order {order} rejected: {reason}"));
            rejected.push((order, reason));
            break;
        }

        orders.push(OrderDiagnostic {
            order,
            sum_of_squares: candidate.sum_of_squares,
            ic: candidate.ic,
        });
        sink.info(format_args!(
            "order {order}: ss = {:.6e}, ic = {:.3}",
            candidate.sum_of_squares, candidate.ic
        ));

        // Greedy stop: the first non-improving order ends the scan.
        if candidate.ic < best.ic {
            best = candidate;
        } else {
            break;
        }
    }

    sample_curves(&hist.x, &single, &best, sampler);

    Ok(Some(JumpFit {
        order: best.order,
        coefficients: best.coefficients,
        fractions: best.fractions,
        sum_of_squares: best.sum_of_squares,
        ic: best.ic,
        orders,
        rejected,
    }))
}

/// Validity gates for mixture candidates.
///
/// Every normalized fraction must reach `min_fraction`, and each adjacent
/// pair of sorted coefficients must be separated by at least the
/// `min_difference` ratio; closer components are not identifiable.
fn validate_mixture(candidate: &FitCandidate, config: &JumpFitConfig) -> Result<(), String> {
    for &fraction in &candidate.fractions {
        if fraction < config.min_fraction {
            return Err(format!(
                "fraction {fraction:.4} below minimum {:.4}",
                config.min_fraction
            ));
        }
    }
    for pair in candidate.coefficients.windows(2) {
        let ratio = pair[0] / pair[1].max(f64::MIN_POSITIVE);
        if ratio < config.min_difference {
            return Err(format!(
                "coefficients {:.4e} and {:.4e} differ by factor {ratio:.2}, \
                 below minimum {:.2}",
                pair[0], pair[1], config.min_difference
            ));
        }
    }
    Ok(())
}

/// Sample the winning curves over the data range for plotting.
fn sample_curves(
    data_x: &[f64],
    single: &FitCandidate,
    best: &FitCandidate,
    sampler: &mut dyn CurveSampler,
) {
    let count = sampler.sample_count().max(2);
    let max_x = data_x.last().copied().unwrap_or(1.0);
    let xs: Vec<f64> = (0..count)
        .map(|i| max_x * i as f64 / (count - 1) as f64)
        .collect();

    let d = single.coefficients[0].max(f64::MIN_POSITIVE);
    let ys: Vec<f64> = xs.iter().map(|&x| 1.0 - (-x / (4.0 * d)).exp()).collect();
    sampler.single_population(&xs, &ys, single.coefficients[0]);

    if best.order >= 2 {
        let ys: Vec<f64> = xs
            .iter()
            .map(|&x| {
                let sum: f64 = best
                    .coefficients
                    .iter()
                    .zip(best.fractions.iter())
                    .map(|(&c, &f)| f * (-x / (4.0 * c.max(f64::MIN_POSITIVE))).exp())
                    .sum();
                1.0 - sum
            })
            .collect();
        sampler.mixed_population(&xs, &ys, &best.coefficients, &best.fractions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::Binomial;

    #[test]
    fn criterion_penalizes_extra_parameters_at_equal_fit() {
        let one = information_criterion(0.01, 50, 1);
        let three = information_criterion(0.01, 50, 3);
        assert!(three > one);
    }

    #[test]
    fn criterion_handles_perfect_fit() {
        let ic = information_criterion(0.0, 20, 1);
        assert!(ic.is_finite());
    }

    #[test]
    fn likelihood_criterion_penalizes_extra_parameters_at_equal_fit() {
        let values = [0.1, 0.5, 1.0];
        let one = mixture_likelihood_criterion(&values, &[0.5], &[1.0], 1);
        let three = mixture_likelihood_criterion(&values, &[0.5], &[1.0], 3);
        // Same likelihood, two more parameters: exactly 2 ln 3 apart.
        assert!((three - one - 2.0 * 3.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn likelihood_criterion_prefers_true_order() {
        let mut rng = StdRng::seed_from_u64(21);
        let values: Vec<f64> = (0..2000)
            .map(|_| {
                let u: f64 = rng.r#gen();
                -4.0 * 0.5 * (1.0 - u).ln()
            })
            .collect();

        // A split of the true component into two nearby ones fits the
        // density no better, so the parameter penalty must dominate.
        let one = mixture_likelihood_criterion(&values, &[0.5], &[1.0], 1);
        let two = mixture_likelihood_criterion(&values, &[0.55, 0.45], &[0.5, 0.5], 3);
        assert!(one < two, "one = {one}, two = {two}");
    }

    #[test]
    fn recovers_binomial_parameters_from_draws() {
        let mut rng = StdRng::seed_from_u64(1234);
        let dist = Binomial::new(4, 0.3).unwrap();
        let values: Vec<f64> = (0..5000).map(|_| rng.sample(dist) as f64).collect();

        let fit = fit_cluster_sizes(&values, &ClusterFitConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(fit.n_trials, 4);
        assert!((fit.p - 0.3).abs() < 0.02, "p = {}", fit.p);
        assert!(!fit.orders.is_empty());
    }

    #[test]
    fn all_zero_cluster_sizes_yield_no_fit() {
        let fit = fit_cluster_sizes(&[0.0; 8], &ClusterFitConfig::default()).unwrap();
        assert!(fit.is_none());
    }

    #[test]
    fn single_trial_zero_truncated_is_exact_without_optimizing() {
        let config = ClusterFitConfig {
            zero_truncated: true,
            ..ClusterFitConfig::default()
        };
        let fit = fit_cluster_sizes(&[1.0; 10], &config).unwrap().unwrap();
        assert_eq!(fit.n_trials, 1);
        assert_eq!(fit.p, 1.0);
        assert_eq!(fit.sum_of_squares, 0.0);
        // A perfect fit ends the scan immediately.
        assert_eq!(fit.orders.len(), 1);
    }

    #[derive(Default)]
    struct RecordingSink {
        info: Vec<String>,
        debug: Vec<String>,
    }

    impl FitSink for RecordingSink {
        fn info(&mut self, args: std::fmt::Arguments<'_>) {
            self.info.push(args.to_string());
        }
        fn debug(&mut self, args: std::fmt::Arguments<'_>) {
            self.debug.push(args.to_string());
        }
    }

    #[test]
    fn failed_binomial_fit_ends_the_scan() {
        // An evaluation budget smaller than one population makes every
        // optimizer launch fail, so the very first trial count produces no
        // candidate. The search must stop there, not keep scanning N.
        let config = ClusterFitConfig {
            max_evaluations: 3,
            ..ClusterFitConfig::default()
        };
        let mut sink = RecordingSink::default();
        let fit = fit_cluster_sizes_with(&[1.0, 2.0, 2.0, 3.0], &config, &mut sink).unwrap();

        assert!(fit.is_none());
        let failures: Vec<&String> = sink
            .debug
            .iter()
            .filter(|m| m.contains("no converged fit"))
            .collect();
        assert_eq!(failures.len(), 1, "failures: {failures:?}");
        assert!(failures[0].contains("N = 3"));
    }

    fn synthetic_jumps(seed: u64, count: usize) -> Vec<f64> {
        // Two populations: D = 1.0 with weight 0.4, D = 0.1 with weight 0.6.
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let d = if rng.r#gen::<f64>() < 0.4 { 1.0 } else { 0.1 };
                let u: f64 = rng.r#gen();
                -4.0 * d * (1.0 - u).ln()
            })
            .collect()
    }

    #[test]
    fn identifies_two_population_mixture() {
        let values = synthetic_jumps(77, 1500);
        let config = JumpFitConfig {
            fit_restarts: 1,
            max_evaluations: 10_000,
            ..JumpFitConfig::default()
        };
        let fit = fit_jump_distances(&values, &config).unwrap().unwrap();

        assert_eq!(fit.order, 2, "orders: {:?}", fit.orders);
        assert!(
            (fit.coefficients[0] - 1.0).abs() < 0.15,
            "coefficients: {:?}",
            fit.coefficients
        );
        assert!(
            (fit.coefficients[1] - 0.1).abs() < 0.015,
            "coefficients: {:?}",
            fit.coefficients
        );
        // 15% relative error on the 0.4 fraction.
        assert!(
            (fit.fractions[0] - 0.4).abs() < 0.06,
            "fractions: {:?}",
            fit.fractions
        );
        assert!((fit.fractions.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(fit.coefficients[0] > fit.coefficients[1]);
    }

    #[test]
    fn single_population_data_stays_at_order_one() {
        let mut rng = StdRng::seed_from_u64(55);
        let values: Vec<f64> = (0..1200)
            .map(|_| {
                let u: f64 = rng.r#gen();
                -4.0 * 0.5 * (1.0 - u).ln()
            })
            .collect();
        let config = JumpFitConfig {
            fit_restarts: 1,
            max_evaluations: 10_000,
            ..JumpFitConfig::default()
        };
        let fit = fit_jump_distances(&values, &config).unwrap().unwrap();

        assert_eq!(fit.order, 1, "orders: {:?}, rejected: {:?}", fit.orders, fit.rejected);
        assert!((fit.coefficients[0] - 0.5).abs() < 0.075);
        assert_eq!(fit.fractions, vec![1.0]);
        // The scan ends at the first non-improving or rejected order; order 3
        // is never attempted.
        assert!(fit.orders.iter().all(|o| o.order <= 2));
        assert!(fit.rejected.iter().all(|r| r.0 <= 2));
    }

    #[test]
    fn greedy_stop_ends_scan_on_criterion_regression() {
        // Single-population data with both validity gates disabled: order 2
        // always passes the gates, so the only way the scan can end at order
        // 1 with an empty rejection list is the criterion comparison itself.
        let mut rng = StdRng::seed_from_u64(13);
        let values: Vec<f64> = (0..1200)
            .map(|_| {
                let u: f64 = rng.r#gen();
                -4.0 * 0.5 * (1.0 - u).ln()
            })
            .collect();
        let config = JumpFitConfig {
            fit_restarts: 1,
            max_evaluations: 10_000,
            min_fraction: 0.0,
            min_difference: 1.0,
            ..JumpFitConfig::default()
        };
        let fit = fit_jump_distances(&values, &config).unwrap().unwrap();

        assert_eq!(fit.order, 1, "orders: {:?}", fit.orders);
        assert!(fit.rejected.is_empty(), "rejected: {:?}", fit.rejected);
        // Order 2 was fit and scored, then the regression stopped the scan
        // before order 3 was ever attempted.
        assert!(fit.orders.iter().any(|o| o.order == 2), "orders: {:?}", fit.orders);
        assert!(fit.orders.iter().all(|o| o.order <= 2), "orders: {:?}", fit.orders);
        let ic_of = |order: usize| {
            fit.orders
                .iter()
                .find(|o| o.order == order)
                .map(|o| o.ic)
                .unwrap()
        };
        assert!(ic_of(2) >= ic_of(1));
    }

    #[test]
    fn sampler_receives_winning_curves() {
        #[derive(Default)]
        struct Capture {
            single: Option<f64>,
            mixed: Option<(Vec<f64>, Vec<f64>)>,
        }
        impl CurveSampler for Capture {
            fn sample_count(&self) -> usize {
                50
            }
            fn single_population(&mut self, x: &[f64], y: &[f64], coefficient: f64) {
                assert_eq!(x.len(), 50);
                assert_eq!(y.len(), 50);
                self.single = Some(coefficient);
            }
            fn mixed_population(
                &mut self,
                x: &[f64],
                _y: &[f64],
                coefficients: &[f64],
                fractions: &[f64],
            ) {
                assert_eq!(x.len(), 50);
                self.mixed = Some((coefficients.to_vec(), fractions.to_vec()));
            }
        }

        let values = synthetic_jumps(99, 1500);
        let config = JumpFitConfig {
            fit_restarts: 1,
            max_evaluations: 10_000,
            ..JumpFitConfig::default()
        };
        let mut sampler = Capture::default();
        let fit = fit_jump_distances_with(&values, &config, &mut NullSink, &mut sampler)
            .unwrap()
            .unwrap();

        assert!(sampler.single.is_some());
        if fit.order >= 2 {
            let (coefficients, _) = sampler.mixed.unwrap();
            assert_eq!(coefficients, fit.coefficients);
        }
    }
}
