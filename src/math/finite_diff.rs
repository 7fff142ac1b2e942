//! Central finite-difference Jacobian.
//!
//! Used as the fallback when a model has no closed-form gradient. The step
//! is relative (`1e-3 * |param|`) with a small floor so parameters near zero
//! still get a usable perturbation.

use nalgebra::DMatrix;

/// Relative perturbation applied to each parameter.
const RELATIVE_STEP: f64 = 1e-3;

/// Floor on the absolute step size.
const MIN_STEP: f64 = 1e-6;

/// Compute `d f_i / d p_j` via central differences.
///
/// `f` must return the same number of values for every parameter vector.
pub fn central_jacobian<F>(params: &[f64], f: F) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let base = f(params);
    let rows = base.len();
    let cols = params.len();
    let mut jac = DMatrix::<f64>::zeros(rows, cols);

    let mut work = params.to_vec();
    for j in 0..cols {
        let h = (params[j].abs() * RELATIVE_STEP).max(MIN_STEP);

        work[j] = params[j] + h;
        let upper = f(&work);
        work[j] = params[j] - h;
        let lower = f(&work);
        work[j] = params[j];

        for i in 0..rows {
            jac[(i, j)] = (upper[i] - lower[i]) / (2.0 * h);
        }
    }

    jac
}
