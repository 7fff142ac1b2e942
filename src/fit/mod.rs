//! Model fitting and model-order selection.
//!
//! `driver` runs the two-stage fit (global CMA-ES search polished by
//! Levenberg-Marquardt) for a single model; `selection` wraps it in the
//! order-scanning loops that pick the number of binomial trials and the
//! number of mixture components.

pub mod driver;
pub mod selection;

pub use driver::{FitOutcome, FitSettings, fit_model};
pub use selection::{
    fit_cluster_sizes, fit_cluster_sizes_with, fit_jump_distances, fit_jump_distances_with,
    information_criterion, mixture_likelihood_criterion,
};
