//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - reads raw observations
//! - runs fitting + model-order selection
//! - prints the report
//! - writes optional exports

use clap::Parser;
use serde::Serialize;

use crate::cli::{Cli, ClusterArgs, Command, JumpArgs};
use crate::domain::{ClusterFitConfig, JumpFitConfig};
use crate::error::AppError;
use crate::fit::{fit_cluster_sizes_with, fit_jump_distances_with};
use crate::logging::{CurveSampler, FitSink, NullSink, StderrSink};

/// Entry point for the `popfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Clusters(args) => handle_clusters(args),
        Command::Jumps(args) => handle_jumps(args),
    }
}

fn handle_clusters(args: ClusterArgs) -> Result<(), AppError> {
    if args.max_order == 0 {
        return Err(AppError::new(2, "--max-order must be at least 1."));
    }
    let values = crate::io::read_values(&args.input)?;
    let config = ClusterFitConfig {
        zero_truncated: args.zero_truncated,
        max_order: args.max_order,
        fit_restarts: args.restarts,
        worse_streak: args.worse_streak,
        goal: args.goal,
        max_iterations: args.max_iterations,
        max_evaluations: args.max_evaluations,
        seed: args.seed,
    };

    let mut stderr = StderrSink { debug: args.debug };
    let mut null = NullSink;
    let sink: &mut dyn FitSink = if args.verbose || args.debug {
        &mut stderr
    } else {
        &mut null
    };

    let Some(fit) = fit_cluster_sizes_with(&values, &config, sink)? else {
        println!("No binomial fit: all observed cluster sizes are zero or no order converged.");
        return Ok(());
    };

    println!("{}", crate::report::format_cluster_fit(&fit, values.len()));

    if let Some(path) = &args.export {
        crate::io::write_json(path, &fit)?;
    }
    Ok(())
}

fn handle_jumps(args: JumpArgs) -> Result<(), AppError> {
    if args.max_order == 0 {
        return Err(AppError::new(2, "--max-order must be at least 1."));
    }
    if !(0.0..1.0).contains(&args.min_fraction) {
        return Err(AppError::new(2, "--min-fraction must be in [0, 1)."));
    }
    if args.min_difference < 1.0 {
        return Err(AppError::new(2, "--min-difference must be at least 1."));
    }
    let values = crate::io::read_values(&args.input)?;
    let config = JumpFitConfig {
        max_order: args.max_order,
        fit_restarts: args.restarts,
        min_fraction: args.min_fraction,
        min_difference: args.min_difference,
        max_iterations: args.max_iterations,
        max_evaluations: args.max_evaluations,
        seed: args.seed,
    };

    let mut stderr = StderrSink { debug: args.debug };
    let mut null = NullSink;
    let sink: &mut dyn FitSink = if args.verbose || args.debug {
        &mut stderr
    } else {
        &mut null
    };

    let mut curves = SampledCurves::default();
    let Some(fit) = fit_jump_distances_with(&values, &config, sink, &mut curves)? else {
        println!("No mixture fit: the single-population fit did not converge.");
        return Ok(());
    };

    println!("{}", crate::report::format_jump_fit(&fit, values.len()));

    if let Some(path) = &args.export {
        crate::io::write_json(path, &fit)?;
    }
    if let Some(path) = &args.export_curves {
        crate::io::write_json(path, &curves)?;
    }
    Ok(())
}

/// One sampled model curve over the data range.
#[derive(Debug, Clone, Serialize)]
struct SampledCurve {
    x: Vec<f64>,
    y: Vec<f64>,
    coefficients: Vec<f64>,
    fractions: Vec<f64>,
}

/// Curves captured during the jump-distance fit for `--export-curves`.
#[derive(Debug, Default, Serialize)]
struct SampledCurves {
    single: Option<SampledCurve>,
    mixed: Option<SampledCurve>,
}

impl CurveSampler for SampledCurves {
    fn single_population(&mut self, x: &[f64], y: &[f64], coefficient: f64) {
        self.single = Some(SampledCurve {
            x: x.to_vec(),
            y: y.to_vec(),
            coefficients: vec![coefficient],
            fractions: vec![1.0],
        });
    }

    fn mixed_population(&mut self, x: &[f64], y: &[f64], coefficients: &[f64], fractions: &[f64]) {
        self.mixed = Some(SampledCurve {
            x: x.to_vec(),
            y: y.to_vec(),
            coefficients: coefficients.to_vec(),
            fractions: fractions.to_vec(),
        });
    }
}
