//! Progress reporting hooks.
//!
//! The fitting loops report progress through an injected sink instead of
//! writing anywhere themselves. Library callers get the silent default;
//! the CLI wires in a stderr sink behind `--verbose`, and embedders who
//! already run `tracing` can use `TracingSink`.

use std::fmt;

/// Receives progress messages from the fitting loops.
pub trait FitSink {
    /// High-level milestones (order accepted, fit finished).
    fn info(&mut self, args: fmt::Arguments<'_>);

    /// Per-attempt detail (restart outcomes, rejection reasons).
    fn debug(&mut self, args: fmt::Arguments<'_>);
}

/// Discards everything. The library default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FitSink for NullSink {
    fn info(&mut self, _args: fmt::Arguments<'_>) {}
    fn debug(&mut self, _args: fmt::Arguments<'_>) {}
}

/// Forwards to the `tracing` ecosystem at matching levels.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FitSink for TracingSink {
    fn info(&mut self, args: fmt::Arguments<'_>) {
        tracing::info!("{args}");
    }

    fn debug(&mut self, args: fmt::Arguments<'_>) {
        tracing::debug!("{args}");
    }
}

/// Writes every message to stderr. Used by the CLI's `--verbose` flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink {
    /// When false, only `info` messages are printed.
    pub debug: bool,
}

impl FitSink for StderrSink {
    fn info(&mut self, args: fmt::Arguments<'_>) {
        eprintln!("{args}");
    }

    fn debug(&mut self, args: fmt::Arguments<'_>) {
        if self.debug {
            eprintln!("{args}");
        }
    }
}

/// Receives sampled model curves for plotting or export.
///
/// The jump-distance selector samples the best single-population curve and,
/// when a mixture wins, the best mixed curve over the data range. The default
/// implementation ignores both.
pub trait CurveSampler {
    /// Number of points sampled over the data range.
    fn sample_count(&self) -> usize {
        200
    }

    /// Best single-population curve: `y = 1 - exp(-x / (4 * coefficient))`.
    fn single_population(&mut self, _x: &[f64], _y: &[f64], _coefficient: f64) {}

    /// Best mixture curve with its sorted coefficients and fractions.
    fn mixed_population(&mut self, _x: &[f64], _y: &[f64], _coefficients: &[f64], _fractions: &[f64]) {
    }
}

/// Sampler that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSampler;

impl CurveSampler for NullSampler {}
