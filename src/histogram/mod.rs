//! Histogram construction from raw observations.
//!
//! Two shapes are produced:
//!
//! - a dense, integer-indexed histogram for discrete cluster sizes
//!   (zero-padded between 0 and the largest observed count)
//! - a cumulative step histogram over the distinct sorted values for
//!   continuous jump distances
//!
//! Both are normalized: non-cumulative y-values sum to 1; cumulative
//! y-values are monotone non-decreasing and end at 1. Converting a
//! cumulative histogram back is a loss-free first difference.

use crate::error::AppError;

/// An ordered `(x, y)` sequence, normalized, optionally cumulative.
///
/// Immutable after construction except for the one permitted in-place
/// renormalization in [`Histogram::zero_truncate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub cumulative: bool,
}

impl Histogram {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// First-difference a cumulative histogram back to probability mass.
    ///
    /// `non_cumulative[0] = cumulative[0]`,
    /// `non_cumulative[i] = cumulative[i] - cumulative[i-1]`.
    pub fn to_non_cumulative(&self) -> Histogram {
        if !self.cumulative {
            return self.clone();
        }
        let mut y = Vec::with_capacity(self.y.len());
        let mut prev = 0.0;
        for &v in &self.y {
            y.push(v - prev);
            prev = v;
        }
        Histogram {
            x: self.x.clone(),
            y,
            cumulative: false,
        }
    }

    /// Accumulate a probability-mass histogram.
    pub fn to_cumulative(&self) -> Histogram {
        if self.cumulative {
            return self.clone();
        }
        let mut y = Vec::with_capacity(self.y.len());
        let mut acc = 0.0;
        for &v in &self.y {
            acc += v;
            y.push(acc);
        }
        Histogram {
            x: self.x.clone(),
            y,
            cumulative: true,
        }
    }

    /// Drop the x=0 bucket and renormalize the remaining mass to 1.
    ///
    /// Used when the model cannot observe empty clusters. Fails with a
    /// degenerate-input error if nothing remains after removing the zero
    /// bucket. Only meaningful on a non-cumulative histogram whose first
    /// bucket is x=0.
    pub fn zero_truncate(&mut self) -> Result<(), AppError> {
        if self.cumulative {
            return Err(AppError::new(
                3,
                "Zero truncation applies to non-cumulative histograms.",
            ));
        }
        if self.y.is_empty() || self.x[0] != 0.0 {
            return Ok(());
        }
        self.y[0] = 0.0;
        let remaining: f64 = self.y.iter().sum();
        if remaining <= 0.0 {
            return Err(AppError::new(
                3,
                "Zero-truncated histogram has no mass above zero.",
            ));
        }
        for v in self.y.iter_mut() {
            *v /= remaining;
        }
        Ok(())
    }
}

/// Build a dense histogram of non-negative integer counts.
///
/// The histogram is indexed 0..=max(value) with zero-padding for counts
/// that never occur. Fails if any value is negative, non-finite, or not an
/// integer.
pub fn build_counts(values: &[f64], cumulative: bool) -> Result<Histogram, AppError> {
    if values.is_empty() {
        return Err(AppError::new(3, "No observations to build a histogram from."));
    }

    let mut max = 0usize;
    for &v in values {
        if !v.is_finite() || v < 0.0 {
            return Err(AppError::new(
                3,
                format!("Invalid count {v}: counts must be finite and non-negative."),
            ));
        }
        if v.fract() != 0.0 {
            return Err(AppError::new(
                3,
                format!("Invalid count {v}: counts must be integers."),
            ));
        }
        max = max.max(v as usize);
    }

    let mut mass = vec![0.0; max + 1];
    for &v in values {
        mass[v as usize] += 1.0;
    }
    let total = values.len() as f64;
    for m in mass.iter_mut() {
        *m /= total;
    }

    let hist = Histogram {
        x: (0..=max).map(|i| i as f64).collect(),
        y: mass,
        cumulative: false,
    };
    Ok(if cumulative { hist.to_cumulative() } else { hist })
}

/// Build a cumulative step histogram over distinct sorted jump distances.
///
/// `y[i]` is the fraction of observations at or below `x[i]`; the last value
/// is exactly 1. Fails if any value is negative or non-finite.
pub fn build_cumulative_steps(values: &[f64]) -> Result<Histogram, AppError> {
    if values.is_empty() {
        return Err(AppError::new(3, "No observations to build a histogram from."));
    }

    let mut sorted = Vec::with_capacity(values.len());
    for &v in values {
        if !v.is_finite() || v < 0.0 {
            return Err(AppError::new(
                3,
                format!("Invalid jump distance {v}: must be finite and non-negative."),
            ));
        }
        sorted.push(v);
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let total = sorted.len() as f64;
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut seen = 0usize;
    let mut i = 0usize;
    while i < sorted.len() {
        let v = sorted[i];
        let mut j = i;
        while j < sorted.len() && sorted[j] == v {
            j += 1;
        }
        seen += j - i;
        x.push(v);
        y.push(seen as f64 / total);
        i = j;
    }

    Ok(Histogram {
        x,
        y,
        cumulative: true,
    })
}
