//! Colour-scale statistics: outlier filtering, min/max/median and clamping.

use serde::Serialize;

use crate::analyzers::utility::{quantile, sorted_finite};

/// Values further than this many IQRs outside the quartiles are outliers.
pub const OUTLIER_IQR_MULTIPLIER: f64 = 1.5;

/// Domain of a three-stop colour scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ColorStats {
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl ColorStats {
    /// Clamps `value` into this domain.
    pub fn rank(&self, value: f64) -> f64 {
        rank_clamp(value, self.min, self.max)
    }
}

/// Keeps the finite values that fall inside the Tukey fences.
pub fn filter_outliers(values: &[f64]) -> Vec<f64> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return sorted;
    }
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let low = q1 - OUTLIER_IQR_MULTIPLIER * iqr;
    let high = q3 + OUTLIER_IQR_MULTIPLIER * iqr;
    sorted.into_iter().filter(|v| *v >= low && *v <= high).collect()
}

/// Min and max over the outlier-filtered values; median over all of them.
///
/// The median is taken at index `round(n / 2)` of the unfiltered sorted
/// sequence and falls back to 0 when that index is past the end.
pub fn compute_stats(values: &[f64]) -> ColorStats {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return ColorStats::default();
    }

    let median_index = (sorted.len() as f64 / 2.0).round() as usize;
    let median = sorted.get(median_index).copied().unwrap_or(0.0);

    let filtered = filter_outliers(&sorted);
    let min = filtered.first().copied().unwrap_or(0.0);
    let max = filtered.last().copied().unwrap_or(0.0);

    ColorStats { min, max, median }
}

/// Clamps `value` into `[min, max]`; swapped bounds are reordered first.
pub fn rank_clamp(value: f64, min: f64, max: f64) -> f64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if value.is_nan() || value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}
