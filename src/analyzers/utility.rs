/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Returns a sorted copy of the finite values in `values`.
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear-interpolated quantile of an already sorted slice. Returns 0.0 for
/// empty input.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Minimum, maximum and middle element (`sorted[n / 2]`) of a sorted slice.
/// Returns zeros for empty input.
pub fn bounds(sorted: &[f64]) -> (f64, f64, f64) {
    match (sorted.first(), sorted.last()) {
        (Some(min), Some(max)) => (*min, *max, sorted[sorted.len() / 2]),
        _ => (0.0, 0.0, 0.0),
    }
}
