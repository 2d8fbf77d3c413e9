//! Time-domain HRV metrics

/// Successive differences above this count towards pNN50 (ms)
const NN50_THRESHOLD_MS: f64 = 50.0;

/// Mean interval, 0 for an empty slice
pub fn mean_rr(intervals: &[f64]) -> f64 {
    if intervals.is_empty() {
        return 0.0;
    }
    intervals.iter().sum::<f64>() / intervals.len() as f64
}

/// Root mean square of successive differences.
///
/// Order sensitive: shuffling the intervals changes the result.
pub fn rmssd(intervals: &[f64]) -> f64 {
    if intervals.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = intervals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    (sum_sq / (intervals.len() - 1) as f64).sqrt()
}

/// Sample standard deviation (N-1) of the intervals
pub fn sdnn(intervals: &[f64]) -> f64 {
    if intervals.len() < 2 {
        return 0.0;
    }
    let mean = mean_rr(intervals);
    let variance = intervals.iter().map(|rr| (rr - mean).powi(2)).sum::<f64>()
        / (intervals.len() - 1) as f64;
    variance.sqrt()
}

/// Fraction (0-1) of successive differences exceeding 50 ms
pub fn pnn50(intervals: &[f64]) -> f64 {
    if intervals.len() < 2 {
        return 0.0;
    }
    let over = intervals
        .windows(2)
        .filter(|w| (w[1] - w[0]).abs() > NN50_THRESHOLD_MS)
        .count();
    over as f64 / (intervals.len() - 1) as f64
}
