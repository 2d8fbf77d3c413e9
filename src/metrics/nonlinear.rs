//! Non-linear HRV metrics

use super::least_squares;

/// Smallest box size (beats) for short-term DFA
const ALPHA1_MIN_BOX: usize = 4;
/// Largest box size (beats) for short-term DFA
const ALPHA1_MAX_BOX: usize = 16;

/// Short-term detrended fluctuation analysis exponent (α1).
///
/// Returns `None` with fewer than `min_intervals` intervals or when a
/// fluctuation vanishes (perfectly regular series).
pub fn dfa_alpha1(intervals: &[f64], min_intervals: usize) -> Option<f64> {
    let n = intervals.len();
    if n < min_intervals.max(2 * ALPHA1_MAX_BOX) {
        return None;
    }

    let mean = intervals.iter().sum::<f64>() / n as f64;
    let mut profile = Vec::with_capacity(n);
    let mut cumsum = 0.0;
    for rr in intervals {
        cumsum += rr - mean;
        profile.push(cumsum);
    }

    let mut log_sizes = Vec::new();
    let mut log_fluct = Vec::new();
    for box_size in ALPHA1_MIN_BOX..=ALPHA1_MAX_BOX {
        let fluctuation = fluctuation(&profile, box_size)?;
        if fluctuation <= 0.0 {
            return None;
        }
        log_sizes.push((box_size as f64).ln());
        log_fluct.push(fluctuation.ln());
    }

    least_squares(&log_sizes, &log_fluct).map(|(slope, _)| slope)
}

/// RMS of the residuals after linear detrending within non-overlapping boxes
fn fluctuation(profile: &[f64], box_size: usize) -> Option<f64> {
    let num_boxes = profile.len() / box_size;
    if num_boxes == 0 {
        return None;
    }

    let x: Vec<f64> = (0..box_size).map(|j| j as f64).collect();
    let mut sum_sq = 0.0;
    for b in 0..num_boxes {
        let segment = &profile[b * box_size..(b + 1) * box_size];
        let (slope, intercept) = least_squares(&x, segment)?;
        sum_sq += segment
            .iter()
            .enumerate()
            .map(|(j, y)| (y - (slope * j as f64 + intercept)).powi(2))
            .sum::<f64>();
    }

    Some((sum_sq / (num_boxes * box_size) as f64).sqrt())
}
