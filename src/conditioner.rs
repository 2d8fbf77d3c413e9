//! Interval conditioning
//!
//! Cleans a raw slice of beat intervals before metric computation:
//! - Physiological bounds rejection
//! - Optional ectopic-beat correction against the local median
//! - Quality scoring from the retained and corrected fractions

use crate::config::ConditionerConfig;
use crate::types::CleanIntervalWindow;

/// Default minimum number of clean intervals per 5.5-minute window
pub const DEFAULT_MIN_INTERVALS: usize = 30;

/// Neighbours considered on each side when judging a beat ectopic
const ECTOPIC_NEIGHBOURS: usize = 2;

/// Interval conditioner
#[derive(Debug, Clone)]
pub struct IntervalConditioner {
    config: ConditionerConfig,
    min_intervals: usize,
}

impl Default for IntervalConditioner {
    fn default() -> Self {
        Self::new(ConditionerConfig::default(), DEFAULT_MIN_INTERVALS)
    }
}

impl IntervalConditioner {
    pub fn new(config: ConditionerConfig, min_intervals: usize) -> Self {
        Self {
            config,
            min_intervals,
        }
    }

    /// Clean a raw interval slice.
    ///
    /// The result is deterministic for a given input. When too few intervals
    /// survive, `is_valid` is false and callers must skip metric computation.
    pub fn condition(&self, raw: &[f64]) -> CleanIntervalWindow {
        if raw.is_empty() {
            return CleanIntervalWindow {
                clean_intervals: Vec::new(),
                quality_score: 0.0,
                is_valid: false,
                removed_count: 0,
                interpolated_count: 0,
            };
        }

        let bounds = self.config.min_interval_ms..=self.config.max_interval_ms;
        let in_range: Vec<f64> = raw
            .iter()
            .copied()
            .filter(|rr| rr.is_finite() && bounds.contains(rr))
            .collect();
        let removed_count = raw.len() - in_range.len();

        let (clean_intervals, interpolated_count) = if self.config.ectopic_correction {
            correct_ectopic(&in_range, self.config.ectopic_tolerance)
        } else {
            (in_range, 0)
        };

        let retained_fraction = clean_intervals.len() as f64 / raw.len() as f64;
        let interpolated_fraction = if clean_intervals.is_empty() {
            0.0
        } else {
            interpolated_count as f64 / clean_intervals.len() as f64
        };
        let quality_score =
            (retained_fraction * (1.0 - 0.5 * interpolated_fraction)).clamp(0.0, 1.0);

        let is_valid = clean_intervals.len() >= self.min_intervals;
        if !is_valid {
            log::debug!(
                "window invalid: {} clean intervals, {} required",
                clean_intervals.len(),
                self.min_intervals
            );
        }

        CleanIntervalWindow {
            clean_intervals,
            quality_score,
            is_valid,
            removed_count,
            interpolated_count,
        }
    }
}

/// Replace beats that deviate from their neighbourhood median by more than
/// `tolerance` (relative) with that median. Judged against the original
/// sequence so a correction never influences the next decision.
fn correct_ectopic(intervals: &[f64], tolerance: f64) -> (Vec<f64>, usize) {
    if intervals.len() < 3 {
        return (intervals.to_vec(), 0);
    }

    let mut corrected = Vec::with_capacity(intervals.len());
    let mut replaced = 0;

    for (idx, &rr) in intervals.iter().enumerate() {
        let start = idx.saturating_sub(ECTOPIC_NEIGHBOURS);
        let end = (idx + ECTOPIC_NEIGHBOURS + 1).min(intervals.len());
        let mut neighbours: Vec<f64> = (start..end)
            .filter(|&i| i != idx)
            .map(|i| intervals[i])
            .collect();
        let reference = median(&mut neighbours);

        if reference > 0.0 && ((rr - reference).abs() / reference) > tolerance {
            corrected.push(reference);
            replaced += 1;
        } else {
            corrected.push(rr);
        }
    }

    (corrected, replaced)
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conditioner(min: usize, ectopic: bool) -> IntervalConditioner {
        IntervalConditioner::new(
            ConditionerConfig {
                ectopic_correction: ectopic,
                ..Default::default()
            },
            min,
        )
    }

    #[test]
    fn test_in_range_intervals_are_all_clean() {
        let raw: Vec<f64> = (0..40).map(|i| 200.0 + (i as f64) * 57.5).collect();
        let window = conditioner(30, false).condition(&raw);
        assert_eq!(window.clean_intervals, raw);
        assert_eq!(window.quality_score, 1.0);
        assert!(window.is_valid);
        assert_eq!(window.removed_count, 0);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let raw = [200.0, 2500.0, 199.9, 2500.1];
        let window = conditioner(1, false).condition(&raw);
        assert_eq!(window.clean_intervals, vec![200.0, 2500.0]);
        assert_eq!(window.removed_count, 2);
        assert!((window.quality_score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_survivors_invalid() {
        let raw = vec![800.0; 10];
        let window = conditioner(30, false).condition(&raw);
        assert!(!window.is_valid);
        assert_eq!(window.clean_intervals.len(), 10);
    }

    #[test]
    fn test_empty_window() {
        let window = conditioner(30, false).condition(&[]);
        assert!(!window.is_valid);
        assert_eq!(window.quality_score, 0.0);
    }

    #[test]
    fn test_ectopic_beat_replaced_by_local_median() {
        let raw = [800.0, 810.0, 805.0, 1300.0, 795.0, 800.0, 810.0];
        let window = conditioner(5, true).condition(&raw);
        assert_eq!(window.interpolated_count, 1);
        // Neighbours 810, 805, 795, 800 -> median 802.5
        assert!((window.clean_intervals[3] - 802.5).abs() < 1e-9);
        assert!(window.quality_score < 1.0);
    }

    #[test]
    fn test_conditioning_is_deterministic() {
        let raw = [800.0, 1700.0, 790.0, 150.0, 805.0, 812.0, 400.0, 798.0];
        let c = conditioner(3, true);
        assert_eq!(c.condition(&raw), c.condition(&raw));
    }
}
