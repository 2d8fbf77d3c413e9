//! Baseline management
//!
//! Rolling 7- and 30-day baselines over daily summaries, plus the
//! statistics built on them: z-scores, recovery percentages and trend
//! slopes. Every value for a day is computed from the days before it.

use crate::metrics::least_squares;
use crate::types::{DailySummary, PhysiologicalBaseline, ZScoreBand};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default history window in days
pub const DEFAULT_BASELINE_WINDOW: usize = 30;

/// Short baseline window (days)
pub const SHORT_WINDOW_DAYS: usize = 7;

/// Long baseline window (days)
pub const LONG_WINDOW_DAYS: usize = 30;

/// Historical points required before a z-score is reported
pub const MIN_Z_SCORE_HISTORY: usize = 7;

/// Recovery score when no 7-day baseline exists
pub const NEUTRAL_RECOVERY_SCORE: i32 = 100;

/// Sample standard deviation (N-1). Returns 0 for fewer than 2 values.
pub fn standard_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Mean RMSSD of the most recent `days` summaries (by date).
///
/// A shorter history is used as-is; an empty one has no baseline.
pub fn baseline_rmssd(history: &[DailySummary], days: usize) -> Option<f64> {
    let values = recent_rmssd(history, days);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// `(today - mean30d) / stddev30d`, when at least 7 historical points
/// exist and the deviation is non-zero
pub fn z_score(today: f64, history: &[DailySummary]) -> Option<f64> {
    let values = recent_rmssd(history, LONG_WINDOW_DAYS);
    if values.len() < MIN_Z_SCORE_HISTORY {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let sd = standard_deviation(&values);
    if sd <= 0.0 {
        return None;
    }
    Some((today - mean) / sd)
}

/// `round(today / baseline7d * 100)`, neutral 100 without a baseline
pub fn recovery_score(today: f64, baseline_7d: Option<f64>) -> i32 {
    match baseline_7d {
        Some(base) if base > 0.0 => (today / base * 100.0).round() as i32,
        _ => NEUTRAL_RECOVERY_SCORE,
    }
}

/// OLS slope of RMSSD against day index over the most recent `days`.
///
/// Zero with fewer than 2 points or a degenerate regression.
pub fn trend_slope(history: &[DailySummary], days: usize) -> f64 {
    let values = recent_rmssd(history, days);
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    least_squares(&x, &values)
        .map(|(slope, _)| slope)
        .unwrap_or(0.0)
}

impl ZScoreBand {
    /// Half-open bands; exactly 1.0 and -1.0 resolve upward.
    pub fn from_z(z: f64) -> Self {
        if z >= 1.0 {
            ZScoreBand::ElevatedRecovery
        } else if z >= -1.0 {
            ZScoreBand::Normal
        } else if z >= -2.0 {
            ZScoreBand::Stressed
        } else {
            ZScoreBand::OverreachingRisk
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ZScoreBand::ElevatedRecovery => "elevated_recovery",
            ZScoreBand::Normal => "normal",
            ZScoreBand::Stressed => "stressed",
            ZScoreBand::OverreachingRisk => "overreaching_risk",
        }
    }
}

/// RMSSD values of the last `days` summaries in date order
fn recent_rmssd(history: &[DailySummary], days: usize) -> Vec<f64> {
    let mut ordered: Vec<&DailySummary> = history.iter().collect();
    ordered.sort_by_key(|s| s.date);
    let skip = ordered.len().saturating_sub(days);
    ordered[skip..].iter().map(|s| s.rmssd).collect()
}

/// Rolling store of daily summaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineStore {
    /// Date-ordered history, oldest first
    history: VecDeque<DailySummary>,
    /// Maximum number of days kept
    window_size: usize,
}

impl Default for BaselineStore {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_WINDOW)
    }
}

impl BaselineStore {
    /// Create a new store keeping at most `window_size` days
    pub fn new(window_size: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Build a store from previously persisted summaries
    pub fn from_history(history: Vec<DailySummary>, window_size: usize) -> Self {
        let mut store = Self::new(window_size);
        let mut sorted = history;
        sorted.sort_by_key(|s| s.date);
        for summary in sorted {
            store.insert(summary);
        }
        store
    }

    /// Fill the computed fields of `summary` from the days before it, then
    /// add it to the history.
    pub fn contextualize(&mut self, mut summary: DailySummary) -> DailySummary {
        let prior = self.prior_to(summary.date);

        summary.baseline_7d = baseline_rmssd(&prior, SHORT_WINDOW_DAYS);
        summary.baseline_30d = baseline_rmssd(&prior, LONG_WINDOW_DAYS);
        summary.z_score = z_score(summary.rmssd, &prior);
        summary.z_score_band = summary.z_score.map(ZScoreBand::from_z);
        summary.recovery_score = Some(recovery_score(summary.rmssd, summary.baseline_7d));

        log::debug!(
            "contextualized {}: rmssd {:.1}, baseline7d {:?}, z {:?}",
            summary.date,
            summary.rmssd,
            summary.baseline_7d,
            summary.z_score
        );

        self.insert(summary.clone());
        summary
    }

    /// Waking reference for the state machines: RMSSD from the 7-day
    /// baseline, HR as the mean daily HR over the same days.
    pub fn physiological_baseline(&self) -> Option<PhysiologicalBaseline> {
        let skip = self.history.len().saturating_sub(SHORT_WINDOW_DAYS);
        let recent: Vec<&DailySummary> = self.history.iter().skip(skip).collect();
        if recent.is_empty() {
            return None;
        }
        let n = recent.len() as f64;
        let rmssd = recent.iter().map(|s| s.rmssd).sum::<f64>() / n;
        let hr = recent.iter().map(|s| s.mean_hr).sum::<f64>() / n;

        let baseline = PhysiologicalBaseline::new(hr, rmssd);
        baseline.is_usable().then_some(baseline)
    }

    /// 7-day RMSSD trend (ms per day)
    pub fn hrv_trend(&self) -> f64 {
        trend_slope(&self.history(), SHORT_WINDOW_DAYS)
    }

    /// History in date order
    pub fn history(&self) -> Vec<DailySummary> {
        self.history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn prior_to(&self, date: NaiveDate) -> Vec<DailySummary> {
        self.history
            .iter()
            .filter(|s| s.date < date)
            .cloned()
            .collect()
    }

    /// Insert keeping date order; a re-processed day replaces the old row
    fn insert(&mut self, summary: DailySummary) {
        self.history.retain(|s| s.date != summary.date);
        let pos = self
            .history
            .iter()
            .position(|s| s.date > summary.date)
            .unwrap_or(self.history.len());
        self.history.insert(pos, summary);
        while self.history.len() > self.window_size {
            self.history.pop_front();
        }
    }

    /// Load baseline store from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize baseline store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: i64, rmssd: f64) -> DailySummary {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset);
        DailySummary::new(date, rmssd, rmssd * 1.4, 58.0, 50.0, 90.0)
    }

    #[test]
    fn test_standard_deviation_edge_cases() {
        assert_eq!(standard_deviation(&[]), 0.0);
        assert_eq!(standard_deviation(&[42.0]), 0.0);
        assert!((standard_deviation(&[1.0, 2.0, 3.0, 4.0]) - 1.290994448735806).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_uses_available_tail() {
        assert!(baseline_rmssd(&[], 7).is_none());

        let history: Vec<DailySummary> = (0..3).map(|i| day(i, 40.0 + i as f64)).collect();
        assert!((baseline_rmssd(&history, 7).unwrap() - 41.0).abs() < 1e-12);

        let history: Vec<DailySummary> = (0..10).map(|i| day(i, 10.0 * i as f64)).collect();
        // Last 7: 30..=90
        assert!((baseline_rmssd(&history, 7).unwrap() - 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_orders_by_date() {
        let mut history: Vec<DailySummary> = (0..10).map(|i| day(i, 10.0 * i as f64)).collect();
        history.reverse();
        assert!((baseline_rmssd(&history, 7).unwrap() - 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_z_score_requires_history() {
        let short: Vec<DailySummary> = (0..6).map(|i| day(i, 40.0 + i as f64)).collect();
        assert!(z_score(50.0, &short).is_none());

        let flat: Vec<DailySummary> = (0..10).map(|i| day(i, 40.0)).collect();
        assert!(z_score(50.0, &flat).is_none());

        let varied: Vec<DailySummary> = (0..7).map(|i| day(i, 40.0 + i as f64)).collect();
        let z = z_score(43.0, &varied).unwrap();
        assert!(z.abs() < 1e-12);
    }

    #[test]
    fn test_z_score_bands() {
        assert_eq!(ZScoreBand::from_z(1.0), ZScoreBand::ElevatedRecovery);
        assert_eq!(ZScoreBand::from_z(0.999), ZScoreBand::Normal);
        assert_eq!(ZScoreBand::from_z(-1.0), ZScoreBand::Normal);
        assert_eq!(ZScoreBand::from_z(-1.0001), ZScoreBand::Stressed);
        assert_eq!(ZScoreBand::from_z(-2.0), ZScoreBand::Stressed);
        assert_eq!(ZScoreBand::from_z(-2.0001), ZScoreBand::OverreachingRisk);
        assert_eq!(ZScoreBand::from_z(f64::INFINITY), ZScoreBand::ElevatedRecovery);
        assert_eq!(ZScoreBand::from_z(f64::NEG_INFINITY), ZScoreBand::OverreachingRisk);
    }

    #[test]
    fn test_recovery_score() {
        assert_eq!(recovery_score(45.0, Some(50.0)), 90);
        assert_eq!(recovery_score(50.5, Some(50.0)), 101);
        assert_eq!(recovery_score(45.0, None), 100);
    }

    #[test]
    fn test_trend_slope() {
        assert_eq!(trend_slope(&[], 7), 0.0);
        assert_eq!(trend_slope(&[day(0, 40.0)], 7), 0.0);

        let rising: Vec<DailySummary> = (0..7).map(|i| day(i, 40.0 + 2.0 * i as f64)).collect();
        assert!((trend_slope(&rising, 7) - 2.0).abs() < 1e-9);

        let flat: Vec<DailySummary> = (0..7).map(|i| day(i, 40.0)).collect();
        assert!(trend_slope(&flat, 7).abs() < 1e-12);
    }

    #[test]
    fn test_contextualize_is_not_self_referential() {
        let mut store = BaselineStore::default();

        let first = store.contextualize(day(0, 60.0));
        assert!(first.baseline_7d.is_none());
        assert_eq!(first.recovery_score, Some(100));

        for i in 1..7 {
            store.contextualize(day(i, 50.0));
        }
        // Prior history: 60 + six days of 50
        let today = store.contextualize(day(7, 100.0));
        let expected = (60.0 + 6.0 * 50.0) / 7.0;
        assert!((today.baseline_7d.unwrap() - expected).abs() < 1e-9);
        assert!(today.z_score.is_some());
        assert_eq!(today.z_score_band, Some(ZScoreBand::ElevatedRecovery));
        assert_eq!(today.recovery_score, Some((100.0 / expected * 100.0).round() as i32));
    }

    #[test]
    fn test_window_rolling() {
        let mut store = BaselineStore::new(3);
        for i in 0..5 {
            store.contextualize(day(i, 60.0 + 10.0 * i as f64));
        }
        assert_eq!(store.len(), 3);
        let history = store.history();
        assert_eq!(history[0].rmssd, 80.0);
        assert_eq!(history[2].rmssd, 100.0);
    }

    #[test]
    fn test_reprocessed_day_replaces_row() {
        let mut store = BaselineStore::default();
        store.contextualize(day(0, 40.0));
        store.contextualize(day(1, 45.0));
        let again = store.contextualize(day(1, 55.0));
        assert_eq!(store.len(), 2);
        assert!((again.baseline_7d.unwrap() - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_physiological_baseline() {
        let mut store = BaselineStore::default();
        assert!(store.physiological_baseline().is_none());

        for i in 0..10 {
            store.contextualize(day(i, 40.0 + i as f64));
        }
        let baseline = store.physiological_baseline().unwrap();
        // Last 7: 43..=49
        assert!((baseline.rmssd_ms - 46.0).abs() < 1e-9);
        assert!((baseline.heart_rate_bpm - 58.0).abs() < 1e-9);
        assert!((store.hrv_trend() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_serialization() {
        let mut store = BaselineStore::new(7);
        store.contextualize(day(0, 65.0));

        let json = store.to_json().unwrap();
        let loaded = BaselineStore::from_json(&json).unwrap();

        assert_eq!(store.history(), loaded.history());
    }
}
