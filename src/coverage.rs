//! Coverage tracking
//!
//! Counts received samples against the number a healthy sensor link would
//! have delivered, and records periods of silence as gaps.
//!
//! Time is always passed in by the caller; the tracker never reads a clock.

use crate::config::CoverageConfig;
use crate::types::{CoverageReport, DataGap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageState {
    /// Not tracking
    Idle,
    Normal,
    InGap,
}

/// Expected-vs-received sample tracker with gap detection
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    config: CoverageConfig,
    state: CoverageState,
    started_at: Option<DateTime<Utc>>,
    last_sample_at: Option<DateTime<Utc>>,
    received: u64,
    gaps: Vec<DataGap>,
    open_gap_start: Option<DateTime<Utc>>,
}

impl Default for CoverageTracker {
    fn default() -> Self {
        Self::new(CoverageConfig::default())
    }
}

impl CoverageTracker {
    pub fn new(config: CoverageConfig) -> Self {
        Self {
            config,
            state: CoverageState::Idle,
            started_at: None,
            last_sample_at: None,
            received: 0,
            gaps: Vec::new(),
            open_gap_start: None,
        }
    }

    /// Begin a tracking period at `now`
    pub fn start_tracking(&mut self, now: DateTime<Utc>) {
        self.clear_counters(now);
        self.state = CoverageState::Normal;
        log::debug!("coverage tracking started at {}", now);
    }

    /// Count `count` received samples. Closes an open gap and returns it.
    pub fn record_samples(&mut self, count: u64, now: DateTime<Utc>) -> Option<DataGap> {
        if self.state == CoverageState::Idle {
            return None;
        }
        self.received += count;
        self.last_sample_at = Some(now);

        if self.state != CoverageState::InGap {
            return None;
        }
        let start = self.open_gap_start.take()?;
        let gap = DataGap { start, end: now };
        log::info!("data gap closed after {:.0}s", gap.duration_seconds());
        self.gaps.push(gap.clone());
        self.state = CoverageState::Normal;
        Some(gap)
    }

    /// Periodic poll: opens a gap when nothing arrived for longer than the
    /// gap threshold. Returns the gap start when one was opened.
    pub fn check_for_gap(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.state != CoverageState::Normal {
            return None;
        }
        let last = self.last_sample_at?;
        let threshold = self.config.gap_threshold();
        if now - last <= threshold {
            return None;
        }
        self.open_gap_start = Some(last);
        self.state = CoverageState::InGap;
        log::debug!("data gap opened, last sample at {}", last);
        Some(last)
    }

    /// Current report without changing state. An open gap is counted up
    /// to `now`.
    pub fn snapshot(&self, now: DateTime<Utc>) -> CoverageReport {
        let mut gaps = self.gaps.clone();
        if let Some(start) = self.open_gap_start {
            gaps.push(DataGap { start, end: now });
        }
        self.build_report(now, &gaps)
    }

    /// Finish tracking: force-closes any open gap and returns the final report
    pub fn stop_tracking(&mut self, now: DateTime<Utc>) -> CoverageReport {
        if let Some(start) = self.open_gap_start.take() {
            self.gaps.push(DataGap { start, end: now });
        }
        let report = self.build_report(now, &self.gaps);
        self.state = CoverageState::Idle;
        log::debug!(
            "coverage tracking stopped: {:.1}% over {:.1} min, {} gaps",
            report.coverage_percent,
            report.duration_minutes,
            report.gap_count
        );
        report
    }

    /// Zero all counters and restart the tracking period at `now` without
    /// leaving the current tracking state.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        let tracking = self.state != CoverageState::Idle;
        self.clear_counters(now);
        if tracking {
            self.state = CoverageState::Normal;
        }
    }

    pub fn state(&self) -> CoverageState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state != CoverageState::Idle
    }

    /// Closed gaps so far
    pub fn gaps(&self) -> &[DataGap] {
        &self.gaps
    }

    pub fn received_samples(&self) -> u64 {
        self.received
    }

    fn clear_counters(&mut self, now: DateTime<Utc>) {
        self.started_at = Some(now);
        self.last_sample_at = Some(now);
        self.received = 0;
        self.gaps.clear();
        self.open_gap_start = None;
    }

    fn build_report(&self, now: DateTime<Utc>, gaps: &[DataGap]) -> CoverageReport {
        let duration_minutes = match self.started_at {
            Some(start) if now > start => (now - start).num_milliseconds() as f64 / 60_000.0,
            _ => 0.0,
        };
        let expected = duration_minutes * self.config.expected_samples_per_minute;
        let coverage_percent = coverage_percent(self.received, expected);

        let total_gap_seconds = gaps.iter().map(DataGap::duration_seconds).sum();
        let longest_gap_seconds = gaps
            .iter()
            .map(DataGap::duration_seconds)
            .fold(0.0, f64::max);

        CoverageReport {
            duration_minutes,
            received_samples: self.received,
            expected_samples: expected.round() as u64,
            coverage_percent,
            gap_count: gaps.len(),
            total_gap_seconds,
            longest_gap_seconds,
            is_low_coverage: coverage_percent < self.config.min_coverage * 100.0,
        }
    }
}

/// `min(100, 100 * received / expected)`. With nothing expected, any
/// received data counts as full coverage.
pub fn coverage_percent(received: u64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return if received > 0 { 100.0 } else { 0.0 };
    }
    (100.0 * received as f64 / expected).min(100.0)
}
