//! Core types for the Synheart Pulse pipeline
//!
//! This module defines the values that flow between pipeline stages: decoded
//! beat samples, cleaned interval windows, HRV metric sets, per-tick
//! timeslices and the finished records handed to storage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Anything stored in a time-windowed buffer
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Sensor skin-contact status reported in the packet flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorContact {
    NotSupported,
    NotDetected,
    Detected,
}

/// One decoded heart-rate measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatSample {
    /// Receipt time of the payload
    pub timestamp: DateTime<Utc>,
    /// Heart rate reported by the sensor (bpm)
    pub heart_rate_bpm: u16,
    /// Beat-to-beat intervals in milliseconds, in arrival order
    pub rr_intervals_ms: Vec<f64>,
    /// Contact status (advisory only)
    pub sensor_contact: SensorContact,
    /// Energy expended field, when the sensor sends one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_expended_kj: Option<u16>,
}

impl Timestamped for BeatSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Result of cleaning a time-bounded slice of raw intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanIntervalWindow {
    /// Intervals that survived cleaning (ms), all within the plausible range
    pub clean_intervals: Vec<f64>,
    /// 0-1 quality of the window
    pub quality_score: f64,
    /// Whether enough intervals survived for metric computation
    pub is_valid: bool,
    /// Intervals dropped for falling outside physiological bounds
    pub removed_count: usize,
    /// Intervals replaced by ectopic-beat correction
    pub interpolated_count: usize,
}

/// HRV metrics for one clean interval window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvMetricSet {
    /// Root mean square of successive differences (ms)
    pub rmssd: f64,
    /// Sample standard deviation of intervals (ms)
    pub sdnn: f64,
    /// Fraction (0-1) of successive differences above 50 ms
    pub pnn50: f64,
    /// Mean interval (ms)
    pub mean_rr: f64,
    /// Number of intervals the metrics were computed from
    pub interval_count: usize,
    /// Low-frequency power (ms²), 0.04-0.15 Hz
    pub lf_power: Option<f64>,
    /// High-frequency power (ms²), 0.15-0.40 Hz
    pub hf_power: Option<f64>,
    pub lf_hf_ratio: Option<f64>,
    /// Short-term DFA scaling exponent
    pub dfa_alpha1: Option<f64>,
}

/// Personal reference values used by all ratio-based classifications
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysiologicalBaseline {
    pub heart_rate_bpm: f64,
    pub rmssd_ms: f64,
}

impl PhysiologicalBaseline {
    pub fn new(heart_rate_bpm: f64, rmssd_ms: f64) -> Self {
        Self {
            heart_rate_bpm,
            rmssd_ms,
        }
    }

    /// A baseline with non-positive values cannot normalize anything
    pub fn is_usable(&self) -> bool {
        self.heart_rate_bpm > 0.0 && self.rmssd_ms > 0.0
    }
}

/// Sleep phase classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepPhase {
    Awake,
    Light,
    Deep,
    Rem,
}

impl SleepPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepPhase::Awake => "awake",
            SleepPhase::Light => "light",
            SleepPhase::Deep => "deep",
            SleepPhase::Rem => "rem",
        }
    }

    pub fn is_asleep(&self) -> bool {
        !matches!(self, SleepPhase::Awake)
    }
}

/// Minutes spent in each phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepBreakdown {
    pub awake_minutes: f64,
    pub light_minutes: f64,
    pub deep_minutes: f64,
    pub rem_minutes: f64,
}

impl SleepBreakdown {
    pub fn add(&mut self, phase: SleepPhase, minutes: f64) {
        match phase {
            SleepPhase::Awake => self.awake_minutes += minutes,
            SleepPhase::Light => self.light_minutes += minutes,
            SleepPhase::Deep => self.deep_minutes += minutes,
            SleepPhase::Rem => self.rem_minutes += minutes,
        }
    }

    /// Light + deep + REM
    pub fn total_sleep_minutes(&self) -> f64 {
        self.light_minutes + self.deep_minutes + self.rem_minutes
    }
}

/// Heart rate statistics for a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateStats {
    pub mean_bpm: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// True when no direct HR samples existed and HR came from the mean interval
    pub derived_from_intervals: bool,
}

/// Result of one processing tick of the overnight processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeslice {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub metrics: HrvMetricSet,
    pub heart_rate: HeartRateStats,
    pub phase: SleepPhase,
    pub is_parasympathetic_dominant: bool,
    pub is_deep_sleep_window: bool,
    pub quality_score: f64,
}

/// Stress episode severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressSeverity {
    Mild,
    Moderate,
    High,
}

impl StressSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            StressSeverity::Mild => "mild",
            StressSeverity::Moderate => "moderate",
            StressSeverity::High => "high",
        }
    }
}

/// A confirmed stress episode that has ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressEvent {
    pub id: Uuid,
    /// Onset time of the episode
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub average_hr: f64,
    pub average_rmssd: f64,
    pub baseline_rmssd: f64,
    pub severity: StressSeverity,
}

/// A period with no incoming samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataGap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DataGap {
    pub fn duration_seconds(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }
}

/// Expected-vs-received sample accounting for a monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub duration_minutes: f64,
    pub received_samples: u64,
    pub expected_samples: u64,
    pub coverage_percent: f64,
    pub gap_count: usize,
    pub total_gap_seconds: f64,
    pub longest_gap_seconds: f64,
    pub is_low_coverage: bool,
}

/// Confidence level bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Moderate,
    Low,
    VeryLow,
}

/// Per-input confidence scores (0-100 each)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceComponents {
    pub ble: f64,
    pub rr_coverage: f64,
    pub hr_smoothness: f64,
    pub detection_stability: f64,
}

/// Session-quality score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub score: u8,
    pub components: ConfidenceComponents,
    pub level: ConfidenceLevel,
    pub warnings: Vec<String>,
    pub is_reliable: bool,
}

/// Z-score interpretation bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZScoreBand {
    ElevatedRecovery,
    Normal,
    Stressed,
    OverreachingRisk,
}

/// One row per calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub rmssd: f64,
    pub sdnn: f64,
    pub mean_hr: f64,
    pub min_hr: f64,
    pub max_hr: f64,
    #[serde(default)]
    pub sleep: SleepBreakdown,
    #[serde(default)]
    pub baseline_7d: Option<f64>,
    #[serde(default)]
    pub baseline_30d: Option<f64>,
    #[serde(default)]
    pub z_score: Option<f64>,
    #[serde(default)]
    pub z_score_band: Option<ZScoreBand>,
    #[serde(default)]
    pub recovery_score: Option<i32>,
}

impl DailySummary {
    /// A summary with no computed baseline fields
    pub fn new(date: NaiveDate, rmssd: f64, sdnn: f64, mean_hr: f64, min_hr: f64, max_hr: f64) -> Self {
        Self {
            date,
            rmssd,
            sdnn,
            mean_hr,
            min_hr,
            max_hr,
            sleep: SleepBreakdown::default(),
            baseline_7d: None,
            baseline_30d: None,
            z_score: None,
            z_score_band: None,
            recovery_score: None,
        }
    }
}
