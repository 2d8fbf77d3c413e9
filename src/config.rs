//! Monitoring configuration
//!
//! Every option carries the default the pipeline was tuned with; a JSON
//! document only needs to name the values it overrides.

use crate::error::ComputeError;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Longest accepted duration setting (one day)
pub const MAX_DURATION_SECS: u64 = 86_400;
/// Largest accepted buffer capacity
pub const MAX_BUFFER_CAPACITY: usize = 1_000_000;
/// Highest accepted resampling rate (Hz)
pub const MAX_RESAMPLE_HZ: f64 = 32.0;

/// Seconds as a chrono duration, saturating at [`MAX_DURATION_SECS`]
pub(crate) fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

/// Overnight (sleep-phase) processor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    /// Period between processing ticks (seconds)
    pub tick_interval_secs: u64,
    /// Trailing window read on each tick (seconds)
    pub window_duration_secs: u64,
    /// Ticks with fewer raw intervals than this are skipped
    pub min_intervals_per_tick: usize,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 300,
            window_duration_secs: 330,
            min_intervals_per_tick: 30,
        }
    }
}

impl SleepConfig {
    pub fn tick_interval(&self) -> Duration {
        seconds(self.tick_interval_secs)
    }

    pub fn window_duration(&self) -> Duration {
        seconds(self.window_duration_secs)
    }
}

/// Stress state machine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// RMSSD / baseline below this counts as suppressed HRV
    pub rmssd_drop_threshold: f64,
    /// Fractional HR rise above baseline that counts as elevated
    pub hr_elevation_threshold: f64,
    /// Condition must hold this long before alerting (seconds)
    pub sustained_duration_secs: u64,
    /// Minimum spacing between alerts (seconds)
    pub cooldown_secs: u64,
    /// Cadence of stress updates from the sample path (seconds)
    pub update_interval_secs: u64,
    /// Trailing window of intervals used for each stress update (seconds)
    pub window_secs: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            rmssd_drop_threshold: 0.70,
            hr_elevation_threshold: 0.10,
            sustained_duration_secs: 300,
            cooldown_secs: 600,
            update_interval_secs: 30,
            window_secs: 60,
        }
    }
}

impl StressConfig {
    pub fn sustained_duration(&self) -> Duration {
        seconds(self.sustained_duration_secs)
    }

    pub fn cooldown(&self) -> Duration {
        seconds(self.cooldown_secs)
    }

    pub fn update_interval(&self) -> Duration {
        seconds(self.update_interval_secs)
    }

    pub fn window(&self) -> Duration {
        seconds(self.window_secs)
    }
}

/// Coverage tracking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Silence longer than this opens a gap (seconds)
    pub gap_threshold_secs: u64,
    pub expected_samples_per_minute: f64,
    /// Coverage fraction below which a session is flagged low-coverage
    pub min_coverage: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: 30,
            expected_samples_per_minute: 60.0,
            min_coverage: 0.80,
        }
    }
}

impl CoverageConfig {
    pub fn gap_threshold(&self) -> Duration {
        seconds(self.gap_threshold_secs)
    }
}

/// Continuous buffer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    /// Fill ratio at which a flush notification fires
    pub flush_threshold: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 600,
            flush_threshold: 0.8,
        }
    }
}

/// Interval cleaning settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionerConfig {
    pub min_interval_ms: f64,
    pub max_interval_ms: f64,
    /// Replace ectopic beats with the local median
    pub ectopic_correction: bool,
    /// Relative deviation from the local median that marks a beat ectopic
    pub ectopic_tolerance: f64,
}

impl Default for ConditionerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 200.0,
            max_interval_ms: 2500.0,
            ectopic_correction: false,
            ectopic_tolerance: 0.20,
        }
    }
}

/// HRV metric computation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Minimum continuous beat time for frequency analysis (seconds)
    pub min_frequency_duration_secs: f64,
    /// Uniform resampling rate for spectral estimation (Hz)
    pub resample_hz: f64,
    pub min_dfa_intervals: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            min_frequency_duration_secs: 120.0,
            resample_hz: 4.0,
            min_dfa_intervals: 50,
        }
    }
}

/// Complete monitoring configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sleep: SleepConfig,
    pub stress: StressConfig,
    pub coverage: CoverageConfig,
    pub buffer: BufferConfig,
    pub conditioning: ConditionerConfig,
    pub metrics: MetricsConfig,
}

impl MonitorConfig {
    /// Load and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject values the state machines cannot run with
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.sleep.tick_interval_secs == 0 {
            return Err(invalid("sleep.tick_interval_secs must be positive"));
        }
        if self.sleep.window_duration_secs == 0 {
            return Err(invalid("sleep.window_duration_secs must be positive"));
        }
        if self.stress.update_interval_secs == 0 || self.stress.window_secs == 0 {
            return Err(invalid("stress update interval and window must be positive"));
        }
        let durations = [
            ("sleep.tick_interval_secs", self.sleep.tick_interval_secs),
            ("sleep.window_duration_secs", self.sleep.window_duration_secs),
            ("stress.sustained_duration_secs", self.stress.sustained_duration_secs),
            ("stress.cooldown_secs", self.stress.cooldown_secs),
            ("stress.update_interval_secs", self.stress.update_interval_secs),
            ("stress.window_secs", self.stress.window_secs),
            ("coverage.gap_threshold_secs", self.coverage.gap_threshold_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, secs)| *secs > MAX_DURATION_SECS) {
            return Err(ComputeError::InvalidConfig(format!(
                "{} must not exceed {} seconds",
                name, MAX_DURATION_SECS
            )));
        }
        if !in_unit_interval(self.stress.rmssd_drop_threshold) {
            return Err(invalid("stress.rmssd_drop_threshold must be in (0, 1]"));
        }
        if self.stress.hr_elevation_threshold < 0.0 {
            return Err(invalid("stress.hr_elevation_threshold must not be negative"));
        }
        if self.coverage.gap_threshold_secs == 0 {
            return Err(invalid("coverage.gap_threshold_secs must be positive"));
        }
        if self.coverage.expected_samples_per_minute <= 0.0 {
            return Err(invalid("coverage.expected_samples_per_minute must be positive"));
        }
        if !in_unit_interval(self.coverage.min_coverage) {
            return Err(invalid("coverage.min_coverage must be in (0, 1]"));
        }
        if self.buffer.capacity == 0 {
            return Err(invalid("buffer.capacity must be positive"));
        }
        if self.buffer.capacity > MAX_BUFFER_CAPACITY {
            return Err(invalid("buffer.capacity is too large"));
        }
        if !in_unit_interval(self.buffer.flush_threshold) {
            return Err(invalid("buffer.flush_threshold must be in (0, 1]"));
        }
        if self.conditioning.min_interval_ms >= self.conditioning.max_interval_ms {
            return Err(invalid("conditioning interval bounds are inverted"));
        }
        if !(self.metrics.resample_hz > 0.0 && self.metrics.resample_hz <= MAX_RESAMPLE_HZ) {
            return Err(invalid("metrics.resample_hz must be in (0, 32]"));
        }
        Ok(())
    }
}

fn in_unit_interval(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

fn invalid(message: &str) -> ComputeError {
    ComputeError::InvalidConfig(message.to_string())
}
