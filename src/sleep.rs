//! Overnight sleep-phase processing
//!
//! On every tick the processor reads a trailing window of beat intervals and
//! heart-rate samples, computes HRV metrics and classifies the window into a
//! sleep phase by comparing HR and RMSSD with the waking baseline.
//!
//! Phase rules, first match wins:
//! 1. HR ratio < 0.85 and RMSSD ratio > 1.15: deep
//! 2. LF/HF > 2.0 and RMSSD ratio in (0.9, 1.1): REM
//! 3. HR ratio > 0.95 and RMSSD ratio < 0.9: awake
//! 4. Otherwise: light

use crate::conditioner::IntervalConditioner;
use crate::config::{MonitorConfig, SleepConfig};
use crate::events::{EventSink, MonitorEvent};
use crate::metrics::HrvAnalyzer;
use crate::types::{
    HeartRateStats, PhysiologicalBaseline, SleepBreakdown, SleepPhase, Timeslice,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

const DEEP_HR_RATIO: f64 = 0.85;
const DEEP_RMSSD_RATIO: f64 = 1.15;
const REM_LF_HF: f64 = 2.0;
const REM_RMSSD_RANGE: (f64, f64) = (0.9, 1.1);
const AWAKE_HR_RATIO: f64 = 0.95;
const AWAKE_RMSSD_RATIO: f64 = 0.9;

const PARASYMPATHETIC_RMSSD_RATIO: f64 = 1.10;
const DEEP_WINDOW_HR_RATIO: f64 = 0.80;
const DEEP_WINDOW_RMSSD_RATIO: f64 = 1.25;

/// Read-only view of the current sleep state
pub trait SleepStateProvider: Send + Sync {
    /// Last classified phase, `None` before the first classification
    fn current_sleep_state(&self) -> Option<SleepPhase>;

    fn is_asleep(&self) -> bool {
        self.current_sleep_state()
            .map(|phase| phase.is_asleep())
            .unwrap_or(false)
    }
}

/// Shared cell holding the latest classified phase
#[derive(Debug, Clone, Default)]
pub struct PhaseCell {
    phase: Arc<RwLock<Option<SleepPhase>>>,
}

impl PhaseCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, phase: Option<SleepPhase>) {
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = phase;
    }
}

impl SleepStateProvider for PhaseCell {
    fn current_sleep_state(&self) -> Option<SleepPhase> {
        *self.phase.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Classify one window from its ratios against baseline
pub fn classify_phase(hr_ratio: f64, rmssd_ratio: f64, lf_hf_ratio: Option<f64>) -> SleepPhase {
    if hr_ratio < DEEP_HR_RATIO && rmssd_ratio > DEEP_RMSSD_RATIO {
        return SleepPhase::Deep;
    }
    let rem_range = rmssd_ratio > REM_RMSSD_RANGE.0 && rmssd_ratio < REM_RMSSD_RANGE.1;
    if lf_hf_ratio.map_or(false, |r| r > REM_LF_HF) && rem_range {
        return SleepPhase::Rem;
    }
    if hr_ratio > AWAKE_HR_RATIO && rmssd_ratio < AWAKE_RMSSD_RATIO {
        return SleepPhase::Awake;
    }
    SleepPhase::Light
}

/// RMSSD above 1.10x baseline with LF/HF below 1 (or unavailable)
pub fn is_parasympathetic_dominant(
    rmssd: f64,
    lf_hf_ratio: Option<f64>,
    baseline: &PhysiologicalBaseline,
) -> bool {
    rmssd > PARASYMPATHETIC_RMSSD_RATIO * baseline.rmssd_ms && lf_hf_ratio.map_or(true, |r| r < 1.0)
}

/// Stricter deep-sleep check used for notifications
pub fn is_deep_sleep_window(heart_rate: f64, rmssd: f64, baseline: &PhysiologicalBaseline) -> bool {
    heart_rate < DEEP_WINDOW_HR_RATIO * baseline.heart_rate_bpm
        && rmssd > DEEP_WINDOW_RMSSD_RATIO * baseline.rmssd_ms
}

/// Aggregate view over all timeslices of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepSessionSummary {
    pub tick_count: usize,
    pub mean_rmssd: Option<f64>,
    pub max_rmssd: Option<f64>,
    pub min_rmssd: Option<f64>,
    pub mean_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub min_hr: Option<f64>,
    pub deep_window_count: usize,
    pub parasympathetic_window_count: usize,
    /// RMSSD per tick scaled to 0-1 across the session
    pub recovery_curve: Vec<f64>,
    pub breakdown: SleepBreakdown,
    pub phase_transitions: usize,
}

impl SleepSessionSummary {
    pub fn from_timeslices(
        timeslices: &[Timeslice],
        tick_minutes: f64,
        phase_transitions: usize,
    ) -> Self {
        let rmssd: Vec<f64> = timeslices.iter().map(|t| t.metrics.rmssd).collect();
        let hr: Vec<f64> = timeslices.iter().map(|t| t.heart_rate.mean_bpm).collect();

        let mut breakdown = SleepBreakdown::default();
        for slice in timeslices {
            breakdown.add(slice.phase, tick_minutes);
        }

        Self {
            tick_count: timeslices.len(),
            mean_rmssd: mean(&rmssd),
            max_rmssd: rmssd.iter().copied().reduce(f64::max),
            min_rmssd: rmssd.iter().copied().reduce(f64::min),
            mean_hr: mean(&hr),
            max_hr: hr.iter().copied().reduce(f64::max),
            min_hr: hr.iter().copied().reduce(f64::min),
            deep_window_count: timeslices.iter().filter(|t| t.is_deep_sleep_window).count(),
            parasympathetic_window_count: timeslices
                .iter()
                .filter(|t| t.is_parasympathetic_dominant)
                .count(),
            recovery_curve: normalize_curve(&rmssd),
            breakdown,
            phase_transitions,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Min-max scale to 0-1; a flat series maps to 0.5
fn normalize_curve(values: &[f64]) -> Vec<f64> {
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };
    let range = max - min;
    if range <= 0.0 {
        return vec![0.5; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// Windowed sleep-phase state machine
pub struct SleepPhaseEngine {
    config: SleepConfig,
    conditioner: IntervalConditioner,
    analyzer: HrvAnalyzer,
    baseline: Option<PhysiologicalBaseline>,
    timeslices: Vec<Timeslice>,
    last_phase: Option<SleepPhase>,
    phase_transitions: usize,
    phase_cell: PhaseCell,
    events: Arc<dyn EventSink>,
}

impl SleepPhaseEngine {
    pub fn new(config: &MonitorConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            config: config.sleep.clone(),
            conditioner: IntervalConditioner::new(
                config.conditioning.clone(),
                config.sleep.min_intervals_per_tick,
            ),
            analyzer: HrvAnalyzer::new(config.metrics.clone()),
            baseline: None,
            timeslices: Vec::new(),
            last_phase: None,
            phase_transitions: 0,
            phase_cell: PhaseCell::new(),
            events,
        }
    }

    pub fn set_baseline(&mut self, baseline: PhysiologicalBaseline) {
        self.baseline = baseline.is_usable().then_some(baseline);
    }

    pub fn baseline(&self) -> Option<PhysiologicalBaseline> {
        self.baseline
    }

    /// Handle to the published phase, for the stress monitor
    pub fn phase_cell(&self) -> PhaseCell {
        self.phase_cell.clone()
    }

    /// Process one tick over the window `[window_start, window_end]`.
    ///
    /// Returns `None` (and records nothing) when the window has too few
    /// intervals, cleans to an invalid window, or no baseline is set.
    pub fn process_window(
        &mut self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        raw_intervals: &[f64],
        hr_samples: &[f64],
    ) -> Option<Timeslice> {
        if raw_intervals.len() < self.config.min_intervals_per_tick {
            log::debug!(
                "tick skipped: {} intervals in window, {} required",
                raw_intervals.len(),
                self.config.min_intervals_per_tick
            );
            return None;
        }
        let Some(baseline) = self.baseline else {
            log::debug!("tick skipped: no baseline");
            return None;
        };

        let window = self.conditioner.condition(raw_intervals);
        if !window.is_valid {
            log::debug!("tick skipped: window failed conditioning");
            return None;
        }

        let metrics = self.analyzer.analyze(&window.clean_intervals);
        let heart_rate = heart_rate_stats(hr_samples, metrics.mean_rr);

        let hr_ratio = heart_rate.mean_bpm / baseline.heart_rate_bpm;
        let rmssd_ratio = metrics.rmssd / baseline.rmssd_ms;
        let phase = classify_phase(hr_ratio, rmssd_ratio, metrics.lf_hf_ratio);

        let timeslice = Timeslice {
            window_start,
            window_end,
            is_parasympathetic_dominant: is_parasympathetic_dominant(
                metrics.rmssd,
                metrics.lf_hf_ratio,
                &baseline,
            ),
            is_deep_sleep_window: is_deep_sleep_window(heart_rate.mean_bpm, metrics.rmssd, &baseline),
            quality_score: window.quality_score,
            metrics,
            heart_rate,
            phase,
        };

        self.publish_phase(phase, window_end);
        if timeslice.is_deep_sleep_window {
            self.events.publish(MonitorEvent::DeepSleepDetected {
                at: window_end,
                heart_rate_bpm: timeslice.heart_rate.mean_bpm,
                rmssd: timeslice.metrics.rmssd,
            });
        }
        self.events.publish(MonitorEvent::TimesliceRecorded {
            timeslice: Box::new(timeslice.clone()),
        });

        self.timeslices.push(timeslice.clone());
        Some(timeslice)
    }

    fn publish_phase(&mut self, phase: SleepPhase, at: DateTime<Utc>) {
        if self.last_phase == Some(phase) {
            return;
        }
        let from = self.last_phase;
        if from.is_some() {
            self.phase_transitions += 1;
        }
        log::info!(
            "sleep phase {} -> {}",
            from.map(|p| p.as_str()).unwrap_or("none"),
            phase.as_str()
        );
        self.last_phase = Some(phase);
        self.phase_cell.set(Some(phase));
        self.events
            .publish(MonitorEvent::PhaseChanged { at, from, to: phase });
    }

    pub fn current_phase(&self) -> Option<SleepPhase> {
        self.last_phase
    }

    pub fn timeslices(&self) -> &[Timeslice] {
        &self.timeslices
    }

    /// Number of phase changes after the first classification
    pub fn phase_transitions(&self) -> usize {
        self.phase_transitions
    }

    /// Session summary over the ticks recorded so far
    pub fn summary(&self) -> SleepSessionSummary {
        let tick_minutes = self.config.tick_interval_secs as f64 / 60.0;
        SleepSessionSummary::from_timeslices(&self.timeslices, tick_minutes, self.phase_transitions)
    }

    /// Forget all ticks; the baseline is kept
    pub fn reset(&mut self) {
        self.timeslices.clear();
        self.last_phase = None;
        self.phase_transitions = 0;
        self.phase_cell.set(None);
    }
}

/// HR statistics from direct samples, or derived as 60000 / mean interval
/// when the window has none
fn heart_rate_stats(hr_samples: &[f64], mean_rr: f64) -> HeartRateStats {
    if hr_samples.is_empty() {
        let derived = if mean_rr > 0.0 { 60_000.0 / mean_rr } else { 0.0 };
        return HeartRateStats {
            mean_bpm: derived,
            min_bpm: derived,
            max_bpm: derived,
            derived_from_intervals: true,
        };
    }
    HeartRateStats {
        mean_bpm: hr_samples.iter().sum::<f64>() / hr_samples.len() as f64,
        min_bpm: hr_samples.iter().copied().fold(f64::INFINITY, f64::min),
        max_bpm: hr_samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        derived_from_intervals: false,
    }
}
