//! Session confidence scoring
//!
//! Four inputs are each scored 0-100 and blended with fixed weights:
//! connectivity 30%, interval coverage 35%, HR smoothness 20% and
//! detection stability 15%. The score is advisory; warnings never block it.

use crate::types::{ConfidenceComponents, ConfidenceLevel, ConfidenceResult};
use serde::{Deserialize, Serialize};

const BLE_WEIGHT: f64 = 0.30;
const COVERAGE_WEIGHT: f64 = 0.35;
const SMOOTHNESS_WEIGHT: f64 = 0.20;
const STABILITY_WEIGHT: f64 = 0.15;

/// Penalty per disconnect per hour
const DISCONNECT_PENALTY: f64 = 20.0;
/// Consecutive HR samples differing by more than this count as a spike (bpm)
const SPIKE_THRESHOLD_BPM: f64 = 20.0;
const MIN_HR_SAMPLES: usize = 10;
const NEUTRAL_SMOOTHNESS: f64 = 50.0;

/// Score at or above which a session is reliable
pub const RELIABLE_SCORE: u8 = 40;

const WARN_COVERAGE_PERCENT: f64 = 80.0;
const WARN_SPIKES: usize = 10;
const WARN_TRANSITIONS: u32 = 20;

/// Raw session quality inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInputs {
    pub disconnects: u32,
    pub session_hours: f64,
    /// Interval coverage, 0-100
    pub coverage_percent: f64,
    /// Heart-rate samples in arrival order (bpm)
    #[serde(default)]
    pub hr_samples: Vec<f64>,
    /// Sleep-phase transitions over the session
    pub state_transitions: u32,
}

/// Score a session
pub fn score(inputs: &ConfidenceInputs) -> ConfidenceResult {
    let spikes = count_spikes(&inputs.hr_samples);
    let components = ConfidenceComponents {
        ble: ble_score(inputs.disconnects, inputs.session_hours),
        rr_coverage: coverage_score(inputs.coverage_percent),
        hr_smoothness: hr_smoothness_score(&inputs.hr_samples),
        detection_stability: stability_score(inputs.state_transitions, inputs.session_hours),
    };

    let weighted = components.ble * BLE_WEIGHT
        + components.rr_coverage * COVERAGE_WEIGHT
        + components.hr_smoothness * SMOOTHNESS_WEIGHT
        + components.detection_stability * STABILITY_WEIGHT;
    let score = weighted.round().clamp(0.0, 100.0) as u8;

    let mut warnings = Vec::new();
    if inputs.disconnects > 0 {
        warnings.push(format!("{} sensor disconnects during session", inputs.disconnects));
    }
    if inputs.coverage_percent < WARN_COVERAGE_PERCENT {
        warnings.push(format!(
            "Beat interval coverage {:.0}% is below {:.0}%",
            inputs.coverage_percent, WARN_COVERAGE_PERCENT
        ));
    }
    if spikes > WARN_SPIKES {
        warnings.push(format!("{} heart rate spikes detected", spikes));
    }
    if inputs.state_transitions > WARN_TRANSITIONS {
        warnings.push(format!(
            "{} sleep phase transitions, classification unstable",
            inputs.state_transitions
        ));
    }

    ConfidenceResult {
        score,
        components,
        level: level_for(score),
        warnings,
        is_reliable: score >= RELIABLE_SCORE,
    }
}

pub fn level_for(score: u8) -> ConfidenceLevel {
    match score {
        85..=u8::MAX => ConfidenceLevel::High,
        65..=84 => ConfidenceLevel::Moderate,
        40..=64 => ConfidenceLevel::Low,
        _ => ConfidenceLevel::VeryLow,
    }
}

/// `100 - 20 * disconnects_per_hour`, clamped. A zero-length session uses
/// the raw disconnect count.
pub fn ble_score(disconnects: u32, session_hours: f64) -> f64 {
    let per_hour = per_hour(disconnects, session_hours);
    (100.0 - DISCONNECT_PENALTY * per_hour).clamp(0.0, 100.0)
}

pub fn coverage_score(coverage_percent: f64) -> f64 {
    let c = coverage_percent;
    let score = if c > 80.0 {
        c
    } else if c >= 50.0 {
        50.0 + (c - 50.0)
    } else {
        c * 0.5
    };
    score.clamp(0.0, 100.0)
}

/// Coefficient-of-variation band minus a spike penalty; neutral 50 with
/// fewer than 10 samples
pub fn hr_smoothness_score(hr_samples: &[f64]) -> f64 {
    if hr_samples.len() < MIN_HR_SAMPLES {
        return NEUTRAL_SMOOTHNESS;
    }
    let mean = hr_samples.iter().sum::<f64>() / hr_samples.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let cv = crate::baseline::standard_deviation(hr_samples) / mean;

    let base = if cv <= 0.05 {
        100.0
    } else if cv <= 0.20 {
        100.0 - 50.0 * (cv - 0.05) / 0.15
    } else if cv <= 0.35 {
        50.0 - 50.0 * (cv - 0.20) / 0.15
    } else {
        0.0
    };
    let penalty = (2.0 * count_spikes(hr_samples) as f64).min(30.0);
    (base - penalty).max(0.0)
}

/// Consecutive-sample jumps above 20 bpm
pub fn count_spikes(hr_samples: &[f64]) -> usize {
    hr_samples
        .windows(2)
        .filter(|w| (w[1] - w[0]).abs() > SPIKE_THRESHOLD_BPM)
        .count()
}

pub fn stability_score(transitions: u32, session_hours: f64) -> f64 {
    let t = per_hour(transitions, session_hours);
    if t <= 1.0 {
        100.0
    } else if t <= 2.0 {
        90.0 - 10.0 * (t - 1.0)
    } else if t <= 5.0 {
        80.0 - 10.0 * (t - 2.0)
    } else if t <= 10.0 {
        50.0 - 10.0 * (t - 5.0)
    } else {
        0.0
    }
}

fn per_hour(count: u32, hours: f64) -> f64 {
    if hours > 0.0 {
        count as f64 / hours
    } else {
        count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_hr() -> Vec<f64> {
        (0..15).map(|i| if i % 2 == 0 { 58.2 } else { 61.8 }).collect()
    }

    #[test]
    fn test_clean_overnight_session_is_high() {
        let hr = steady_hr();
        let cv = crate::baseline::standard_deviation(&hr) / (hr.iter().sum::<f64>() / 15.0);
        assert!((cv - 0.03).abs() < 0.005);

        let result = score(&ConfidenceInputs {
            disconnects: 0,
            session_hours: 1.0,
            coverage_percent: 95.0,
            hr_samples: hr,
            state_transitions: 2,
        });

        // 0.30*100 + 0.35*95 + 0.20*100 + 0.15*80 = 95.25
        assert_eq!(result.score, 95);
        assert_eq!(result.level, ConfidenceLevel::High);
        assert!(result.is_reliable);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_ble_score() {
        assert_eq!(ble_score(0, 8.0), 100.0);
        assert_eq!(ble_score(4, 2.0), 60.0);
        assert_eq!(ble_score(10, 1.0), 0.0);
        assert_eq!(ble_score(2, 0.0), 60.0);
    }

    #[test]
    fn test_coverage_score_bands() {
        assert_eq!(coverage_score(95.0), 95.0);
        assert_eq!(coverage_score(65.0), 65.0);
        assert_eq!(coverage_score(40.0), 20.0);
        assert_eq!(coverage_score(0.0), 0.0);
    }

    #[test]
    fn test_smoothness_needs_ten_samples() {
        assert_eq!(hr_smoothness_score(&[60.0; 9]), 50.0);
        assert_eq!(hr_smoothness_score(&[60.0; 10]), 100.0);
    }

    #[test]
    fn test_spike_penalty_is_capped() {
        let spiky: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 50.0 } else { 110.0 }).collect();
        assert_eq!(count_spikes(&spiky), 39);
        // CV > 0.35 is already 0; penalty cannot push below 0
        assert_eq!(hr_smoothness_score(&spiky), 0.0);

        // 8 isolated jumps -> 16 spikes, penalty capped at 30
        let mut long: Vec<f64> = vec![60.0; 200];
        for i in 0..8 {
            long[10 + i * 20] = 82.0;
        }
        assert_eq!(count_spikes(&long), 16);
        let mean = long.iter().sum::<f64>() / 200.0;
        let cv = crate::baseline::standard_deviation(&long) / mean;
        let base = 100.0 - 50.0 * (cv - 0.05) / 0.15;
        assert!((hr_smoothness_score(&long) - (base - 30.0)).abs() < 1e-9);

        let mut mild = vec![60.0; 20];
        mild[10] = 82.0;
        assert_eq!(count_spikes(&mild), 2);
        let cv_score = {
            let mean = mild.iter().sum::<f64>() / 20.0;
            let cv = crate::baseline::standard_deviation(&mild) / mean;
            100.0 - 50.0 * (cv - 0.05) / 0.15
        };
        assert!((hr_smoothness_score(&mild) - (cv_score - 4.0)).abs() < 1e-9);
    }

    #[test]
    fn test_stability_bands() {
        assert_eq!(stability_score(1, 1.0), 100.0);
        assert_eq!(stability_score(2, 1.0), 80.0);
        assert!((stability_score(3, 2.0) - 85.0).abs() < 1e-9);
        assert_eq!(stability_score(5, 1.0), 50.0);
        assert_eq!(stability_score(10, 1.0), 0.0);
        assert_eq!(stability_score(11, 1.0), 0.0);
    }

    #[test]
    fn test_levels() {
        assert_eq!(level_for(85), ConfidenceLevel::High);
        assert_eq!(level_for(84), ConfidenceLevel::Moderate);
        assert_eq!(level_for(65), ConfidenceLevel::Moderate);
        assert_eq!(level_for(40), ConfidenceLevel::Low);
        assert_eq!(level_for(39), ConfidenceLevel::VeryLow);
    }

    #[test]
    fn test_warnings_do_not_block_score() {
        let spiky: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 50.0 } else { 110.0 }).collect();
        let result = score(&ConfidenceInputs {
            disconnects: 12,
            session_hours: 1.0,
            coverage_percent: 30.0,
            hr_samples: spiky,
            state_transitions: 25,
        });
        assert_eq!(result.warnings.len(), 4);
        // 0.35 * 15 = 5.25
        assert_eq!(result.score, 5);
        assert_eq!(result.level, ConfidenceLevel::VeryLow);
        assert!(!result.is_reliable);
    }
}
