//! HRV metrics engine
//!
//! Pure functions over a clean interval sequence:
//! - Time domain: RMSSD, SDNN, pNN50
//! - Frequency domain: LF/HF band power (Welch periodogram)
//! - Non-linear: DFA α1
//!
//! No state is kept between calls.

pub mod frequency;
pub mod nonlinear;
pub mod time_domain;

pub use frequency::{frequency_domain, FrequencyDomain};
pub use nonlinear::dfa_alpha1;
pub use time_domain::{mean_rr, pnn50, rmssd, sdnn};

use crate::config::MetricsConfig;
use crate::types::HrvMetricSet;

/// Computes a full metric set for a clean window
#[derive(Debug, Clone, Default)]
pub struct HrvAnalyzer {
    config: MetricsConfig,
}

impl HrvAnalyzer {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Compute all metrics. Spectral and DFA fields are `None` when the
    /// window is too short for a meaningful estimate.
    pub fn analyze(&self, intervals: &[f64]) -> HrvMetricSet {
        let spectrum = frequency_domain(intervals, &self.config);

        HrvMetricSet {
            rmssd: rmssd(intervals),
            sdnn: sdnn(intervals),
            pnn50: pnn50(intervals),
            mean_rr: mean_rr(intervals),
            interval_count: intervals.len(),
            lf_power: spectrum.as_ref().map(|s| s.lf_power),
            hf_power: spectrum.as_ref().map(|s| s.hf_power),
            lf_hf_ratio: spectrum.and_then(|s| s.lf_hf_ratio),
            dfa_alpha1: dfa_alpha1(intervals, self.config.min_dfa_intervals),
        }
    }
}

/// Ordinary least-squares fit, `None` when x has no spread
pub(crate) fn least_squares(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let sum_x: f64 = x[..n].iter().sum();
    let sum_y: f64 = y[..n].iter().sum();
    let sum_xy: f64 = x[..n].iter().zip(&y[..n]).map(|(a, b)| a * b).sum();
    let sum_xx: f64 = x[..n].iter().map(|a| a * a).sum();

    let denom = nf * sum_xx - sum_x * sum_x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let slope = (nf * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / nf;
    Some((slope, intercept))
}
