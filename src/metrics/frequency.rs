//! Frequency-domain HRV metrics
//!
//! The interval series is unevenly sampled (one value per beat), so it is
//! first interpolated onto a uniform grid, then a Welch periodogram is
//! integrated over the LF and HF bands.

use super::least_squares;
use crate::config::MetricsConfig;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Low-frequency band (Hz)
pub const LF_BAND: (f64, f64) = (0.04, 0.15);
/// High-frequency band (Hz)
pub const HF_BAND: (f64, f64) = (0.15, 0.40);

/// Welch segment length in resampled points
const SEGMENT_LEN: usize = 256;
/// Below this many resampled points no spectrum is attempted
const MIN_RESAMPLED_POINTS: usize = 32;

/// Band powers in ms²
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyDomain {
    pub lf_power: f64,
    pub hf_power: f64,
    pub lf_hf_ratio: Option<f64>,
    /// Power below the upper HF edge
    pub total_power: f64,
}

/// Compute LF/HF band powers, or `None` when the window is too short.
pub fn frequency_domain(intervals: &[f64], config: &MetricsConfig) -> Option<FrequencyDomain> {
    if intervals.len() < 3 {
        return None;
    }
    let duration_secs = intervals.iter().sum::<f64>() / 1000.0;
    if duration_secs < config.min_frequency_duration_secs {
        return None;
    }

    let fs = config.resample_hz;
    let resampled = resample(intervals, fs);
    if resampled.len() < MIN_RESAMPLED_POINTS {
        return None;
    }
    let detrended = detrend(&resampled);
    let (psd, df) = welch(&detrended, fs);

    let mut lf_power = 0.0;
    let mut hf_power = 0.0;
    let mut total_power = 0.0;
    for (k, power) in psd.iter().enumerate() {
        let freq = k as f64 * df;
        let band_power = power * df;
        if freq < HF_BAND.1 {
            total_power += band_power;
        }
        if (LF_BAND.0..LF_BAND.1).contains(&freq) {
            lf_power += band_power;
        } else if (HF_BAND.0..HF_BAND.1).contains(&freq) {
            hf_power += band_power;
        }
    }

    let lf_hf_ratio = if hf_power > 0.0 {
        Some(lf_power / hf_power)
    } else {
        None
    };

    Some(FrequencyDomain {
        lf_power,
        hf_power,
        lf_hf_ratio,
        total_power,
    })
}

/// Linearly interpolate interval values at their beat times onto a uniform grid
fn resample(intervals: &[f64], fs: f64) -> Vec<f64> {
    let mut beat_times = Vec::with_capacity(intervals.len());
    let mut elapsed = 0.0;
    for rr in intervals {
        elapsed += rr / 1000.0;
        beat_times.push(elapsed);
    }

    let start = beat_times[0];
    let end = beat_times[beat_times.len() - 1];
    let step = 1.0 / fs;
    let count = ((end - start) * fs).floor() as usize + 1;

    let mut out = Vec::with_capacity(count);
    let mut seg = 0;
    for i in 0..count {
        let t = start + i as f64 * step;
        while seg + 2 < beat_times.len() && beat_times[seg + 1] < t {
            seg += 1;
        }
        let (t0, t1) = (beat_times[seg], beat_times[seg + 1]);
        let (v0, v1) = (intervals[seg], intervals[seg + 1]);
        let frac = if t1 > t0 { ((t - t0) / (t1 - t0)).clamp(0.0, 1.0) } else { 0.0 };
        out.push(v0 + frac * (v1 - v0));
    }
    out
}

/// Remove the least-squares linear trend
fn detrend(signal: &[f64]) -> Vec<f64> {
    let x: Vec<f64> = (0..signal.len()).map(|i| i as f64).collect();
    match least_squares(&x, signal) {
        Some((slope, intercept)) => signal
            .iter()
            .enumerate()
            .map(|(i, v)| v - (slope * i as f64 + intercept))
            .collect(),
        None => signal.to_vec(),
    }
}

fn hann_window(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|k| 0.5 - 0.5 * (2.0 * PI * k as f64 / (size - 1) as f64).cos())
        .collect()
}

/// One-sided Welch PSD up to just past the HF band. Returns (psd, bin width).
fn welch(signal: &[f64], fs: f64) -> (Vec<f64>, f64) {
    let seg_len = SEGMENT_LEN.min(signal.len());
    let step = (seg_len / 2).max(1);
    let num_segments = (signal.len() - seg_len) / step + 1;

    let window = hann_window(seg_len);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let df = fs / seg_len as f64;
    let max_bin = (((HF_BAND.1 / df).ceil() as usize) + 1).min(seg_len / 2);

    let mut accum = vec![0.0; max_bin + 1];
    for seg in 0..num_segments {
        let segment = &signal[seg * step..seg * step + seg_len];
        let mean = segment.iter().sum::<f64>() / seg_len as f64;
        let windowed: Vec<f64> = segment
            .iter()
            .zip(&window)
            .map(|(v, w)| (v - mean) * w)
            .collect();

        for (k, slot) in accum.iter_mut().enumerate() {
            let (mut re, mut im) = (0.0, 0.0);
            for (n, v) in windowed.iter().enumerate() {
                let phase = 2.0 * PI * (k * n) as f64 / seg_len as f64;
                re += v * phase.cos();
                im -= v * phase.sin();
            }
            *slot += re * re + im * im;
        }
    }

    let scale = 1.0 / (fs * window_power * num_segments as f64);
    let psd = accum
        .iter()
        .enumerate()
        .map(|(k, p)| {
            let one_sided = if k == 0 || 2 * k == seg_len { 1.0 } else { 2.0 };
            p * scale * one_sided
        })
        .collect();
    (psd, df)
}
