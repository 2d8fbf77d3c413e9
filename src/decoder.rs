//! Heart-rate measurement packet decoding
//!
//! Decodes the standard heart-rate-measurement layout delivered by the
//! transport layer:
//!
//! ```text
//! byte 0      flags
//!   bit 0     heart rate is u16 (else u8)
//!   bits 1-2  sensor contact status
//!   bit 3     2-byte energy expended field present
//!   bit 4     beat intervals present
//! then        heart rate (1 or 2 bytes, little endian)
//!             energy expended (2 bytes, optional)
//!             beat intervals (u16 LE each, 1/1024 s units)
//! ```

use crate::error::ComputeError;
use crate::types::{BeatSample, SensorContact};
use chrono::{DateTime, Utc};

const FLAG_HR_U16: u8 = 0x01;
const FLAG_CONTACT_DETECTED: u8 = 0x02;
const FLAG_CONTACT_SUPPORTED: u8 = 0x04;
const FLAG_ENERGY_EXPENDED: u8 = 0x08;
const FLAG_RR_PRESENT: u8 = 0x10;

/// Shortest physiologically plausible beat interval (ms)
pub const MIN_PLAUSIBLE_RR_MS: f64 = 200.0;
/// Longest physiologically plausible beat interval (ms)
pub const MAX_PLAUSIBLE_RR_MS: f64 = 2500.0;

/// Decoder for heart-rate measurement payloads
pub struct PacketDecoder;

impl PacketDecoder {
    /// Decode one payload into a beat sample.
    ///
    /// Out-of-range intervals are dropped rather than failing the packet.
    pub fn decode(payload: &[u8], timestamp: DateTime<Utc>) -> Result<BeatSample, ComputeError> {
        let flags = *payload
            .first()
            .ok_or_else(|| ComputeError::MalformedInput("empty payload".to_string()))?;

        let hr_is_u16 = flags & FLAG_HR_U16 != 0;
        let has_energy = flags & FLAG_ENERGY_EXPENDED != 0;

        let min_len = 1 + if hr_is_u16 { 2 } else { 1 } + if has_energy { 2 } else { 0 };
        if payload.len() < min_len {
            return Err(ComputeError::MalformedInput(format!(
                "payload of {} bytes shorter than {} implied by flags 0x{:02x}",
                payload.len(),
                min_len,
                flags
            )));
        }

        let mut offset = 1;
        let heart_rate_bpm = if hr_is_u16 {
            let value = u16::from_le_bytes([payload[offset], payload[offset + 1]]);
            offset += 2;
            value
        } else {
            let value = payload[offset] as u16;
            offset += 1;
            value
        };

        let energy_expended_kj = if has_energy {
            let value = u16::from_le_bytes([payload[offset], payload[offset + 1]]);
            offset += 2;
            Some(value)
        } else {
            None
        };

        let rr_intervals_ms = if flags & FLAG_RR_PRESENT != 0 {
            decode_intervals(&payload[offset..])
        } else {
            Vec::new()
        };

        Ok(BeatSample {
            timestamp,
            heart_rate_bpm,
            rr_intervals_ms,
            sensor_contact: sensor_contact(flags),
            energy_expended_kj,
        })
    }
}

fn sensor_contact(flags: u8) -> SensorContact {
    if flags & FLAG_CONTACT_SUPPORTED == 0 {
        SensorContact::NotSupported
    } else if flags & FLAG_CONTACT_DETECTED != 0 {
        SensorContact::Detected
    } else {
        SensorContact::NotDetected
    }
}

/// Convert raw 1/1024 s interval words to milliseconds, keeping plausible ones
fn decode_intervals(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(2)
        .filter_map(|pair| {
            let raw = u16::from_le_bytes([pair[0], pair[1]]);
            let ms = raw as f64 * 1000.0 / 1024.0;
            if (MIN_PLAUSIBLE_RR_MS..=MAX_PLAUSIBLE_RR_MS).contains(&ms) {
                Some(ms)
            } else {
                log::trace!("dropping implausible interval {:.1} ms", ms);
                None
            }
        })
        .collect()
}
