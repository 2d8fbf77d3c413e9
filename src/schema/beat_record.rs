//! pulse.beat_record.v1 schema definition
//!
//! One record per sensor notification. A record carries either the raw
//! heart-rate-measurement payload as hex, or already-decoded values.

use crate::decoder::PacketDecoder;
use crate::error::ComputeError;
use crate::types::{BeatSample, SensorContact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "pulse.beat_record.v1";

/// A single recorded notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatRecord {
    /// Receipt time
    pub timestamp: DateTime<Utc>,
    /// Raw payload bytes as hex, e.g. "1048e803"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_hex: Option<String>,
    /// Decoded heart rate, when no payload is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate_bpm: Option<u16>,
    /// Decoded intervals (ms), when no payload is given
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rr_intervals_ms: Vec<f64>,
}

impl BeatRecord {
    /// Record from already-decoded values
    pub fn decoded(timestamp: DateTime<Utc>, heart_rate_bpm: u16, rr_intervals_ms: Vec<f64>) -> Self {
        Self {
            timestamp,
            payload_hex: None,
            heart_rate_bpm: Some(heart_rate_bpm),
            rr_intervals_ms,
        }
    }

    /// Convert to a sample, decoding the payload when present
    pub fn to_sample(&self) -> Result<BeatSample, ComputeError> {
        if let Some(hex) = &self.payload_hex {
            let payload = decode_hex(hex)?;
            return PacketDecoder::decode(&payload, self.timestamp);
        }
        if self.heart_rate_bpm.is_none() && self.rr_intervals_ms.is_empty() {
            return Err(ComputeError::ParseError(format!(
                "record at {} has neither payload nor values",
                self.timestamp
            )));
        }
        Ok(BeatSample {
            timestamp: self.timestamp,
            heart_rate_bpm: self.heart_rate_bpm.unwrap_or(0),
            rr_intervals_ms: self.rr_intervals_ms.clone(),
            sensor_contact: SensorContact::NotSupported,
            energy_expended_kj: None,
        })
    }
}

/// Parse newline-delimited records, skipping blank lines
pub fn parse_ndjson(input: &str) -> Result<Vec<BeatRecord>, ComputeError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<BeatRecord>(line)
                .map_err(|e| ComputeError::ParseError(format!("line {}: {}", idx + 1, e)))
        })
        .collect()
}

/// Order records by timestamp for replay. Records sharing a timestamp
/// keep their input order.
pub fn sort_for_replay(records: &mut [BeatRecord]) {
    records.sort_by_key(|r| r.timestamp);
}

/// Decode a hex string (whitespace and an optional 0x prefix allowed)
pub fn decode_hex(hex: &str) -> Result<Vec<u8>, ComputeError> {
    let cleaned: String = hex
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if let Some(bad) = cleaned.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ComputeError::ParseError(format!(
            "hex payload contains non-hex character: {:?}",
            bad
        )));
    }
    if cleaned.len() % 2 != 0 {
        return Err(ComputeError::ParseError(format!(
            "hex payload has odd length: {}",
            cleaned.len()
        )));
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|_| ComputeError::ParseError(format!("invalid hex byte: {}", &cleaned[i..i + 2])))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("10 48 E8 03").unwrap(), vec![0x10, 0x48, 0xe8, 0x03]);
        assert_eq!(decode_hex("0x0a").unwrap(), vec![0x0a]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }

    #[test]
    fn test_decode_hex_rejects_sign_characters() {
        assert!(matches!(decode_hex("+1"), Err(ComputeError::ParseError(_))));
        assert!(matches!(decode_hex("10+f"), Err(ComputeError::ParseError(_))));
        assert!(matches!(decode_hex("-1"), Err(ComputeError::ParseError(_))));
        assert!(decode_hex("é0").is_err());
    }

    #[test]
    fn test_sort_for_replay_is_stable() {
        let input = concat!(
            "{\"timestamp\":\"2024-03-01T23:00:02Z\",\"heart_rate_bpm\":60}\n",
            "{\"timestamp\":\"2024-03-01T23:00:01Z\",\"heart_rate_bpm\":61}\n",
            "{\"timestamp\":\"2024-03-01T23:00:02Z\",\"heart_rate_bpm\":62}\n",
            "{\"timestamp\":\"2024-03-01T23:00:00Z\",\"heart_rate_bpm\":63}\n",
        );
        let mut records = parse_ndjson(input).unwrap();
        sort_for_replay(&mut records);

        let order: Vec<Option<u16>> = records.iter().map(|r| r.heart_rate_bpm).collect();
        assert_eq!(order, vec![Some(63), Some(61), Some(60), Some(62)]);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_payload_record_is_decoded() {
        let line = r#"{"timestamp":"2024-03-01T23:00:00Z","payload_hex":"104800040004"}"#;
        let records = parse_ndjson(line).unwrap();
        let sample = records[0].to_sample().unwrap();
        assert_eq!(sample.heart_rate_bpm, 72);
        // 1024/1024 s -> 1000 ms
        assert_eq!(sample.rr_intervals_ms, vec![1000.0, 1000.0]);
    }

    #[test]
    fn test_decoded_record() {
        let input = "\n{\"timestamp\":\"2024-03-01T23:00:01Z\",\"heart_rate_bpm\":58,\"rr_intervals_ms\":[1030.0]}\n\n";
        let records = parse_ndjson(input).unwrap();
        assert_eq!(records.len(), 1);
        let sample = records[0].to_sample().unwrap();
        assert_eq!(sample.heart_rate_bpm, 58);
        assert_eq!(sample.sensor_contact, SensorContact::NotSupported);
        assert_eq!(
            sample.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 1).unwrap()
        );
    }

    #[test]
    fn test_empty_record_rejected() {
        let record = BeatRecord {
            timestamp: Utc::now(),
            payload_hex: None,
            heart_rate_bpm: None,
            rr_intervals_ms: Vec::new(),
        };
        assert!(matches!(record.to_sample(), Err(ComputeError::ParseError(_))));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let input = "{\"timestamp\":\"2024-03-01T23:00:01Z\",\"heart_rate_bpm\":58}\nnot json";
        match parse_ndjson(input) {
            Err(ComputeError::ParseError(msg)) => assert!(msg.starts_with("line 2")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
