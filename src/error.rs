//! Error types for Synheart Pulse
//!
//! Most of the analytics core degrades to "no result" (`Option`) rather than
//! failing. These errors only surface at the edges: payload decoding,
//! configuration loading and ingestion into a finished session.

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Malformed sensor payload: {0}")]
    MalformedInput(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No usable baseline: heart rate and RMSSD must be positive")]
    NoBaseline,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Monitoring session already stopped")]
    SessionStopped,

    #[error("Storage error: {0}")]
    StorageError(String),
}
