//! Synheart Pulse - On-device HRV analytics for continuous beat-interval streams
//!
//! Pulse turns heart-rate-measurement notifications into physiological state
//! through a deterministic pipeline: packet decoding → interval conditioning
//! → HRV metrics → sleep-phase and stress state machines → session report.
//!
//! ## Modules
//!
//! - **Streaming**: [`MonitoringSession`] buffers samples, tracks coverage and
//!   runs the sleep and stress machines on an injected clock and scheduler
//! - **Daily**: [`BaselineStore`] contextualizes per-day summaries against
//!   rolling 7 and 30 day baselines

pub mod baseline;
pub mod buffer;
pub mod conditioner;
pub mod confidence;
pub mod config;
pub mod coverage;
pub mod decoder;
pub mod error;
pub mod events;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod schema;
pub mod sleep;
pub mod storage;
pub mod stress;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use baseline::BaselineStore;
pub use config::MonitorConfig;
pub use decoder::PacketDecoder;
pub use error::ComputeError;
pub use events::{EventSink, MonitorEvent};
pub use metrics::HrvAnalyzer;
pub use pipeline::{MonitoringSession, SessionReport};
pub use scheduler::{Clock, IntervalScheduler, ManualClock, ManualScheduler, SystemClock, TickScheduler};
pub use storage::{MemoryStore, SummaryStore};

// Schema exports
pub use schema::{BeatRecord, SCHEMA_VERSION};

/// Pulse version embedded in reports and CLI output
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "synheart-pulse";
