//! Notification channel
//!
//! The pipeline publishes immutable [`MonitorEvent`] values to an injected
//! [`EventSink`]. Publishing never blocks the producing path.

use crate::types::{DataGap, SleepPhase, StressEvent, StressSeverity, Timeslice};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Signals published by a monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// The classified sleep phase differs from the last published one
    PhaseChanged {
        at: DateTime<Utc>,
        from: Option<SleepPhase>,
        to: SleepPhase,
    },
    DeepSleepDetected {
        at: DateTime<Utc>,
        heart_rate_bpm: f64,
        rmssd: f64,
    },
    /// A stress episode was confirmed outside the alert cooldown
    StressAlert {
        at: DateTime<Utc>,
        severity: StressSeverity,
        rmssd_ratio: f64,
        hr_elevation: f64,
    },
    StressEpisodeEnded { event: StressEvent },
    TimesliceRecorded { timeslice: Box<Timeslice> },
    GapOpened { start: DateTime<Utc> },
    GapClosed { gap: DataGap },
    BufferFlushed { len: usize },
    SessionCompleted {
        session_id: Uuid,
        ended_at: DateTime<Utc>,
    },
}

impl MonitorEvent {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorEvent::PhaseChanged { .. } => "phase_changed",
            MonitorEvent::DeepSleepDetected { .. } => "deep_sleep_detected",
            MonitorEvent::StressAlert { .. } => "stress_alert",
            MonitorEvent::StressEpisodeEnded { .. } => "stress_episode_ended",
            MonitorEvent::TimesliceRecorded { .. } => "timeslice_recorded",
            MonitorEvent::GapOpened { .. } => "gap_opened",
            MonitorEvent::GapClosed { .. } => "gap_closed",
            MonitorEvent::BufferFlushed { .. } => "buffer_flushed",
            MonitorEvent::SessionCompleted { .. } => "session_completed",
        }
    }
}

/// Receiver of pipeline events
pub trait EventSink: Send + Sync {
    /// Deliver an event. Must return without waiting on the consumer.
    fn publish(&self, event: MonitorEvent);
}

/// Forwards events into an unbounded channel
#[derive(Debug)]
pub struct ChannelSink {
    tx: Mutex<Sender<MonitorEvent>>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn new() -> (Self, Receiver<MonitorEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: MonitorEvent) {
        let kind = event.kind();
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if tx.send(event).is_err() {
            log::debug!("event receiver dropped, {} discarded", kind);
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<MonitorEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything published so far
    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain collected events
    pub fn take(&self) -> Vec<MonitorEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for CollectingSink {
    fn publish(&self, event: MonitorEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: MonitorEvent) {}
}
