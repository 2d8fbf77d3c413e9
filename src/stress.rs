//! Stress episode detection
//!
//! A near-real-time state machine fed with short-window RMSSD and HR:
//!
//! ```text
//! calm --condition--> onset --sustained--> alerting
//!   ^                   |                     |
//!   +----normalized-----+-----normalized------+ (emits StressEvent)
//! ```
//!
//! The stress condition is RMSSD below 70% of baseline together with HR more
//! than 10% above baseline. Updates are ignored while the sleep-phase engine
//! reports sleep or when no baseline is set. The first update after sleep is
//! detected ends any episode in progress: a confirmed one closes at that
//! update, an unconfirmed onset is dropped.

use crate::config::StressConfig;
use crate::events::{EventSink, MonitorEvent};
use crate::sleep::SleepStateProvider;
use crate::types::{PhysiologicalBaseline, StressEvent, StressSeverity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Stress machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressState {
    Calm,
    /// Condition holds but has not lasted long enough
    Onset,
    /// Episode confirmed
    Alerting,
}

/// Severity from the RMSSD ratio and HR elevation at confirmation
pub fn stress_severity(rmssd_ratio: f64, hr_elevation: f64) -> StressSeverity {
    if rmssd_ratio < 0.60 {
        StressSeverity::High
    } else if rmssd_ratio < 0.70 && hr_elevation > 0.15 {
        StressSeverity::High
    } else if rmssd_ratio < 0.70 {
        StressSeverity::Moderate
    } else {
        StressSeverity::Mild
    }
}

/// Stress state machine
pub struct StressMonitor {
    config: StressConfig,
    baseline: Option<PhysiologicalBaseline>,
    sleep_state: Arc<dyn SleepStateProvider>,
    events: Arc<dyn EventSink>,
    state: StressState,
    onset_at: Option<DateTime<Utc>>,
    /// (HR, RMSSD) pairs collected since onset
    samples: Vec<(f64, f64)>,
    severity: Option<StressSeverity>,
    last_alert_at: Option<DateTime<Utc>>,
    completed: Vec<StressEvent>,
}

impl StressMonitor {
    pub fn new(
        config: StressConfig,
        sleep_state: Arc<dyn SleepStateProvider>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            baseline: None,
            sleep_state,
            events,
            state: StressState::Calm,
            onset_at: None,
            samples: Vec::new(),
            severity: None,
            last_alert_at: None,
            completed: Vec::new(),
        }
    }

    pub fn set_baseline(&mut self, baseline: PhysiologicalBaseline) {
        self.baseline = baseline.is_usable().then_some(baseline);
    }

    pub fn baseline(&self) -> Option<PhysiologicalBaseline> {
        self.baseline
    }

    /// Feed one metrics update. Returns the finished episode when this
    /// update closed one.
    pub fn update(&mut self, rmssd: f64, heart_rate: f64, now: DateTime<Utc>) -> Option<StressEvent> {
        if self.sleep_state.is_asleep() {
            return match self.state {
                StressState::Alerting => {
                    log::debug!("sleep detected, closing stress episode");
                    self.close_episode(now)
                }
                StressState::Onset => {
                    log::debug!("sleep detected, stress onset dropped");
                    self.reset();
                    None
                }
                StressState::Calm => {
                    log::trace!("stress update skipped: asleep");
                    None
                }
            };
        }
        let baseline = self.baseline?;

        let rmssd_ratio = rmssd / baseline.rmssd_ms;
        let hr_elevation = (heart_rate - baseline.heart_rate_bpm) / baseline.heart_rate_bpm;
        let stressed = rmssd_ratio < self.config.rmssd_drop_threshold
            && hr_elevation > self.config.hr_elevation_threshold;

        if !stressed {
            return match self.state {
                StressState::Alerting => self.close_episode(now),
                StressState::Onset => {
                    log::debug!("stress onset cleared before confirmation");
                    self.reset();
                    None
                }
                StressState::Calm => None,
            };
        }

        let onset = match self.onset_at {
            Some(onset) => onset,
            None => {
                log::debug!(
                    "stress onset: rmssd ratio {:.2}, hr elevation {:.2}",
                    rmssd_ratio,
                    hr_elevation
                );
                self.onset_at = Some(now);
                self.state = StressState::Onset;
                now
            }
        };
        self.samples.push((heart_rate, rmssd));

        let sustained = self.config.sustained_duration();
        if self.state == StressState::Onset && now - onset >= sustained {
            self.confirm(rmssd_ratio, hr_elevation, now);
        }
        None
    }

    fn confirm(&mut self, rmssd_ratio: f64, hr_elevation: f64, now: DateTime<Utc>) {
        let severity = stress_severity(rmssd_ratio, hr_elevation);
        self.state = StressState::Alerting;
        self.severity = Some(severity);

        let cooldown = self.config.cooldown();
        if let Some(last) = self.last_alert_at {
            if now - last < cooldown {
                log::debug!("stress confirmed ({}), alert suppressed by cooldown", severity.as_str());
                return;
            }
        }

        log::info!("stress confirmed: {}", severity.as_str());
        self.last_alert_at = Some(now);
        self.events.publish(MonitorEvent::StressAlert {
            at: now,
            severity,
            rmssd_ratio,
            hr_elevation,
        });
    }

    fn close_episode(&mut self, now: DateTime<Utc>) -> Option<StressEvent> {
        let onset = self.onset_at?;
        let severity = self.severity.unwrap_or(StressSeverity::Mild);
        let baseline_rmssd = self.baseline.map(|b| b.rmssd_ms).unwrap_or(0.0);

        let n = self.samples.len().max(1) as f64;
        let average_hr = self.samples.iter().map(|(hr, _)| hr).sum::<f64>() / n;
        let average_rmssd = self.samples.iter().map(|(_, rmssd)| rmssd).sum::<f64>() / n;

        let event = StressEvent {
            id: Uuid::new_v4(),
            timestamp: onset,
            duration_seconds: (now - onset).num_milliseconds() as f64 / 1000.0,
            average_hr,
            average_rmssd,
            baseline_rmssd,
            severity,
        };
        log::info!(
            "stress episode ended after {:.0}s ({})",
            event.duration_seconds,
            severity.as_str()
        );

        self.events.publish(MonitorEvent::StressEpisodeEnded {
            event: event.clone(),
        });
        self.completed.push(event.clone());
        self.reset();
        Some(event)
    }

    /// End of monitoring: a confirmed episode is closed normally, an
    /// unconfirmed onset is dropped.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<StressEvent> {
        match self.state {
            StressState::Alerting => self.close_episode(now),
            _ => {
                self.reset();
                None
            }
        }
    }

    fn reset(&mut self) {
        self.state = StressState::Calm;
        self.onset_at = None;
        self.samples.clear();
        self.severity = None;
    }

    pub fn state(&self) -> StressState {
        self.state
    }

    /// Episodes closed so far
    pub fn completed_events(&self) -> &[StressEvent] {
        &self.completed
    }

    pub fn last_alert_at(&self) -> Option<DateTime<Utc>> {
        self.last_alert_at
    }
}
