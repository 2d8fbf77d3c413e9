//! Session orchestration
//!
//! A [`MonitoringSession`] wires the pipeline together for one monitoring
//! period:
//!
//! 1. Samples arrive on the ingest path: decode, buffer, coverage count and
//!    a throttled stress update from the trailing short window.
//! 2. The tick path runs on the injected scheduler: gap check, trailing
//!    window read and sleep-phase processing.
//! 3. `stop` finalizes everything into a [`SessionReport`].
//!
//! Both paths may run on different threads. The buffer is shared behind a
//! readers-writer lock; each state machine sits behind its own mutex and no
//! path holds two of them at once.

use crate::buffer::ContinuousBuffer;
use crate::conditioner::IntervalConditioner;
use crate::confidence::{self, ConfidenceInputs};
use crate::config::MonitorConfig;
use crate::coverage::CoverageTracker;
use crate::decoder::PacketDecoder;
use crate::error::ComputeError;
use crate::events::{EventSink, MonitorEvent};
use crate::metrics::time_domain;
use crate::scheduler::{Clock, IntervalScheduler, SystemClock, TickScheduler};
use crate::sleep::{SleepPhaseEngine, SleepSessionSummary};
use crate::stress::{StressMonitor, StressState};
use crate::types::{
    BeatSample, ConfidenceResult, CoverageReport, DailySummary, PhysiologicalBaseline, SleepPhase,
    StressEvent, Timeslice,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Fewest clean intervals a stress update is computed from
const MIN_STRESS_INTERVALS: usize = 10;

/// Everything a finished session produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub baseline: Option<PhysiologicalBaseline>,
    pub sleep: SleepSessionSummary,
    pub timeslices: Vec<Timeslice>,
    pub stress_events: Vec<StressEvent>,
    pub coverage: CoverageReport,
    pub confidence: ConfidenceResult,
    pub disconnects: u32,
}

impl SessionReport {
    /// Daily row for `date`, built from the session's timeslices. Baseline
    /// fields are left empty for `BaselineStore::contextualize`.
    pub fn to_daily_summary(&self, date: NaiveDate) -> Result<DailySummary, ComputeError> {
        if self.timeslices.is_empty() {
            return Err(ComputeError::InsufficientData(
                "session recorded no timeslices".to_string(),
            ));
        }
        let n = self.timeslices.len() as f64;
        let rmssd = self.timeslices.iter().map(|t| t.metrics.rmssd).sum::<f64>() / n;
        let sdnn = self.timeslices.iter().map(|t| t.metrics.sdnn).sum::<f64>() / n;
        let mean_hr = self
            .timeslices
            .iter()
            .map(|t| t.heart_rate.mean_bpm)
            .sum::<f64>()
            / n;
        let min_hr = self
            .timeslices
            .iter()
            .map(|t| t.heart_rate.min_bpm)
            .fold(f64::INFINITY, f64::min);
        let max_hr = self
            .timeslices
            .iter()
            .map(|t| t.heart_rate.max_bpm)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut summary = DailySummary::new(date, rmssd, sdnn, mean_hr, min_hr, max_hr);
        summary.sleep = self.sleep.breakdown.clone();
        Ok(summary)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Ingest-path bookkeeping
#[derive(Debug, Default)]
struct SessionCounters {
    started_at: Option<DateTime<Utc>>,
    hr_history: Vec<f64>,
    disconnects: u32,
    last_stress_update: Option<DateTime<Utc>>,
}

/// State shared between the session handle and the tick callback
struct SessionCore {
    id: Uuid,
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    buffer: ContinuousBuffer<BeatSample>,
    stress_conditioner: IntervalConditioner,
    sleep: Mutex<SleepPhaseEngine>,
    stress: Mutex<StressMonitor>,
    coverage: Mutex<CoverageTracker>,
    counters: Mutex<SessionCounters>,
    stopped: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Start of the trailing window `span` long ending at `now`
fn window_start(now: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl SessionCore {
    fn ingest(&self, sample: BeatSample) -> Result<(), ComputeError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ComputeError::SessionStopped);
        }
        let now = self.clock.now();
        let heart_rate = sample.heart_rate_bpm;

        if let Some(len) = self.buffer.push(sample) {
            self.events.publish(MonitorEvent::BufferFlushed { len });
        }

        // A late sample after silence both opens and closes its gap
        let (opened, closed) = {
            let mut coverage = lock(&self.coverage);
            let opened = coverage.check_for_gap(now);
            (opened, coverage.record_samples(1, now))
        };
        if let Some(start) = opened {
            self.events.publish(MonitorEvent::GapOpened { start });
        }
        if let Some(gap) = closed {
            self.events.publish(MonitorEvent::GapClosed { gap });
        }

        if heart_rate > 0 {
            lock(&self.counters).hr_history.push(heart_rate as f64);
        }

        self.update_stress(now);
        Ok(())
    }

    /// Near-real-time stress update, at most once per update interval
    fn update_stress(&self, now: DateTime<Utc>) {
        let interval = self.config.stress.update_interval();
        if let Some(last) = lock(&self.counters).last_stress_update {
            if now - last < interval {
                return;
            }
        }

        let since = window_start(now, self.config.stress.window());
        let samples = self.buffer.items_since(since);
        let raw: Vec<f64> = samples
            .iter()
            .flat_map(|s| s.rr_intervals_ms.iter().copied())
            .collect();
        let window = self.stress_conditioner.condition(&raw);
        if !window.is_valid {
            log::trace!("stress update deferred: {} intervals in window", raw.len());
            return;
        }

        let rmssd = time_domain::rmssd(&window.clean_intervals);
        let hr_values: Vec<f64> = samples
            .iter()
            .filter(|s| s.heart_rate_bpm > 0)
            .map(|s| s.heart_rate_bpm as f64)
            .collect();
        let heart_rate = if hr_values.is_empty() {
            60_000.0 / time_domain::mean_rr(&window.clean_intervals)
        } else {
            hr_values.iter().sum::<f64>() / hr_values.len() as f64
        };

        lock(&self.counters).last_stress_update = Some(now);
        lock(&self.stress).update(rmssd, heart_rate, now);
    }

    fn tick(&self) -> Option<Timeslice> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        let now = self.clock.now();

        let opened = lock(&self.coverage).check_for_gap(now);
        if let Some(start) = opened {
            self.events.publish(MonitorEvent::GapOpened { start });
        }

        let window_start = window_start(now, self.config.sleep.window_duration());
        let samples = self.buffer.items_since(window_start);
        let raw: Vec<f64> = samples
            .iter()
            .flat_map(|s| s.rr_intervals_ms.iter().copied())
            .collect();
        let hr: Vec<f64> = samples
            .iter()
            .filter(|s| s.heart_rate_bpm > 0)
            .map(|s| s.heart_rate_bpm as f64)
            .collect();

        lock(&self.sleep).process_window(window_start, now, &raw, &hr)
    }

    fn finalize(&self) -> SessionReport {
        let now = self.clock.now();

        lock(&self.stress).finish(now);
        let coverage = lock(&self.coverage).stop_tracking(now);
        let (sleep, timeslices, transitions, baseline) = {
            let engine = lock(&self.sleep);
            (
                engine.summary(),
                engine.timeslices().to_vec(),
                engine.phase_transitions(),
                engine.baseline(),
            )
        };
        let stress_events = lock(&self.stress).completed_events().to_vec();

        let counters = lock(&self.counters);
        let started_at = counters.started_at.unwrap_or(now);
        let session_hours = (now - started_at).num_milliseconds() as f64 / 3_600_000.0;
        let confidence = confidence::score(&ConfidenceInputs {
            disconnects: counters.disconnects,
            session_hours,
            coverage_percent: coverage.coverage_percent,
            hr_samples: counters.hr_history.clone(),
            state_transitions: transitions as u32,
        });

        SessionReport {
            session_id: self.id,
            started_at,
            ended_at: now,
            baseline,
            sleep,
            timeslices,
            stress_events,
            coverage,
            confidence,
            disconnects: counters.disconnects,
        }
    }
}

/// One continuous monitoring period
pub struct MonitoringSession {
    core: Arc<SessionCore>,
    scheduler: Mutex<Box<dyn TickScheduler>>,
    report: Mutex<Option<SessionReport>>,
}

impl MonitoringSession {
    /// Create a session with injected time, scheduling and event delivery
    pub fn new(
        config: MonitorConfig,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn TickScheduler>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, ComputeError> {
        Self::build(config, clock, scheduler, events, None)
    }

    /// Like [`MonitoringSession::new`], additionally sending each buffer
    /// flush snapshot (taken before trimming) on `flush_tx`
    pub fn with_flush_channel(
        config: MonitorConfig,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn TickScheduler>,
        events: Arc<dyn EventSink>,
        flush_tx: Sender<Vec<BeatSample>>,
    ) -> Result<Self, ComputeError> {
        Self::build(config, clock, scheduler, events, Some(flush_tx))
    }

    fn build(
        config: MonitorConfig,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn TickScheduler>,
        events: Arc<dyn EventSink>,
        flush_tx: Option<Sender<Vec<BeatSample>>>,
    ) -> Result<Self, ComputeError> {
        config.validate()?;

        let mut buffer = ContinuousBuffer::new(&config.buffer);
        if let Some(tx) = flush_tx {
            buffer = buffer.with_flush_channel(tx);
        }

        let sleep = SleepPhaseEngine::new(&config, Arc::clone(&events));
        let stress = StressMonitor::new(
            config.stress.clone(),
            Arc::new(sleep.phase_cell()),
            Arc::clone(&events),
        );

        let core = SessionCore {
            id: Uuid::new_v4(),
            buffer,
            stress_conditioner: IntervalConditioner::new(
                config.conditioning.clone(),
                MIN_STRESS_INTERVALS,
            ),
            coverage: Mutex::new(CoverageTracker::new(config.coverage.clone())),
            sleep: Mutex::new(sleep),
            stress: Mutex::new(stress),
            counters: Mutex::new(SessionCounters::default()),
            stopped: AtomicBool::new(false),
            config,
            clock,
            events,
        };

        Ok(Self {
            core: Arc::new(core),
            scheduler: Mutex::new(scheduler),
            report: Mutex::new(None),
        })
    }

    /// Session on the wall clock with a background tick thread
    pub fn with_system_clock(
        config: MonitorConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, ComputeError> {
        Self::new(
            config,
            Arc::new(SystemClock),
            Box::new(IntervalScheduler::new()),
            events,
        )
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    /// Begin coverage tracking and periodic ticks
    pub fn start(&self) -> Result<(), ComputeError> {
        if self.is_stopped() {
            return Err(ComputeError::SessionStopped);
        }
        let now = self.core.clock.now();
        lock(&self.core.coverage).start_tracking(now);
        lock(&self.core.counters).started_at = Some(now);

        let period = std::time::Duration::from_secs(self.core.config.sleep.tick_interval_secs);
        let core = Arc::clone(&self.core);
        lock(&self.scheduler).start(
            period,
            Box::new(move || {
                core.tick();
            }),
        );
        log::info!("monitoring session {} started", self.core.id);
        Ok(())
    }

    /// Install the personal baseline for sleep and stress scoring.
    ///
    /// A baseline without a positive heart rate and RMSSD is rejected with
    /// [`ComputeError::NoBaseline`] and any earlier baseline stays in place.
    pub fn set_baseline(&self, baseline: PhysiologicalBaseline) -> Result<(), ComputeError> {
        if !baseline.is_usable() {
            return Err(ComputeError::NoBaseline);
        }
        lock(&self.core.sleep).set_baseline(baseline);
        lock(&self.core.stress).set_baseline(baseline);
        Ok(())
    }

    /// Decode a raw payload received now and ingest it
    pub fn ingest_payload(&self, payload: &[u8]) -> Result<BeatSample, ComputeError> {
        if self.is_stopped() {
            return Err(ComputeError::SessionStopped);
        }
        let sample = PacketDecoder::decode(payload, self.core.clock.now())?;
        self.core.ingest(sample.clone())?;
        Ok(sample)
    }

    pub fn ingest_sample(&self, sample: BeatSample) -> Result<(), ComputeError> {
        self.core.ingest(sample)
    }

    /// Run one processing tick immediately
    pub fn tick(&self) -> Option<Timeslice> {
        self.core.tick()
    }

    /// Count a transport disconnect
    pub fn record_disconnect(&self) {
        lock(&self.core.counters).disconnects += 1;
        log::debug!("sensor disconnect recorded");
    }

    /// Finish the session.
    ///
    /// Idempotent: later calls return the same report. On return no further
    /// tick runs, open gaps are closed and a confirmed stress episode has
    /// been closed as a regular episode.
    pub fn stop(&self) -> SessionReport {
        let mut cached = lock(&self.report);
        if let Some(report) = cached.as_ref() {
            return report.clone();
        }

        self.core.stopped.store(true, Ordering::SeqCst);
        lock(&self.scheduler).stop();

        let report = self.core.finalize();
        self.core.events.publish(MonitorEvent::SessionCompleted {
            session_id: report.session_id,
            ended_at: report.ended_at,
        });
        log::info!(
            "monitoring session {} stopped: {} timeslices, {} stress events, confidence {}",
            report.session_id,
            report.timeslices.len(),
            report.stress_events.len(),
            report.confidence.score
        );

        *cached = Some(report.clone());
        report
    }

    pub fn is_stopped(&self) -> bool {
        self.core.stopped.load(Ordering::SeqCst)
    }

    pub fn current_phase(&self) -> Option<SleepPhase> {
        lock(&self.core.sleep).current_phase()
    }

    pub fn stress_state(&self) -> StressState {
        lock(&self.core.stress).state()
    }

    /// Non-destructive coverage report
    pub fn coverage_snapshot(&self) -> CoverageReport {
        lock(&self.core.coverage).snapshot(self.core.clock.now())
    }

    pub fn timeslices(&self) -> Vec<Timeslice> {
        lock(&self.core.sleep).timeslices().to_vec()
    }

    /// Samples currently held in the continuous buffer
    pub fn buffered_samples(&self) -> Vec<BeatSample> {
        self.core.buffer.items()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingSink, NullSink};
    use crate::scheduler::{ManualClock, ManualScheduler};
    use crate::types::SensorContact;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;

    struct Harness {
        session: MonitoringSession,
        clock: ManualClock,
        ticks: ManualScheduler,
        sink: Arc<CollectingSink>,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap()
    }

    fn harness() -> Harness {
        let clock = ManualClock::new(t0());
        let ticks = ManualScheduler::new();
        let sink = Arc::new(CollectingSink::new());
        let session = MonitoringSession::new(
            MonitorConfig::default(),
            Arc::new(clock.clone()),
            Box::new(ticks.clone()),
            sink.clone(),
        )
        .unwrap();
        Harness {
            session,
            clock,
            ticks,
            sink,
        }
    }

    fn sample(at: DateTime<Utc>, hr: u16, rr: &[f64]) -> BeatSample {
        BeatSample {
            timestamp: at,
            heart_rate_bpm: hr,
            rr_intervals_ms: rr.to_vec(),
            sensor_contact: SensorContact::Detected,
            energy_expended_kj: None,
        }
    }

    /// One sample per second for `secs` seconds with alternating intervals
    fn feed(h: &Harness, secs: i64, hr: u16, mean_rr: f64, rmssd: f64) {
        for i in 0..secs {
            h.clock.advance(Duration::seconds(1));
            let rr = if i % 2 == 0 { mean_rr - rmssd / 2.0 } else { mean_rr + rmssd / 2.0 };
            h.session.ingest_sample(sample(h.clock.now(), hr, &[rr])).unwrap();
        }
    }

    #[test]
    fn test_tick_produces_timeslice() {
        let h = harness();
        h.session.start().unwrap();
        h.session.set_baseline(PhysiologicalBaseline::new(60.0, 40.0)).unwrap();

        feed(&h, 300, 48, 1250.0, 48.0);
        assert!(h.ticks.fire());

        let slices = h.session.timeslices();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].phase, SleepPhase::Deep);
        assert_eq!(h.session.current_phase(), Some(SleepPhase::Deep));
    }

    #[test]
    fn test_tick_without_enough_data_is_skipped() {
        let h = harness();
        h.session.start().unwrap();
        h.session.set_baseline(PhysiologicalBaseline::new(60.0, 40.0)).unwrap();
        feed(&h, 20, 60, 1000.0, 30.0);
        assert!(h.session.tick().is_none());
        assert!(h.session.timeslices().is_empty());
    }

    #[test]
    fn test_stop_is_idempotent_and_halts_ticks() {
        let h = harness();
        h.session.start().unwrap();
        feed(&h, 10, 60, 1000.0, 30.0);

        let first = h.session.stop();
        let second = h.session.stop();
        assert_eq!(first, second);
        assert!(!h.ticks.fire());
        assert!(matches!(
            h.session.ingest_sample(sample(h.clock.now(), 60, &[1000.0])),
            Err(ComputeError::SessionStopped)
        ));

        let completed = h
            .sink
            .events()
            .iter()
            .filter(|e| matches!(e, MonitorEvent::SessionCompleted { .. }))
            .count();
        assert_eq!(completed, 1);
    }

    #[test]
    fn test_gap_closed_by_late_sample() {
        let h = harness();
        h.session.start().unwrap();
        feed(&h, 5, 60, 1000.0, 30.0);
        h.clock.advance(Duration::seconds(90));
        h.session
            .ingest_sample(sample(h.clock.now(), 60, &[1000.0]))
            .unwrap();

        let report = h.session.coverage_snapshot();
        assert_eq!(report.gap_count, 1);
        assert!((report.longest_gap_seconds - 90.0).abs() < 1e-9);
        let kinds: Vec<&str> = h
            .sink
            .events()
            .iter()
            .map(MonitorEvent::kind)
            .filter(|k| k.starts_with("gap"))
            .collect();
        assert_eq!(kinds, vec!["gap_opened", "gap_closed"]);
    }

    #[test]
    fn test_stop_closes_open_gap_and_stress_episode() {
        let h = harness();
        h.session.start().unwrap();
        h.session.set_baseline(PhysiologicalBaseline::new(60.0, 50.0)).unwrap();

        // RMSSD 30 at HR 70: stressed, awake
        feed(&h, 400, 70, 857.0, 30.0);
        assert_eq!(h.session.stress_state(), StressState::Alerting);

        h.clock.advance(Duration::seconds(120));
        let slice = h.session.tick().unwrap();
        assert_eq!(slice.phase, SleepPhase::Awake);

        let report = h.session.stop();
        assert_eq!(report.stress_events.len(), 1);
        assert_eq!(report.coverage.gap_count, 1);
        assert!((report.coverage.longest_gap_seconds - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_daily_summary_from_report() {
        let h = harness();
        h.session.start().unwrap();
        h.session.set_baseline(PhysiologicalBaseline::new(60.0, 40.0)).unwrap();
        for _ in 0..3 {
            feed(&h, 300, 48, 1250.0, 48.0);
            h.ticks.fire();
        }
        let report = h.session.stop();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let summary = report.to_daily_summary(date).unwrap();
        assert!((summary.rmssd - 48.0).abs() < 1e-9);
        assert!((summary.mean_hr - 48.0).abs() < 1e-9);
        assert!((summary.sleep.deep_minutes - 15.0).abs() < 1e-9);
        assert!(summary.baseline_7d.is_none());
    }

    #[test]
    fn test_empty_report_has_no_daily_summary() {
        let h = harness();
        h.session.start().unwrap();
        let report = h.session.stop();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(matches!(
            report.to_daily_summary(date),
            Err(ComputeError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_malformed_payload_is_rejected_without_state_change() {
        let h = harness();
        h.session.start().unwrap();
        assert!(matches!(
            h.session.ingest_payload(&[]),
            Err(ComputeError::MalformedInput(_))
        ));
        assert!(h.session.buffered_samples().is_empty());

        let sample = h.session.ingest_payload(&[0x10, 60, 0x00, 0x04]).unwrap();
        assert_eq!(sample.heart_rate_bpm, 60);
        assert_eq!(h.session.buffered_samples().len(), 1);
    }

    #[test]
    fn test_unusable_baseline_is_rejected() {
        let h = harness();
        h.session.start().unwrap();
        h.session.set_baseline(PhysiologicalBaseline::new(60.0, 40.0)).unwrap();

        assert!(matches!(
            h.session.set_baseline(PhysiologicalBaseline::new(60.0, 0.0)),
            Err(ComputeError::NoBaseline)
        ));
        assert!(matches!(
            h.session.set_baseline(PhysiologicalBaseline::new(f64::NAN, 40.0)),
            Err(ComputeError::NoBaseline)
        ));

        let report = h.session.stop();
        assert_eq!(report.baseline, Some(PhysiologicalBaseline::new(60.0, 40.0)));
    }

    #[test]
    fn test_flush_channel_receives_buffered_samples() {
        let mut config = MonitorConfig::default();
        config.buffer.capacity = 10;
        config.buffer.flush_threshold = 0.8;
        let clock = ManualClock::new(t0());
        let (tx, rx) = mpsc::channel();
        let session = MonitoringSession::with_flush_channel(
            config,
            Arc::new(clock.clone()),
            Box::new(ManualScheduler::new()),
            Arc::new(NullSink),
            tx,
        )
        .unwrap();
        session.start().unwrap();

        let mut sent = Vec::new();
        for i in 0..8u16 {
            clock.advance(Duration::seconds(1));
            let s = sample(clock.now(), 60 + i, &[1000.0]);
            sent.push(s.clone());
            session.ingest_sample(s).unwrap();
            if i < 7 {
                assert!(rx.try_recv().is_err());
            }
        }

        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot, sent);
        // The flush does not drain the buffer
        assert_eq!(session.buffered_samples(), sent);
    }

    #[test]
    fn test_oversized_window_rejected_at_construction() {
        let config = MonitorConfig::from_json(r#"{"stress":{"window_secs":10000000000000}}"#);
        assert!(matches!(config, Err(ComputeError::InvalidConfig(_))));

        let mut config = MonitorConfig::default();
        config.sleep.window_duration_secs = u64::MAX;
        let result = MonitoringSession::new(
            config,
            Arc::new(ManualClock::new(t0())),
            Box::new(ManualScheduler::new()),
            Arc::new(CollectingSink::new()),
        );
        assert!(matches!(result, Err(ComputeError::InvalidConfig(_))));
    }

    #[test]
    fn test_window_start_saturates() {
        let start = window_start(t0(), Duration::days(365_000_000));
        assert_eq!(start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            window_start(t0(), Duration::seconds(60)),
            t0() - Duration::seconds(60)
        );
    }
}
