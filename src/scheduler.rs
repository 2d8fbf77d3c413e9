//! Tick scheduling and time sources
//!
//! The session depends on these traits rather than on timers and the wall
//! clock directly, so hosts and tests can drive ticks themselves.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// Callback run on every tick
pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// Periodic tick driver
pub trait TickScheduler: Send {
    /// Run `on_tick` every `period` until stopped. Restarting replaces the
    /// previous callback.
    fn start(&mut self, period: Duration, on_tick: TickCallback);

    /// Stop ticking. No callback runs after this returns.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ticks from a dedicated background thread
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    /// Stop flag and its wake-up signal
    signal: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn worker_thread(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|h| h.thread().id())
    }
}

impl TickScheduler for IntervalScheduler {
    fn start(&mut self, period: Duration, mut on_tick: TickCallback) {
        self.stop();

        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let worker_signal = Arc::clone(&signal);
        self.signal = signal;

        let handle = thread::spawn(move || {
            let (lock, cvar) = &*worker_signal;
            loop {
                let stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
                let (stopped, _) = cvar
                    .wait_timeout_while(stopped, period, |stopped| !*stopped)
                    .unwrap_or_else(PoisonError::into_inner);
                if *stopped {
                    break;
                }
                drop(stopped);
                on_tick();
            }
            log::trace!("tick thread exiting");
        });
        self.handle = Some(handle);
        log::debug!("interval scheduler started, period {:?}", period);
    }

    fn stop(&mut self) {
        let (lock, cvar) = &*self.signal;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();

        // A stop issued from inside a tick cannot join its own thread; the
        // loop exits once that tick returns.
        if self.worker_thread() == Some(thread::current().id()) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("tick thread panicked");
            }
            log::debug!("interval scheduler stopped");
        }
    }

    fn is_running(&self) -> bool {
        let (lock, _) = &*self.signal;
        self.handle.is_some() && !*lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Default)]
struct ManualState {
    callback: Option<TickCallback>,
    running: bool,
    period: Option<Duration>,
    fired: u64,
}

/// Scheduler whose ticks are fired explicitly. Clones share state, so a
/// test can keep one handle and give the other to a session.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the tick callback once. Returns false when not running.
    pub fn fire(&self) -> bool {
        let callback = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.running {
                return false;
            }
            state.callback.take()
        };
        let Some(mut callback) = callback else {
            return false;
        };

        callback();

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.fired += 1;
        if state.running && state.callback.is_none() {
            state.callback = Some(callback);
        }
        true
    }

    /// Period passed to the last `start`
    pub fn period(&self) -> Option<Duration> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .period
    }

    /// Number of ticks fired so far
    pub fn fired(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).fired
    }
}

impl TickScheduler for ManualScheduler {
    fn start(&mut self, period: Duration, on_tick: TickCallback) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.callback = Some(on_tick);
        state.running = true;
        state.period = Some(period);
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.running = false;
        state.callback = None;
    }

    fn is_running(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_manual_clock() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let shared = clock.clone();
        shared.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(5));
    }

    #[test]
    fn test_manual_scheduler_fires_only_while_running() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut scheduler = ManualScheduler::new();
        let handle = scheduler.clone();
        assert!(!handle.fire());

        let counter = Arc::clone(&count);
        scheduler.start(
            Duration::from_secs(300),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(handle.fire());
        assert!(handle.fire());
        assert_eq!(handle.period(), Some(Duration::from_secs(300)));

        scheduler.stop();
        assert!(!handle.fire());
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(handle.fired(), 2);
    }

    #[test]
    fn test_interval_scheduler_ticks_and_stops() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut scheduler = IntervalScheduler::new();
        let counter = Arc::clone(&count);
        scheduler.start(
            Duration::from_millis(5),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(scheduler.is_running());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        scheduler.stop();
        assert!(!scheduler.is_running());

        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 3);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_interval_scheduler_stop_is_idempotent() {
        let mut scheduler = IntervalScheduler::new();
        scheduler.stop();
        scheduler.start(Duration::from_secs(3600), Box::new(|| {}));
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
