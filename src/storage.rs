//! Storage collaborator
//!
//! The pipeline hands finished values to a [`SummaryStore`] and reads date
//! ordered daily history back for baselining. Durability is the store's
//! concern; [`MemoryStore`] keeps everything in process.

use crate::error::ComputeError;
use crate::pipeline::SessionReport;
use crate::types::{DailySummary, StressEvent};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Persistence interface for finished records
pub trait SummaryStore: Send + Sync {
    /// Insert or replace the row for `summary.date`
    fn save_daily_summary(&self, summary: DailySummary) -> Result<(), ComputeError>;

    fn save_stress_event(&self, event: StressEvent) -> Result<(), ComputeError>;

    fn save_session_report(&self, report: SessionReport) -> Result<(), ComputeError>;

    /// Summaries with `from <= date <= to`, oldest first
    fn daily_summaries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailySummary>, ComputeError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    daily: Mutex<BTreeMap<NaiveDate, DailySummary>>,
    stress_events: Mutex<Vec<StressEvent>>,
    reports: Mutex<Vec<SessionReport>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stress_events(&self) -> Vec<StressEvent> {
        lock(&self.stress_events).clone()
    }

    pub fn session_reports(&self) -> Vec<SessionReport> {
        lock(&self.reports).clone()
    }
}

impl SummaryStore for MemoryStore {
    fn save_daily_summary(&self, summary: DailySummary) -> Result<(), ComputeError> {
        lock(&self.daily).insert(summary.date, summary);
        Ok(())
    }

    fn save_stress_event(&self, event: StressEvent) -> Result<(), ComputeError> {
        lock(&self.stress_events).push(event);
        Ok(())
    }

    fn save_session_report(&self, report: SessionReport) -> Result<(), ComputeError> {
        lock(&self.reports).push(report);
        Ok(())
    }

    fn daily_summaries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailySummary>, ComputeError> {
        if from > to {
            return Err(ComputeError::StorageError(format!(
                "empty date range {} to {}",
                from, to
            )));
        }
        Ok(lock(&self.daily).range(from..=to).map(|(_, s)| s.clone()).collect())
    }
}
