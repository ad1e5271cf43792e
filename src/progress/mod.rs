//! Progress reporting for capture runs.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

/// How a capture run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Completed,
    Failed,
    Cancelled,
}

/// Receives progress updates from one capture run.
///
/// Calls arrive from the worker thread executing the run. The end value is an
/// estimate taken before the statistics query; the current value may pass it
/// or stop short of it.
pub trait ProgressSink: Send + Sync {
    fn set_start_value(&self, value: u64);

    fn set_end_value(&self, value: u64);

    fn set_current_value(&self, value: u64);

    /// Called at most once, after the last value update.
    fn inform_finished(&self, finish: Finish);
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_start_value(&self, _value: u64) {}

    fn set_end_value(&self, _value: u64) {}

    fn set_current_value(&self, _value: u64) {}

    fn inform_finished(&self, _finish: Finish) {}
}

const OUTCOME_COMPLETED: u8 = 1;
const OUTCOME_FAILED: u8 = 2;
const OUTCOME_CANCELLED: u8 = 3;

/// Keeps the latest values in atomics so another thread can poll them.
#[derive(Debug, Default)]
pub struct AtomicProgress {
    start: AtomicU64,
    end: AtomicU64,
    current: AtomicU64,
    finished: AtomicBool,
    outcome: AtomicU8,
}

impl AtomicProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) -> u64 {
        self.start.load(Ordering::Relaxed)
    }

    pub fn end(&self) -> u64 {
        self.end.load(Ordering::Relaxed)
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn finish(&self) -> Option<Finish> {
        match self.outcome.load(Ordering::Acquire) {
            OUTCOME_COMPLETED => Some(Finish::Completed),
            OUTCOME_FAILED => Some(Finish::Failed),
            OUTCOME_CANCELLED => Some(Finish::Cancelled),
            _ => None,
        }
    }

    /// Completed fraction in `[0.0, 1.0]`; `None` until an end value is known.
    pub fn fraction(&self) -> Option<f64> {
        let start = self.start();
        let end = self.end();
        if end <= start {
            return None;
        }
        let done = self.current().saturating_sub(start).min(end - start);
        Some(done as f64 / (end - start) as f64)
    }
}

impl ProgressSink for AtomicProgress {
    fn set_start_value(&self, value: u64) {
        self.start.store(value, Ordering::Relaxed);
    }

    fn set_end_value(&self, value: u64) {
        self.end.store(value, Ordering::Relaxed);
    }

    fn set_current_value(&self, value: u64) {
        self.current.store(value, Ordering::Relaxed);
    }

    fn inform_finished(&self, finish: Finish) {
        let outcome = match finish {
            Finish::Completed => OUTCOME_COMPLETED,
            Finish::Failed => OUTCOME_FAILED,
            Finish::Cancelled => OUTCOME_CANCELLED,
        };
        self.outcome.store(outcome, Ordering::Release);
        self.finished.store(true, Ordering::Release);
    }
}
