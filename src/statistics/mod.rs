use std::sync::atomic::{AtomicU64, Ordering};

/// Capture pipeline statistics
///
/// Shared by every run of a scheduler. Uses atomic counters for lock-free
/// updates; readers get a racy but consistent-enough view.
#[derive(Debug, Default)]
pub struct CaptureStatistics {
    // Runs
    pub captures_started: AtomicU64,
    pub captures_succeeded: AtomicU64,
    pub captures_failed: AtomicU64,
    pub captures_cancelled: AtomicU64,

    // Rows
    pub statements_captured: AtomicU64,
    pub metadata_lookups: AtomicU64,

    // Registry
    pub snapshots_overwritten: AtomicU64,

    pub capture_time_micros: AtomicU64,
}

impl CaptureStatistics {
    pub fn new() -> Self {
        CaptureStatistics::default()
    }

    #[inline]
    pub fn record_capture_started(&self) {
        self.captures_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_capture_succeeded(&self, statements: u64, time_micros: u64) {
        self.captures_succeeded.fetch_add(1, Ordering::Relaxed);
        self.statements_captured
            .fetch_add(statements, Ordering::Relaxed);
        self.capture_time_micros
            .fetch_add(time_micros, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_capture_failed(&self) {
        self.captures_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_capture_cancelled(&self) {
        self.captures_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_metadata_lookup(&self) {
        self.metadata_lookups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_snapshot_overwritten(&self) {
        self.snapshots_overwritten.fetch_add(1, Ordering::Relaxed);
    }

    pub fn captures_started(&self) -> u64 {
        self.captures_started.load(Ordering::Relaxed)
    }

    pub fn captures_succeeded(&self) -> u64 {
        self.captures_succeeded.load(Ordering::Relaxed)
    }

    pub fn captures_failed(&self) -> u64 {
        self.captures_failed.load(Ordering::Relaxed)
    }

    pub fn captures_cancelled(&self) -> u64 {
        self.captures_cancelled.load(Ordering::Relaxed)
    }

    pub fn statements_captured(&self) -> u64 {
        self.statements_captured.load(Ordering::Relaxed)
    }

    pub fn metadata_lookups(&self) -> u64 {
        self.metadata_lookups.load(Ordering::Relaxed)
    }

    pub fn snapshots_overwritten(&self) -> u64 {
        self.snapshots_overwritten.load(Ordering::Relaxed)
    }

    /// Runs that have started but not yet ended.
    pub fn captures_in_flight(&self) -> u64 {
        let ended =
            self.captures_succeeded() + self.captures_failed() + self.captures_cancelled();
        self.captures_started().saturating_sub(ended)
    }

    pub fn success_rate(&self) -> f64 {
        let succeeded = self.captures_succeeded() as f64;
        let ended =
            succeeded + self.captures_failed() as f64 + self.captures_cancelled() as f64;
        if ended > 0.0 { succeeded / ended } else { 0.0 }
    }

    pub fn avg_capture_time_ms(&self) -> f64 {
        let total_time = self.capture_time_micros.load(Ordering::Relaxed) as f64;
        let succeeded = self.captures_succeeded() as f64;
        if succeeded > 0.0 {
            total_time / succeeded / 1000.0
        } else {
            0.0
        }
    }

    pub fn avg_statements_per_capture(&self) -> f64 {
        let statements = self.statements_captured() as f64;
        let succeeded = self.captures_succeeded() as f64;
        if succeeded > 0.0 { statements / succeeded } else { 0.0 }
    }

    /// Reset all statistics to zero
    pub fn reset(&self) {
        self.captures_started.store(0, Ordering::Relaxed);
        self.captures_succeeded.store(0, Ordering::Relaxed);
        self.captures_failed.store(0, Ordering::Relaxed);
        self.captures_cancelled.store(0, Ordering::Relaxed);
        self.statements_captured.store(0, Ordering::Relaxed);
        self.metadata_lookups.store(0, Ordering::Relaxed);
        self.snapshots_overwritten.store(0, Ordering::Relaxed);
        self.capture_time_micros.store(0, Ordering::Relaxed);
    }

    /// Get a formatted statistics report
    pub fn report(&self) -> String {
        format!(
            "Capture Statistics:\n\
            \n\
            Runs:\n\
            - Started:       {}\n\
            - Succeeded:     {}\n\
            - Failed:        {}\n\
            - Cancelled:     {}\n\
            - Success rate:  {:.2}%\n\
            - Avg time:      {:.2} ms\n\
            \n\
            Statements:\n\
            - Captured:      {}\n\
            - Per capture:   {:.1}\n\
            - Lookups:       {}\n\
            \n\
            Registry:\n\
            - Overwritten:   {}",
            self.captures_started(),
            self.captures_succeeded(),
            self.captures_failed(),
            self.captures_cancelled(),
            self.success_rate() * 100.0,
            self.avg_capture_time_ms(),
            self.statements_captured(),
            self.avg_statements_per_capture(),
            self.metadata_lookups(),
            self.snapshots_overwritten(),
        )
    }
}
