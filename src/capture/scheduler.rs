use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};

use super::{CancellationToken, CaptureOptions, SnapshotCapture};
use crate::{
    progress::ProgressSink,
    snapshot::SnapshotId,
    util::{Result, Status},
};

/// Launches capture runs on a bounded set of worker threads.
///
/// At most `max_concurrent_captures` runs execute at once; further requests
/// queue inside the worker pool. [`begin_capture`](Self::begin_capture)
/// never blocks.
pub struct CaptureScheduler {
    capture: Arc<SnapshotCapture>,
    workers: rayon::ThreadPool,
    options: CaptureOptions,
    next_ticket: AtomicU64,
    in_flight: Arc<AtomicUsize>,
    shutting_down: Arc<AtomicBool>,
}

impl CaptureScheduler {
    pub fn new(capture: SnapshotCapture, options: CaptureOptions) -> Result<Self> {
        if options.max_concurrent_captures == 0 {
            return Err(Status::invalid_argument(
                "max_concurrent_captures must be at least 1",
            ));
        }

        let prefix = options.thread_name_prefix.clone();
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(options.max_concurrent_captures)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .panic_handler(|_| error!("capture worker panicked"))
            .build()
            .map_err(|e| Status::invalid_argument(format!("capture workers: {e}")))?;

        info!(
            "capture scheduler started with {} worker(s)",
            options.max_concurrent_captures
        );

        Ok(CaptureScheduler {
            capture: Arc::new(capture),
            workers,
            options,
            next_ticket: AtomicU64::new(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
            shutting_down: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn capture(&self) -> &SnapshotCapture {
        &self.capture
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// Runs queued or executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Queue one capture run and return immediately.
    pub fn begin_capture(&self, progress: Arc<dyn ProgressSink>) -> CaptureHandle {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let handle = CaptureHandle {
            ticket,
            cancel: CancellationToken::new(),
            slot: Arc::new(ResultSlot::default()),
        };

        if self.shutting_down.load(Ordering::Acquire) {
            handle.slot.complete(Err(Status::shutdown_in_progress(
                "capture scheduler is shutting down",
            )));
            return handle;
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = CompletionGuard {
            slot: Arc::clone(&handle.slot),
            in_flight: Arc::clone(&self.in_flight),
            result: None,
        };
        let capture = Arc::clone(&self.capture);
        let cancel = handle.cancel.clone();
        let shutting_down = Arc::clone(&self.shutting_down);

        debug!("capture #{ticket} queued");
        self.workers.spawn(move || {
            let result = if shutting_down.load(Ordering::Acquire) {
                Err(Status::shutdown_in_progress(
                    "capture scheduler shut down before the run started",
                ))
            } else {
                capture.run(progress.as_ref(), &cancel)
            };
            guard.complete(result);
        });

        handle
    }

    /// Refuse new captures. Runs already executing finish normally; queued
    /// runs that have not started resolve to `ShutdownInProgress`.
    pub fn shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::AcqRel) {
            info!(
                "capture scheduler shutting down, {} run(s) in flight",
                self.in_flight()
            );
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

/// Caller's view of one queued capture run.
///
/// Dropping the handle does not cancel the run.
#[derive(Clone)]
pub struct CaptureHandle {
    ticket: u64,
    cancel: CancellationToken,
    slot: Arc<ResultSlot>,
}

impl CaptureHandle {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Request cancellation; takes effect at the run's next row boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.slot.result.lock().is_some()
    }

    pub fn try_result(&self) -> Option<Result<SnapshotId>> {
        self.slot.result.lock().as_ref().cloned()
    }

    /// Block until the run ends.
    pub fn wait(&self) -> Result<SnapshotId> {
        let mut result = self.slot.result.lock();
        loop {
            if let Some(result) = result.as_ref() {
                return result.clone();
            }
            self.slot.done.wait(&mut result);
        }
    }

    /// Block until the run ends or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<SnapshotId>> {
        let deadline = Instant::now() + timeout;
        let mut result = self.slot.result.lock();
        loop {
            if let Some(result) = result.as_ref() {
                return Some(result.clone());
            }
            if self.slot.done.wait_until(&mut result, deadline).timed_out() {
                return result.as_ref().cloned();
            }
        }
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("ticket", &self.ticket)
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[derive(Default)]
struct ResultSlot {
    result: Mutex<Option<Result<SnapshotId>>>,
    done: Condvar,
}

impl ResultSlot {
    fn complete(&self, result: Result<SnapshotId>) {
        let mut slot = self.result.lock();
        if slot.is_none() {
            *slot = Some(result);
        }
        drop(slot);
        self.done.notify_all();
    }
}

/// Completes the handle even if the job unwinds outside
/// [`SnapshotCapture::run`].
struct CompletionGuard {
    slot: Arc<ResultSlot>,
    in_flight: Arc<AtomicUsize>,
    result: Option<Result<SnapshotId>>,
}

impl CompletionGuard {
    fn complete(mut self, result: Result<SnapshotId>) {
        self.result = Some(result);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // Leave the in-flight count before waiters wake up.
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        let result = self
            .result
            .take()
            .unwrap_or_else(|| Err(Status::contract_violation("capture run panicked")));
        self.slot.complete(result);
    }
}
