use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use log::{debug, info, warn};

use super::{CancellationToken, CaptureFailure, ErrorReporter, LogErrorReporter};
use crate::{
    pool::{ConnectionPool, ScopedLease},
    progress::{Finish, ProgressSink},
    registry::SnapshotRegistry,
    snapshot::{Snapshot, SnapshotBuilder, SnapshotId, StatementSnapshot},
    source::{StatementConnection, StatementMetadataSource},
    statistics::CaptureStatistics,
    util::{Result, Status},
};

// Upper bound on the builder's up-front allocation; the statement count is
// only an estimate.
const MAX_PREALLOCATED_STATEMENTS: u64 = 64 * 1024;

/// One capture pipeline: a pool, a metadata source and the registry that
/// receives finished snapshots.
///
/// [`run`](Self::run) executes a single capture synchronously on the calling
/// thread; [`CaptureScheduler`](super::CaptureScheduler) moves runs onto
/// workers.
pub struct SnapshotCapture {
    pool: Arc<dyn ConnectionPool>,
    source: Arc<dyn StatementMetadataSource>,
    registry: SnapshotRegistry,
    reporter: Arc<dyn ErrorReporter>,
    statistics: Arc<CaptureStatistics>,
}

#[derive(Default)]
struct RunState {
    snapshot_id: Option<SnapshotId>,
    progress_started: bool,
}

impl SnapshotCapture {
    pub fn new(
        pool: Arc<dyn ConnectionPool>,
        source: Arc<dyn StatementMetadataSource>,
        registry: SnapshotRegistry,
    ) -> Self {
        SnapshotCapture {
            pool,
            source,
            registry,
            reporter: Arc::new(LogErrorReporter),
            statistics: Arc::new(CaptureStatistics::new()),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_statistics(mut self, statistics: Arc<CaptureStatistics>) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn registry(&self) -> &SnapshotRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    pub fn statistics(&self) -> &Arc<CaptureStatistics> {
        &self.statistics
    }

    /// Capture one snapshot and commit it to the registry.
    ///
    /// On failure the partial snapshot is dropped, the failure goes to the
    /// [`ErrorReporter`] (unless the run was cancelled) and the status is
    /// returned. `progress` gets `inform_finished` in every case where it
    /// received a start value.
    ///
    /// A panic raised by a collaborator during the run (the metadata source,
    /// a connection or the progress sink) fails the run with
    /// `ContractViolation`.
    pub fn run(
        &self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<SnapshotId> {
        let started_at = Instant::now();
        self.statistics.record_capture_started();

        let mut state = RunState::default();
        let captured = panic::catch_unwind(AssertUnwindSafe(|| {
            self.capture(progress, cancel, &mut state)
        }))
        .unwrap_or_else(|payload| {
            Err(Status::contract_violation(format!(
                "capture run panicked: {}",
                panic_message(&*payload)
            )))
        });

        match captured {
            Ok(snapshot) => {
                let id = snapshot.id().clone();
                let count = snapshot.len() as u64;
                if self.registry.put(snapshot) {
                    self.statistics.record_snapshot_overwritten();
                }
                self.statistics
                    .record_capture_succeeded(count, started_at.elapsed().as_micros() as u64);
                info!(
                    "snapshot {id} committed: {count} statement(s) in {:?}",
                    started_at.elapsed()
                );
                inform_finished(progress, Finish::Completed);
                Ok(id)
            },
            Err(status) => {
                let finish = if status.is_cancelled() {
                    self.statistics.record_capture_cancelled();
                    info!("snapshot capture cancelled");
                    Finish::Cancelled
                } else {
                    self.statistics.record_capture_failed();
                    self.reporter.report(&CaptureFailure {
                        snapshot_id: state.snapshot_id,
                        status: status.clone(),
                    });
                    Finish::Failed
                };
                if state.progress_started {
                    inform_finished(progress, finish);
                }
                Err(status)
            },
        }
    }

    fn capture(
        &self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> Result<Snapshot> {
        cancel.check()?;

        let instant = self.source.current_server_instant()?;
        let id = SnapshotId::from_instant(instant)?;
        state.snapshot_id = Some(id.clone());
        info!("capturing snapshot {id}");

        let estimate = self.source.active_statement_count()?;
        progress.set_start_value(0);
        progress.set_end_value(estimate);
        progress.set_current_value(0);
        state.progress_started = true;

        let capacity = estimate.min(MAX_PREALLOCATED_STATEMENTS) as usize;
        let mut builder = SnapshotBuilder::with_capacity(id, capacity);

        let mut lease = ScopedLease::acquire(self.pool.as_ref())?;
        let mut connection_fault = false;
        let filled = self.fill(
            &mut builder,
            lease.connection(),
            progress,
            cancel,
            &mut connection_fault,
        );
        if connection_fault {
            lease.mark_broken();
        }
        drop(lease);
        filled?;

        Ok(builder.finish())
    }

    /// Stream the statistics query into `builder`.
    ///
    /// `connection_fault` is set when the connection itself failed, as
    /// opposed to a metadata lookup or cancellation.
    fn fill(
        &self,
        builder: &mut SnapshotBuilder,
        connection: &mut dyn StatementConnection,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        connection_fault: &mut bool,
    ) -> Result<()> {
        let rows = connection.query_statement_stats().inspect_err(|e| {
            *connection_fault = e.is_source_unavailable();
        })?;

        let mut current = 0u64;
        for row in rows {
            cancel.check()?;
            let row = row.inspect_err(|e| {
                *connection_fault = e.is_source_unavailable();
            })?;

            self.statistics.record_metadata_lookup();
            let metadata = self.source.resolve_statement(&row.key)?;
            builder.add_statement(StatementSnapshot::from_row(metadata, &row));

            current += 1;
            progress.set_current_value(current);
        }
        debug!("snapshot {}: {} row(s) read", builder.id(), current);
        Ok(())
    }
}

/// Deliver the terminal signal; a sink that panics here does not change the
/// outcome of the run.
fn inform_finished(progress: &dyn ProgressSink, finish: Finish) {
    if panic::catch_unwind(AssertUnwindSafe(|| progress.inform_finished(finish))).is_err() {
        warn!("progress sink panicked in inform_finished({finish:?})");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
