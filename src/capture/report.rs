use log::error;

use crate::{snapshot::SnapshotId, util::Status};

/// A capture run that ended without committing a snapshot.
#[derive(Debug, Clone)]
pub struct CaptureFailure {
    /// Known once the server instant has been read.
    pub snapshot_id: Option<SnapshotId>,
    pub status: Status,
}

/// Receives each failed run exactly once.
///
/// Called on the worker thread that ran the capture. Cancelled runs are not
/// failures and are not reported here.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, failure: &CaptureFailure);
}

/// Writes failures to the `error` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorReporter;

impl ErrorReporter for LogErrorReporter {
    fn report(&self, failure: &CaptureFailure) {
        match &failure.snapshot_id {
            Some(id) => error!("snapshot capture {id} failed: {}", failure.status),
            None => error!("snapshot capture failed: {}", failure.status),
        }
    }
}
