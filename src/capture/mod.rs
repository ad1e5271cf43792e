//! Snapshot capture pipeline.
//!
//! A run reads the server instant, sizes progress reporting, streams the
//! statement statistics query through one leased connection, resolves each
//! statement's text, and commits the finished snapshot to the registry.
//! Failures end only the run that hit them.

mod cancel;
mod report;
mod run;
pub mod scheduler;

pub use cancel::CancellationToken;
pub use report::{CaptureFailure, ErrorReporter, LogErrorReporter};
pub use run::SnapshotCapture;
pub use scheduler::{CaptureHandle, CaptureScheduler};

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Worker threads, and so the number of runs executing at once.
    pub max_concurrent_captures: usize,
    pub thread_name_prefix: String,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        CaptureOptions {
            max_concurrent_captures: 2,
            thread_name_prefix: "stmtsnap-capture".to_string(),
        }
    }
}
