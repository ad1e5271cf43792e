use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::util::{Result, Status};

/// Shared flag a capture run polls between rows.
///
/// Cancellation is best effort: a run blocked in a pool acquire, the query or
/// a metadata lookup only notices once that call returns.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Status::cancelled("capture cancelled"));
        }
        Ok(())
    }
}
