pub mod capture;
pub mod export;
pub mod pool;
pub mod progress;
pub mod registry;
pub mod snapshot;
pub mod source;
pub mod statistics;
pub mod util;

pub use capture::{
    CancellationToken, CaptureFailure, CaptureHandle, CaptureOptions, CaptureScheduler,
    ErrorReporter, LogErrorReporter, SnapshotCapture,
};
pub use pool::{
    BoundedPool, ConnectionPool, Connector, Credentials, Lease, PoolOptions, PoolStats,
    ScopedLease, SessionParams,
};
pub use progress::{AtomicProgress, Finish, NoProgress, ProgressSink};
pub use registry::SnapshotRegistry;
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotId, StatementSnapshot};
pub use source::{
    StatementConnection, StatementKey, StatementMetadata, StatementMetadataSource,
    StatementStatsRow,
};
pub use statistics::CaptureStatistics;
pub use util::{Code, Result, Status};
