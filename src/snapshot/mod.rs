mod id;
#[allow(clippy::module_inception)]
mod snapshot;
mod statement;

pub use id::{SNAPSHOT_ID_FORMAT, SnapshotId};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use statement::{StatementSnapshot, micros_to_seconds};
