//! Data-source side of a capture: the statement statistics query and the
//! metadata lookups that turn raw statement identities into readable text.
//!
//! The statistics query is vendor-specific (Oracle `v$sqlarea`) and this
//! crate never speaks the wire protocol itself; a driver adapter implements
//! [`StatementConnection`] and [`StatementMetadataSource`]. [`memory`] ships
//! an in-memory implementation.

pub mod memory;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::util::Result;

/// The statistics query a driver adapter is expected to run.
///
/// `elapsed_time` and `cpu_time` are reported by the view in microseconds.
pub const STATEMENT_STATS_SQL: &str = "SELECT sql_id, address, parsing_schema_name, \
     executions, elapsed_time, cpu_time, buffer_gets, disk_reads, rows_processed \
     FROM v$sqlarea";

/// Raw identity of a statement as returned by the statistics query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatementKey {
    pub sql_id: String,
    pub address: String,
    pub parsing_schema: String,
}

impl StatementKey {
    pub fn new(
        sql_id: impl Into<String>,
        address: impl Into<String>,
        parsing_schema: impl Into<String>,
    ) -> Self {
        StatementKey {
            sql_id: sql_id.into(),
            address: address.into(),
            parsing_schema: parsing_schema.into(),
        }
    }
}

/// Human-readable statement text and owning schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementMetadata {
    pub key: StatementKey,
    pub text: String,
    pub schema: String,
}

/// One row of [`STATEMENT_STATS_SQL`], values exactly as the view reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementStatsRow {
    pub key: StatementKey,
    pub executions: u64,
    pub elapsed_micros: u64,
    pub cpu_micros: u64,
    pub buffer_gets: u64,
    pub disk_reads: u64,
    pub rows_processed: u64,
}

/// Streaming cursor over the statistics query.
pub type StatsRows<'a> = Box<dyn Iterator<Item = Result<StatementStatsRow>> + 'a>;

/// A live database connection, leased from a
/// [`ConnectionPool`](crate::pool::ConnectionPool).
pub trait StatementConnection: Send {
    /// Run the statistics query. Rows are pulled lazily; a row-level error
    /// ends the cursor.
    fn query_statement_stats(&mut self) -> Result<StatsRows<'_>>;
}

/// Lookups a capture run makes outside its leased connection.
///
/// Connectivity loss surfaces as
/// [`Code::SourceUnavailable`](crate::util::Code::SourceUnavailable).
pub trait StatementMetadataSource: Send + Sync {
    /// The database server's clock, not the local one.
    fn current_server_instant(&self) -> Result<NaiveDateTime>;

    /// Number of statements currently in the shared pool. Used only to size
    /// progress reporting, so it may be stale by the time the query runs.
    fn active_statement_count(&self) -> Result<u64>;

    fn resolve_statement(&self, key: &StatementKey) -> Result<StatementMetadata>;
}
