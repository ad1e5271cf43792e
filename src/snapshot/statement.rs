use serde::{Deserialize, Serialize};

use crate::source::{StatementMetadata, StatementStatsRow};

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Cumulative execution statistics of one statement at the snapshot instant.
///
/// Values are the counters the database reports, not deltas; diffing two
/// snapshots happens downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSnapshot {
    pub statement: StatementMetadata,
    pub executions: u64,
    pub elapsed_seconds: f64,
    pub cpu_seconds: f64,
    pub buffer_gets: u64,
    pub disk_reads: u64,
    pub rows_processed: u64,
}

impl StatementSnapshot {
    pub fn from_row(statement: StatementMetadata, row: &StatementStatsRow) -> Self {
        StatementSnapshot {
            statement,
            executions: row.executions,
            elapsed_seconds: micros_to_seconds(row.elapsed_micros),
            cpu_seconds: micros_to_seconds(row.cpu_micros),
            buffer_gets: row.buffer_gets,
            disk_reads: row.disk_reads,
            rows_processed: row.rows_processed,
        }
    }

    #[inline]
    pub fn sql_id(&self) -> &str {
        &self.statement.key.sql_id
    }
}

#[inline]
pub fn micros_to_seconds(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}
