use serde::{Deserialize, Serialize};

use super::{SnapshotId, StatementSnapshot};

/// Statement statistics captured at one server instant.
///
/// There is no mutating API: a snapshot is assembled by [`SnapshotBuilder`]
/// inside a single capture run and frozen by [`SnapshotBuilder::finish`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    id: SnapshotId,
    statements: Vec<StatementSnapshot>,
}

impl Snapshot {
    #[inline]
    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    #[inline]
    pub fn statements(&self) -> &[StatementSnapshot] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// All entries for a sql id; one per child cursor address and schema.
    pub fn find_by_sql_id<'a>(
        &'a self,
        sql_id: &'a str,
    ) -> impl Iterator<Item = &'a StatementSnapshot> + 'a {
        self.statements.iter().filter(move |s| s.sql_id() == sql_id)
    }

    pub fn total_elapsed_seconds(&self) -> f64 {
        self.statements.iter().map(|s| s.elapsed_seconds).sum()
    }

    pub fn total_executions(&self) -> u64 {
        self.statements
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.executions))
    }
}

/// In-progress snapshot owned by one capture run. Append-only.
pub struct SnapshotBuilder {
    id: SnapshotId,
    statements: Vec<StatementSnapshot>,
}

impl SnapshotBuilder {
    pub fn new(id: SnapshotId) -> Self {
        SnapshotBuilder {
            id,
            statements: Vec::new(),
        }
    }

    pub fn with_capacity(id: SnapshotId, capacity: usize) -> Self {
        SnapshotBuilder {
            id,
            statements: Vec::with_capacity(capacity),
        }
    }

    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    pub fn add_statement(&mut self, statement: StatementSnapshot) {
        self.statements.push(statement);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn finish(self) -> Snapshot {
        Snapshot {
            id: self.id,
            statements: self.statements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{StatementKey, StatementMetadata};

    fn statement(sql_id: &str, address: &str, executions: u64, elapsed: f64) -> StatementSnapshot {
        StatementSnapshot {
            statement: StatementMetadata {
                key: StatementKey::new(sql_id, address, "APP"),
                text: format!("SELECT /* {sql_id} */ 1 FROM dual"),
                schema: "APP".to_string(),
            },
            executions,
            elapsed_seconds: elapsed,
            cpu_seconds: elapsed / 2.0,
            buffer_gets: 0,
            disk_reads: 0,
            rows_processed: 0,
        }
    }

    #[test]
    fn test_builder_finish() {
        let id = SnapshotId::parse("2024.03.07 09:05:03").unwrap();
        let mut builder = SnapshotBuilder::new(id.clone());
        assert!(builder.is_empty());

        builder.add_statement(statement("a", "01", 3, 1.5));
        builder.add_statement(statement("b", "02", 4, 0.5));
        assert_eq!(builder.len(), 2);

        let snapshot = builder.finish();
        assert_eq!(snapshot.id(), &id);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.total_executions(), 7);
        assert_eq!(snapshot.total_elapsed_seconds(), 2.0);
    }

    #[test]
    fn test_find_by_sql_id_returns_child_cursors() {
        let id = SnapshotId::parse("2024.03.07 09:05:03").unwrap();
        let mut builder = SnapshotBuilder::with_capacity(id, 3);
        builder.add_statement(statement("a", "01", 1, 0.0));
        builder.add_statement(statement("a", "02", 1, 0.0));
        builder.add_statement(statement("b", "03", 1, 0.0));

        let snapshot = builder.finish();
        assert_eq!(snapshot.find_by_sql_id("a").count(), 2);
        assert_eq!(snapshot.find_by_sql_id("c").count(), 0);
    }
}
