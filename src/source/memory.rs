use std::{collections::BTreeMap, sync::Arc};

use chrono::{NaiveDateTime, TimeDelta};
use parking_lot::RwLock;

use super::{
    StatementConnection, StatementKey, StatementMetadata, StatementMetadataSource,
    StatementStatsRow, StatsRows,
};
use crate::{
    pool::{Connector, Credentials, SessionParams},
    util::{Result, Status},
};

struct MemoryStatement {
    metadata: StatementMetadata,
    stats: StatementStatsRow,
}

struct MemoryState {
    now: NaiveDateTime,
    available: bool,
    statements: BTreeMap<StatementKey, MemoryStatement>,
}

/// In-memory shared pool of statements.
///
/// Clones share state, so a test can keep one handle to mutate statistics
/// while connections leased from a pool read from another.
#[derive(Clone)]
pub struct MemorySource {
    state: Arc<RwLock<MemoryState>>,
}

impl MemorySource {
    pub fn new(now: NaiveDateTime) -> Self {
        MemorySource {
            state: Arc::new(RwLock::new(MemoryState {
                now,
                available: true,
                statements: BTreeMap::new(),
            })),
        }
    }

    pub fn set_now(&self, now: NaiveDateTime) {
        self.state.write().now = now;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut state = self.state.write();
        state.now += delta;
    }

    /// Simulate connectivity loss: every call fails with `SourceUnavailable`
    /// until availability is restored.
    pub fn set_available(&self, available: bool) {
        self.state.write().available = available;
    }

    /// Insert or replace a statement and its cumulative statistics.
    pub fn upsert(&self, stats: StatementStatsRow, text: impl Into<String>) {
        let metadata = StatementMetadata {
            key: stats.key.clone(),
            text: text.into(),
            schema: stats.key.parsing_schema.clone(),
        };
        self.state
            .write()
            .statements
            .insert(stats.key.clone(), MemoryStatement { metadata, stats });
    }

    pub fn remove(&self, key: &StatementKey) -> bool {
        self.state.write().statements.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.state.read().statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().statements.is_empty()
    }

    pub fn connection(&self) -> MemoryConnection {
        MemoryConnection {
            source: self.clone(),
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if self.state.read().available {
            Ok(())
        } else {
            Err(Status::source_unavailable("in-memory source is offline"))
        }
    }
}

impl StatementMetadataSource for MemorySource {
    fn current_server_instant(&self) -> Result<NaiveDateTime> {
        self.ensure_available()?;
        Ok(self.state.read().now)
    }

    fn active_statement_count(&self) -> Result<u64> {
        self.ensure_available()?;
        Ok(self.state.read().statements.len() as u64)
    }

    fn resolve_statement(&self, key: &StatementKey) -> Result<StatementMetadata> {
        self.ensure_available()?;
        self.state
            .read()
            .statements
            .get(key)
            .map(|s| s.metadata.clone())
            .ok_or_else(|| {
                Status::not_found(format!("statement {} not in shared pool", key.sql_id))
            })
    }
}

/// Connection over a [`MemorySource`].
pub struct MemoryConnection {
    source: MemorySource,
}

impl StatementConnection for MemoryConnection {
    fn query_statement_stats(&mut self) -> Result<StatsRows<'_>> {
        self.source.ensure_available()?;
        // Copy out so the cursor does not hold the lock while the caller
        // resolves metadata against the same source.
        let rows: Vec<StatementStatsRow> = self
            .source
            .state
            .read()
            .statements
            .values()
            .map(|s| s.stats.clone())
            .collect();
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}

/// Connector that opens [`MemoryConnection`]s after checking the password.
pub struct MemoryConnector {
    source: MemorySource,
    password: Vec<u8>,
}

impl MemoryConnector {
    pub fn new(source: MemorySource, password: impl Into<Vec<u8>>) -> Self {
        MemoryConnector {
            source,
            password: password.into(),
        }
    }
}

impl Connector for MemoryConnector {
    fn connect(
        &self,
        params: &SessionParams,
        credentials: &Credentials,
    ) -> Result<Box<dyn StatementConnection>> {
        self.source.ensure_available()?;
        if credentials.expose() != self.password.as_slice() {
            return Err(Status::source_unavailable(format!(
                "invalid username/password for {}@{}",
                params.schema,
                params.connect_descriptor()
            )));
        }
        Ok(Box::new(self.source.connection()))
    }
}
