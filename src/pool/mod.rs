//! Connection leasing.
//!
//! A capture run holds exactly one connection for the duration of its
//! statistics query. [`ScopedLease`] ties that lease to a scope so every exit
//! path, including `?` early returns and panics, gives the connection back.
//! A pool that loses connections without getting them back stalls every
//! later capture, so nothing in this crate releases a lease by hand.

mod bounded;
mod session;

use std::time::Duration;

pub use bounded::BoundedPool;
pub use session::{Connector, Credentials, SessionParams};

use crate::{source::StatementConnection, util::Result};

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Connections opened when the session is established.
    pub max_size: usize,
    /// How long `acquire` waits for a connection; `None` waits forever.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            max_size: 4,
            acquire_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Bounded pool of live connections.
pub trait ConnectionPool: Send + Sync {
    /// Take a connection, blocking while the pool is exhausted.
    ///
    /// Fails with [`Code::PoolExhausted`](crate::util::Code::PoolExhausted)
    /// once the pool's wait policy gives up.
    fn acquire(&self) -> Result<Lease>;

    /// Give a lease back.
    ///
    /// # Panics
    ///
    /// Releasing a lease this pool did not hand out, or no longer considers
    /// outstanding, is a contract violation.
    fn release(&self, lease: Lease);

    fn stats(&self) -> PoolStats;
}

/// A connection on loan from a pool.
///
/// Not `Clone`, and `release` consumes it: the same lease cannot be returned
/// twice.
pub struct Lease {
    pool_id: u64,
    id: u64,
    connection: Box<dyn StatementConnection>,
    broken: bool,
}

impl Lease {
    pub fn new(pool_id: u64, id: u64, connection: Box<dyn StatementConnection>) -> Self {
        Lease {
            pool_id,
            id,
            connection,
            broken: false,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }

    pub fn connection_mut(&mut self) -> &mut dyn StatementConnection {
        self.connection.as_mut()
    }

    /// Ask the pool to discard this connection on release instead of
    /// handing it out again.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn into_connection(self) -> Box<dyn StatementConnection> {
        self.connection
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("pool_id", &self.pool_id)
            .field("id", &self.id)
            .field("broken", &self.broken)
            .finish()
    }
}

/// Lease released when dropped.
pub struct ScopedLease<'a> {
    pool: &'a dyn ConnectionPool,
    lease: Option<Lease>,
}

impl<'a> ScopedLease<'a> {
    pub fn acquire(pool: &'a dyn ConnectionPool) -> Result<Self> {
        let lease = pool.acquire()?;
        Ok(ScopedLease {
            pool,
            lease: Some(lease),
        })
    }

    pub fn connection(&mut self) -> &mut dyn StatementConnection {
        match self.lease.as_mut() {
            Some(lease) => lease.connection_mut(),
            None => unreachable!("lease is only taken on drop"),
        }
    }

    pub fn mark_broken(&mut self) {
        if let Some(lease) = self.lease.as_mut() {
            lease.mark_broken();
        }
    }
}

impl Drop for ScopedLease<'_> {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            self.pool.release(lease);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Live connections, leased or idle.
    pub capacity: usize,
    pub idle: usize,
    pub leased: usize,
    pub acquires: u64,
    pub releases: u64,
    pub timeouts: u64,
    /// Connections dropped after being released as broken.
    pub discarded: u64,
}
