use std::{
    collections::HashSet,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};

use super::{ConnectionPool, Connector, Credentials, Lease, PoolOptions, PoolStats, SessionParams};
use crate::{
    source::StatementConnection,
    util::{Result, Status},
};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Fixed-size pool with blocking acquire.
///
/// All connections are opened up front, while the credentials are still in
/// memory; the pool never reconnects. A connection released as broken is
/// dropped and the pool shrinks by one.
pub struct BoundedPool {
    id: u64,
    options: PoolOptions,
    state: Mutex<PoolState>,
    available: Condvar,
}

struct PoolState {
    idle: Vec<Box<dyn StatementConnection>>,
    outstanding: HashSet<u64>,
    live: usize,
    next_lease_id: u64,
    acquires: u64,
    releases: u64,
    timeouts: u64,
    discarded: u64,
}

impl BoundedPool {
    pub fn with_connections(
        connections: Vec<Box<dyn StatementConnection>>,
        options: PoolOptions,
    ) -> Self {
        let live = connections.len();
        BoundedPool {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            options,
            state: Mutex::new(PoolState {
                idle: connections,
                outstanding: HashSet::new(),
                live,
                next_lease_id: 1,
                acquires: 0,
                releases: 0,
                timeouts: 0,
                discarded: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Open `options.max_size` connections for one session.
    ///
    /// `credentials` are wiped before this returns, whether or not the
    /// session could be established.
    pub fn establish(
        params: &SessionParams,
        credentials: &mut Credentials,
        connector: &dyn Connector,
        options: PoolOptions,
    ) -> Result<Self> {
        let opened = Self::open_connections(params, credentials, connector, options.max_size);
        credentials.wipe();
        let connections = opened?;

        info!(
            "session established: {} connection(s) to {} as {}",
            connections.len(),
            params.connect_descriptor(),
            params.schema
        );
        Ok(Self::with_connections(connections, options))
    }

    fn open_connections(
        params: &SessionParams,
        credentials: &Credentials,
        connector: &dyn Connector,
        max_size: usize,
    ) -> Result<Vec<Box<dyn StatementConnection>>> {
        params.validate()?;
        if max_size == 0 {
            return Err(Status::invalid_argument("pool max_size must be at least 1"));
        }
        (0..max_size)
            .map(|_| connector.connect(params, credentials))
            .collect()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }
}

impl ConnectionPool for BoundedPool {
    fn acquire(&self) -> Result<Lease> {
        let deadline = self.options.acquire_timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();

        loop {
            if let Some(connection) = state.idle.pop() {
                let lease_id = state.next_lease_id;
                state.next_lease_id += 1;
                state.outstanding.insert(lease_id);
                state.acquires += 1;
                debug!("pool {}: lease {} acquired", self.id, lease_id);
                return Ok(Lease::new(self.id, lease_id, connection));
            }

            if state.live == 0 {
                return Err(Status::pool_exhausted(format!(
                    "pool {} has no live connections left",
                    self.id
                )));
            }

            match deadline {
                Some(deadline) => {
                    let timed_out = self.available.wait_until(&mut state, deadline).timed_out();
                    if timed_out && state.idle.is_empty() {
                        state.timeouts += 1;
                        warn!(
                            "pool {}: no connection available within {:?}",
                            self.id, self.options.acquire_timeout
                        );
                        return Err(Status::pool_exhausted(format!(
                            "no connection available within {:?} ({} leased)",
                            self.options.acquire_timeout,
                            state.outstanding.len()
                        )));
                    }
                },
                None => self.available.wait(&mut state),
            }
        }
    }

    fn release(&self, lease: Lease) {
        if lease.pool_id() != self.id {
            panic!(
                "{}",
                Status::contract_violation(format!(
                    "lease {} of pool {} released to pool {}",
                    lease.id(),
                    lease.pool_id(),
                    self.id
                ))
            );
        }

        let mut state = self.state.lock();
        if !state.outstanding.remove(&lease.id()) {
            drop(state);
            panic!(
                "{}",
                Status::contract_violation(format!(
                    "lease {} is not outstanding in pool {}",
                    lease.id(),
                    self.id
                ))
            );
        }
        state.releases += 1;

        let lease_id = lease.id();
        if lease.is_broken() {
            state.live -= 1;
            state.discarded += 1;
            warn!(
                "pool {}: discarding broken connection from lease {} ({} live)",
                self.id, lease_id, state.live
            );
            drop(state);
            drop(lease);
            // Waiters must notice when the last connection is gone.
            self.available.notify_all();
        } else {
            state.idle.push(lease.into_connection());
            debug!("pool {}: lease {} released", self.id, lease_id);
            drop(state);
            self.available.notify_one();
        }
    }

    fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            capacity: state.live,
            idle: state.idle.len(),
            leased: state.outstanding.len(),
            acquires: state.acquires,
            releases: state.releases,
            timeouts: state.timeouts,
            discarded: state.discarded,
        }
    }
}
