//! Process-wide store of completed snapshots.

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use log::warn;

use crate::snapshot::{Snapshot, SnapshotId};

/// Concurrent, key-ordered map from [`SnapshotId`] to completed snapshots.
///
/// Cloning is cheap and every clone refers to the same map, so the owner of
/// the capture machinery hands clones to whoever needs to read. Inserts and
/// reads never block each other; a snapshot becomes visible only once it is
/// fully built, because only finished [`Snapshot`]s can be inserted.
#[derive(Clone, Default)]
pub struct SnapshotRegistry {
    map: Arc<SkipMap<SnapshotId, Arc<Snapshot>>>,
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        SnapshotRegistry {
            map: Arc::new(SkipMap::new()),
        }
    }

    /// Insert a snapshot, replacing any entry with the same id.
    ///
    /// `None` is a no-op. Returns `true` when the id was already registered
    /// (two captures in the same second). Of several concurrent puts under
    /// one fresh id, exactly one returns `false`.
    pub fn put(&self, snapshot: impl Into<Option<Snapshot>>) -> bool {
        let Some(snapshot) = snapshot.into() else {
            return false;
        };
        let id = snapshot.id().clone();
        let snapshot = Arc::new(snapshot);

        let entry = self.map.get_or_insert(id.clone(), Arc::clone(&snapshot));
        if Arc::ptr_eq(entry.value(), &snapshot) {
            return false;
        }
        drop(entry);

        warn!("snapshot {id} already registered, replacing it (same-second capture)");
        self.map.insert(id, snapshot);
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<Snapshot>> {
        self.map.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    /// Ids known at the time of the call, oldest first. Later inserts do not
    /// show up in the returned vector.
    pub fn list_ids(&self) -> Vec<SnapshotId> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    /// All snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<Arc<Snapshot>> {
        self.map
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.map.back().map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
