//! Read-through snapshot cache keyed by [`SnapshotVersion`].
//!
//! Snapshots are never mutated; a newer version replaces the cached `Arc`
//! wholesale and readers holding the old one keep a consistent view.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::{LoadError, LogSource, Snapshot};

#[derive(Debug, Default)]
pub struct SnapshotCache {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached snapshot while `source` still reports the same
    /// version, otherwise load a fresh one. Unversioned sources always reload.
    pub fn get_or_load(&self, source: &dyn LogSource) -> Result<Arc<Snapshot>, LoadError> {
        let Some(version) = source.version()? else {
            return source.load().map(Arc::new);
        };

        {
            let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = guard.as_ref() {
                if cached.version() == Some(&version) {
                    return Ok(Arc::clone(cached));
                }
            }
        }

        let snapshot = Arc::new(source.load()?);
        debug!(%version, records = snapshot.len(), "snapshot cache refreshed");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}
