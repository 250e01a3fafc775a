//! Per-path reader/writer locks for in-process file access.
//!
//! Every transaction on a graph file first takes the lock registered for its
//! path: shared for reads, exclusive for writes and read-modify-write cycles.
//! Locks are created on first use and kept for the life of the registry.
//!
//! Paths are keyed exactly as given. `./graph.kg` and `graph.kg` name two
//! different locks even though they name the same file, so callers that mix
//! spellings must normalize first.
//!
//! These locks only coordinate callers sharing one registry inside one
//! process. Other processes touching the same file are not excluded.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;

/// Handle to the lock guarding one path.
#[derive(Debug, Clone, Default)]
pub struct PathLock {
    lock: Arc<RwLock<()>>,
}

impl PathLock {
    /// Acquire shared access. Blocks while a writer holds the path.
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire exclusive access. Blocks while any reader or writer holds the path.
    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles refer to the same underlying lock.
    pub fn same_as(&self, other: &PathLock) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }
}

/// Concurrent map from path to its lock.
///
/// Lookups for different paths never block each other.
#[derive(Debug, Default)]
pub struct FileLockRegistry {
    locks: DashMap<PathBuf, PathLock>,
}

impl FileLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `path`, created if this is the first request for it.
    ///
    /// Concurrent first requests for one path all receive the same lock.
    pub fn lock_for(&self, path: &Path) -> PathLock {
        if let Some(existing) = self.locks.get(path) {
            return existing.clone();
        }
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                tracing::trace!(path = %path.display(), "registered file lock");
                PathLock::default()
            })
            .clone()
    }

    /// Number of paths with a registered lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
