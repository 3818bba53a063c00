//! Persistence for level records
//!
//! The in-memory cache in the levels manager is authoritative for the
//! process lifetime; every mutation schedules an asynchronous write through
//! a [`LevelStore`]. A crash between mutation and flush loses the unflushed
//! write; this layer does not try to mask that.

pub mod file_store;

pub use file_store::FileLevelStore;

use crate::levels::LevelRecord;
use crate::world::RegionId;
use dashmap::DashMap;
use thiserror::Error;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted record {0}: {1}")]
    Corrupted(RegionId, String),

    #[error("store is shut down")]
    ShutDown,
}

impl From<bincode::Error> for PersistenceError {
    fn from(err: bincode::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// Level record storage consumed by the levels manager
pub trait LevelStore: Send + Sync {
    /// Load a record; `Ok(None)` when none was ever persisted
    fn load(&self, id: RegionId) -> PersistenceResult<Option<LevelRecord>>;

    /// Schedule an asynchronous write. Failures are logged and retried on
    /// the next mutation of the same key, never surfaced to the caller.
    fn save_async(&self, record: LevelRecord);

    /// Remove the persisted record
    fn delete(&self, id: RegionId) -> PersistenceResult<()>;

    /// Block until every scheduled write has been attempted
    fn flush(&self) -> PersistenceResult<()>;
}

/// Volatile store for tests and embedders without a data directory
#[derive(Default)]
pub struct MemoryLevelStore {
    records: DashMap<RegionId, LevelRecord>,
}

impl MemoryLevelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LevelStore for MemoryLevelStore {
    fn load(&self, id: RegionId) -> PersistenceResult<Option<LevelRecord>> {
        Ok(self.records.get(&id).map(|entry| entry.clone()))
    }

    fn save_async(&self, record: LevelRecord) {
        self.records.insert(record.region, record);
    }

    fn delete(&self, id: RegionId) -> PersistenceResult<()> {
        self.records.remove(&id);
        Ok(())
    }

    fn flush(&self) -> PersistenceResult<()> {
        Ok(())
    }
}
