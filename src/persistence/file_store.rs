use crate::levels::LevelRecord;
use crate::persistence::{LevelStore, PersistenceError, PersistenceResult};
use crate::world::RegionId;
use crossbeam_channel::{bounded, unbounded, Sender};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

enum StoreCmd {
    Save(LevelRecord),
    Delete(RegionId),
    Flush(Sender<()>),
    Shutdown,
}

/// File-backed level store with a background writer thread.
///
/// One bincode file per region. Writes go through a temp file and rename
/// so a crash never leaves a half-written record. A failed write is logged
/// and kept aside; the next mutation of the same key (or a flush) retries.
pub struct FileLevelStore {
    dir: PathBuf,
    tx: Sender<StoreCmd>,
    writer: Option<thread::JoinHandle<()>>,
}

impl FileLevelStore {
    pub fn new(dir: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let (tx, rx) = unbounded();
        let writer_dir = dir.clone();
        let writer = thread::Builder::new()
            .name("level-store".to_string())
            .spawn(move || {
                // Failed writes waiting for a retry, keyed by region
                let mut failed: HashMap<RegionId, LevelRecord> = HashMap::new();

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        StoreCmd::Save(record) => {
                            let id = record.region;
                            match write_record(&writer_dir, &record) {
                                Ok(()) => {
                                    failed.remove(&id);
                                }
                                Err(err) => {
                                    log::warn!("failed to persist {}: {}; will retry", id, err);
                                    failed.insert(id, record);
                                }
                            }
                        }
                        StoreCmd::Delete(id) => {
                            failed.remove(&id);
                            if let Err(err) = remove_record(&writer_dir, id) {
                                log::warn!("failed to delete record for {}: {}", id, err);
                            }
                        }
                        StoreCmd::Flush(ack) => {
                            retry_failed(&writer_dir, &mut failed);
                            let _ = ack.send(());
                        }
                        StoreCmd::Shutdown => {
                            retry_failed(&writer_dir, &mut failed);
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            dir,
            tx,
            writer: Some(writer),
        })
    }

    fn record_path(dir: &Path, id: RegionId) -> PathBuf {
        dir.join(format!("{}.level", id.0))
    }
}

fn write_record(dir: &Path, record: &LevelRecord) -> PersistenceResult<()> {
    let path = FileLevelStore::record_path(dir, record.region);
    let tmp = path.with_extension("level.tmp");
    let bytes = bincode::serialize(record)?;
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

fn remove_record(dir: &Path, id: RegionId) -> PersistenceResult<()> {
    match fs::remove_file(FileLevelStore::record_path(dir, id)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn retry_failed(dir: &Path, failed: &mut HashMap<RegionId, LevelRecord>) {
    failed.retain(|id, record| match write_record(dir, record) {
        Ok(()) => false,
        Err(err) => {
            log::warn!("retry failed for {}: {}", id, err);
            true
        }
    });
}

impl LevelStore for FileLevelStore {
    fn load(&self, id: RegionId) -> PersistenceResult<Option<LevelRecord>> {
        let path = Self::record_path(&self.dir, id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record = bincode::deserialize(&bytes)
            .map_err(|err| PersistenceError::Corrupted(id, err.to_string()))?;
        Ok(Some(record))
    }

    fn save_async(&self, record: LevelRecord) {
        if self.tx.send(StoreCmd::Save(record)).is_err() {
            log::error!("level store writer is gone; dropping write");
        }
    }

    fn delete(&self, id: RegionId) -> PersistenceResult<()> {
        self.tx
            .send(StoreCmd::Delete(id))
            .map_err(|_| PersistenceError::ShutDown)
    }

    fn flush(&self) -> PersistenceResult<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.tx
            .send(StoreCmd::Flush(ack_tx))
            .map_err(|_| PersistenceError::ShutDown)?;
        ack_rx.recv().map_err(|_| PersistenceError::ShutDown)
    }
}

impl Drop for FileLevelStore {
    fn drop(&mut self) {
        let _ = self.tx.send(StoreCmd::Shutdown);
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: u64, level: i64) -> LevelRecord {
        LevelRecord {
            region: RegionId(id),
            level,
            initial_level: 0,
            max_level: level,
            points_to_next_level: 0,
            total_points: level * 100,
        }
    }

    #[test]
    fn test_save_flush_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileLevelStore::new(dir.path()).unwrap();

        store.save_async(record(1, 5));
        store.flush().unwrap();

        assert_eq!(store.load(RegionId(1)).unwrap(), Some(record(1, 5)));
        assert_eq!(store.load(RegionId(2)).unwrap(), None);
    }

    #[test]
    fn test_later_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = FileLevelStore::new(dir.path()).unwrap();

        store.save_async(record(1, 5));
        store.save_async(record(1, 9));
        store.flush().unwrap();

        assert_eq!(store.load(RegionId(1)).unwrap().unwrap().level, 9);
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileLevelStore::new(dir.path()).unwrap();

        store.save_async(record(1, 5));
        store.delete(RegionId(1)).unwrap();
        store.flush().unwrap();

        assert_eq!(store.load(RegionId(1)).unwrap(), None);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileLevelStore::new(dir.path()).unwrap();
            store.save_async(record(7, 3));
            // Drop flushes pending writes via shutdown
        }
        let store = FileLevelStore::new(dir.path()).unwrap();
        assert_eq!(store.load(RegionId(7)).unwrap(), Some(record(7, 3)));
    }
}
