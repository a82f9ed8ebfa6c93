#![allow(clippy::cast_possible_truncation)]
use arc_swap::ArcSwap;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::{Mmap, MmapMut, MmapOptions};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use typeahead_core::{ConnectionsStore, Strength, StoreError, UserId};

use crate::ram_impl::InMemoryConnectionsStore;
use crate::wal::{Wal, WalEntry, WalSyncMode};

const SEGMENT_SIZE: usize = 16 * 1024 * 1024; // 16 MiB arena per segment

struct Segment {
    read_mmap: Mmap,
    write_mmap: Mutex<MmapMut>,
    #[allow(dead_code)]
    file: File,
}

impl Segment {
    fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(SEGMENT_SIZE as u64)?;
        let write_mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        let read_mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self {
            read_mmap,
            write_mmap: Mutex::new(write_mmap),
            file,
        })
    }
}

/// A `ConnectionsStore` backed by a memory-mapped snapshot plus a write-ahead log.
///
/// Reads and writes against the adjacency map itself are served from an in-memory
/// [`InMemoryConnectionsStore`] — the mmap arena is a durability and fast-restart mechanism, not
/// the query hot path. Every mutation is appended to the WAL before it lands in the in-memory
/// map; `persist` compacts the WAL into a fresh snapshot and truncates it.
pub struct PersistentConnectionsStore {
    hot: InMemoryConnectionsStore,
    segments: ArcSwap<Vec<Arc<Segment>>>,
    growth_lock: Mutex<()>,
    wal: Mutex<Wal>,
    base_path: PathBuf,
}

const SNAPSHOT_LEN_FILE: &str = "snapshot.len";
const WAL_FILE: &str = "wal.log";

impl PersistentConnectionsStore {
    /// Opens (or creates) a persistent store rooted at `base_path`, replaying its snapshot and
    /// WAL to rebuild in-memory state. Uses [`WalSyncMode::Async`].
    pub fn open(base_path: &Path) -> io::Result<Self> {
        Self::open_with_mode(base_path, WalSyncMode::Async)
    }

    /// Like [`Self::open`], with an explicit WAL durability mode.
    pub fn open_with_mode(base_path: &Path, sync_mode: WalSyncMode) -> io::Result<Self> {
        if !base_path.exists() {
            std::fs::create_dir_all(base_path)?;
        }

        let hot = InMemoryConnectionsStore::new();
        let snapshot_len = Self::read_snapshot_len(base_path)?;
        let segments = Self::open_existing_segments(base_path)?;
        Self::load_snapshot(&segments, snapshot_len, &hot);

        let wal_path = base_path.join(WAL_FILE);
        Wal::replay(&wal_path, |entry| match entry {
            WalEntry::SetWeight {
                source,
                target,
                strength,
                timestamp,
            } => {
                let _ = hot.set_weight(source, target, strength, timestamp);
            }
            WalEntry::Remove {
                source,
                target,
                timestamp,
            } => {
                let _ = hot.remove(source, target, timestamp);
            }
        })?;

        let wal = Wal::open(&wal_path, sync_mode)?;

        Ok(Self {
            hot,
            segments: ArcSwap::from_pointee(segments),
            growth_lock: Mutex::new(()),
            wal: Mutex::new(wal),
            base_path: base_path.to_path_buf(),
        })
    }

    fn read_snapshot_len(base_path: &Path) -> io::Result<usize> {
        let path = base_path.join(SNAPSHOT_LEN_FILE);
        if !path.exists() {
            return Ok(0);
        }
        let bytes = std::fs::read(path)?;
        if bytes.len() < 8 {
            return Ok(0);
        }
        Ok(Cursor::new(bytes).read_u64::<LittleEndian>()? as usize)
    }

    fn open_existing_segments(base_path: &Path) -> io::Result<Vec<Arc<Segment>>> {
        let mut segments = Vec::new();
        let mut i = 0;
        loop {
            let path = base_path.join(format!("snapshot_{i}.dat"));
            if !path.exists() {
                break;
            }
            segments.push(Arc::new(Segment::create(&path)?));
            i += 1;
        }
        if segments.is_empty() {
            let path = base_path.join("snapshot_0.dat");
            segments.push(Arc::new(Segment::create(&path)?));
        }
        Ok(segments)
    }

    /// Walks `[user_id: u32 LE][len: u32 LE][bytes]` records across `segments` up to
    /// `total_len`, rebuilding `hot` without going through the timestamp-gated write path.
    fn load_snapshot(segments: &[Arc<Segment>], total_len: usize, hot: &InMemoryConnectionsStore) {
        let mut remaining = total_len;
        for segment in segments {
            if remaining == 0 {
                break;
            }
            let usable = remaining.min(SEGMENT_SIZE);
            let data = &segment.read_mmap[..usable];
            let mut cursor = Cursor::new(data);
            while (cursor.position() as usize) < usable {
                let Ok(id) = cursor.read_u32::<LittleEndian>() else {
                    break;
                };
                let Ok(len) = cursor.read_u32::<LittleEndian>() else {
                    break;
                };
                let start = cursor.position() as usize;
                let end = start + len as usize;
                if end > data.len() {
                    break;
                }
                hot.restore_raw(id, data[start..end].to_vec());
                cursor.set_position(end as u64);
            }
            remaining -= usable;
        }
    }

    /// Rewrites the snapshot from the current in-memory state and truncates the WAL. Coarse —
    /// takes the growth lock for the whole rewrite.
    pub fn persist(&self) -> Result<(), StoreError> {
        let _guard = self.growth_lock.lock();

        let entries = self.hot.snapshot_entries();
        let mut fresh_segments: Vec<Arc<Segment>> = Vec::new();
        let mut segment_idx = 0usize;
        let mut offset = 0usize;
        let mut total_len = 0usize;

        let mut ensure_segment = |idx: usize, fresh: &mut Vec<Arc<Segment>>| -> io::Result<()> {
            while fresh.len() <= idx {
                let path = self
                    .base_path
                    .join(format!("snapshot_{}.dat.tmp", fresh.len()));
                fresh.push(Arc::new(Segment::create(&path)?));
            }
            Ok(())
        };
        ensure_segment(0, &mut fresh_segments).map_err(|e| StoreError::Io(e.to_string()))?;

        for (id, bytes) in entries {
            let record_len = 4 + 4 + bytes.len();
            if offset + record_len > SEGMENT_SIZE {
                segment_idx += 1;
                offset = 0;
                ensure_segment(segment_idx, &mut fresh_segments)
                    .map_err(|e| StoreError::Io(e.to_string()))?;
            }

            let segment = &fresh_segments[segment_idx];
            let mut guard = segment.write_mmap.lock();
            let mut writer = &mut guard[offset..offset + record_len];
            writer
                .write_u32::<LittleEndian>(id)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            writer
                .write_u32::<LittleEndian>(bytes.len() as u32)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            io::Write::write_all(&mut writer, &bytes).map_err(|e| StoreError::Io(e.to_string()))?;
            drop(guard);

            offset += record_len;
            total_len += record_len;
        }

        for segment in &fresh_segments {
            segment
                .write_mmap
                .lock()
                .flush()
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }

        // Swap the tmp segment files into their canonical names.
        for (idx, _) in fresh_segments.iter().enumerate() {
            let tmp = self.base_path.join(format!("snapshot_{idx}.dat.tmp"));
            let canonical = self.base_path.join(format!("snapshot_{idx}.dat"));
            std::fs::rename(tmp, canonical).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let fresh_segments = Self::open_existing_segments(&self.base_path)
            .map_err(|e| StoreError::Io(e.to_string()))?;

        std::fs::write(
            self.base_path.join(SNAPSHOT_LEN_FILE),
            (total_len as u64).to_le_bytes(),
        )
        .map_err(|e| StoreError::Io(e.to_string()))?;

        self.segments.store(Arc::new(fresh_segments));
        Wal::clear(&self.base_path.join(WAL_FILE)).map_err(|e| StoreError::Io(e.to_string()))?;
        self.wal
            .lock()
            .sync()
            .map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }
}

impl ConnectionsStore for PersistentConnectionsStore {
    fn has_index(&self, id: UserId) -> bool {
        self.hot.has_index(id)
    }

    fn length(&self, id: UserId) -> usize {
        self.hot.length(id)
    }

    fn get_bytes(&self, id: UserId, buf: &mut Vec<u8>) -> Result<usize, StoreError> {
        self.hot.get_bytes(id, buf)
    }

    fn read_bytes(&self, id: UserId, buf: &mut [u8]) -> usize {
        self.hot.read_bytes(id, buf)
    }

    fn weight_data(&self, id: UserId) -> (Vec<UserId>, Vec<Strength>) {
        self.hot.weight_data(id)
    }

    fn weight(&self, source: UserId, target: UserId) -> Option<Strength> {
        self.hot.weight(source, target)
    }

    fn set_weight(
        &self,
        source: UserId,
        target: UserId,
        strength: Strength,
        timestamp: i64,
    ) -> Result<(), StoreError> {
        self.wal
            .lock()
            .append(&WalEntry::SetWeight {
                source,
                target,
                strength,
                timestamp,
            })
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.hot.set_weight(source, target, strength, timestamp)
    }

    fn remove(&self, source: UserId, target: UserId, timestamp: i64) -> Result<(), StoreError> {
        self.wal
            .lock()
            .append(&WalEntry::Remove {
                source,
                target,
                timestamp,
            })
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.hot.remove(source, target, timestamp)
    }

    fn persist(&self) -> Result<(), StoreError> {
        PersistentConnectionsStore::persist(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persist_and_reopen_round_trips_state() {
        let dir = tempdir().unwrap();
        {
            let store = PersistentConnectionsStore::open(dir.path()).unwrap();
            store.set_weight(1, 10, 5, 100).unwrap();
            store.set_weight(1, 20, 9, 101).unwrap();
            store.set_weight(2, 10, 3, 102).unwrap();
            ConnectionsStore::persist(&store).unwrap();
        }

        let reopened = PersistentConnectionsStore::open(dir.path()).unwrap();
        assert_eq!(reopened.weight(1, 10), Some(5));
        assert_eq!(reopened.weight(1, 20), Some(9));
        assert_eq!(reopened.weight(2, 10), Some(3));
    }

    #[test]
    fn unpersisted_writes_survive_via_wal_replay() {
        let dir = tempdir().unwrap();
        {
            let store = PersistentConnectionsStore::open(dir.path()).unwrap();
            store.set_weight(1, 10, 5, 100).unwrap();
            // No explicit persist: the WAL alone must carry this write across reopen.
        }

        let reopened = PersistentConnectionsStore::open(dir.path()).unwrap();
        assert_eq!(reopened.weight(1, 10), Some(5));
    }

    #[test]
    fn remove_after_persist_is_durable() {
        let dir = tempdir().unwrap();
        let store = PersistentConnectionsStore::open(dir.path()).unwrap();
        store.set_weight(1, 10, 5, 100).unwrap();
        ConnectionsStore::persist(&store).unwrap();
        store.remove(1, 10, 200).unwrap();
        ConnectionsStore::persist(&store).unwrap();
        drop(store);

        let reopened = PersistentConnectionsStore::open(dir.path()).unwrap();
        assert_eq!(reopened.weight(1, 10), None);
    }
}
