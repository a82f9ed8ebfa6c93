use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Cursor;

use typeahead_core::{Element, ElementId, ElementStore, Range, Strength, StoreError, UserId};

use crate::ADJACENCY_RECORD_SIZE;

/// Dense, range-checked element storage. The index executor calls `set_element` under its own
/// element lock, so the lock here only ever guards the single `HashMap` mutation itself.
pub struct InMemoryElementStore<E: Element> {
    range: Range,
    elements: RwLock<HashMap<ElementId, E>>,
}

impl<E: Element> InMemoryElementStore<E> {
    pub fn new(range: Range) -> Self {
        Self {
            range,
            elements: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: Element> ElementStore<E> for InMemoryElementStore<E> {
    fn has_index(&self, id: ElementId) -> bool {
        self.elements.read().contains_key(&id)
    }

    fn get_element(&self, id: ElementId) -> Option<E> {
        self.elements.read().get(&id).cloned()
    }

    fn set_element(&self, id: ElementId, element: E, _timestamp: i64) -> Result<(), StoreError> {
        if !self.range.contains(id) {
            return Err(StoreError::NotFound(id));
        }
        self.elements.write().insert(id, element);
        Ok(())
    }

    fn index_start(&self) -> ElementId {
        self.range.index_start
    }

    fn capacity(&self) -> u32 {
        self.range.capacity
    }
}

/// Adjacency storage keyed by source user id. Each record is packed as repeated
/// `[target: u32 LE][strength: i64 LE]` chunks (`ADJACENCY_RECORD_SIZE` bytes each), the format
/// `typeahead_index::WeightIterator` decodes.
///
/// A single `RwLock` per map guards the whole store: readers (queries) hold the read lock only
/// for the duration of a byte copy, writers (`set_weight` / `remove`) hold the write lock for a
/// single record mutation.
#[derive(Default)]
pub struct InMemoryConnectionsStore {
    adjacency: RwLock<HashMap<UserId, Vec<u8>>>,
    timestamps: RwLock<HashMap<(UserId, UserId), i64>>,
}

impl InMemoryConnectionsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn encode_record(buf: &mut Vec<u8>, target: UserId, strength: Strength) {
        buf.write_u32::<LittleEndian>(target).unwrap();
        buf.write_i64::<LittleEndian>(strength).unwrap();
    }

    fn find_record_offset(record: &[u8], target: UserId) -> Option<usize> {
        record
            .chunks_exact(ADJACENCY_RECORD_SIZE)
            .position(|chunk| {
                let mut cur = Cursor::new(chunk);
                cur.read_u32::<LittleEndian>().unwrap() == target
            })
            .map(|idx| idx * ADJACENCY_RECORD_SIZE)
    }
}

impl InMemoryConnectionsStore {
    /// Snapshots every source's raw adjacency bytes, for the persistent store to write out.
    pub(crate) fn snapshot_entries(&self) -> Vec<(UserId, Vec<u8>)> {
        self.adjacency
            .read()
            .iter()
            .map(|(id, bytes)| (*id, bytes.clone()))
            .collect()
    }

    /// Installs a raw adjacency blob for `id` without going through the timestamp-gated write
    /// path, used to rehydrate state from a snapshot or WAL replay at startup.
    pub(crate) fn restore_raw(&self, id: UserId, bytes: Vec<u8>) {
        self.adjacency.write().insert(id, bytes);
    }
}

impl typeahead_core::ConnectionsStore for InMemoryConnectionsStore {
    fn has_index(&self, id: UserId) -> bool {
        self.adjacency
            .read()
            .get(&id)
            .is_some_and(|bytes| !bytes.is_empty())
    }

    fn length(&self, id: UserId) -> usize {
        self.adjacency
            .read()
            .get(&id)
            .map_or(0, |bytes| bytes.len() / ADJACENCY_RECORD_SIZE)
    }

    fn get_bytes(&self, id: UserId, buf: &mut Vec<u8>) -> Result<usize, StoreError> {
        let guard = self.adjacency.read();
        let Some(record) = guard.get(&id) else {
            buf.clear();
            return Ok(0);
        };
        buf.clear();
        buf.extend_from_slice(record);
        Ok(record.len() / ADJACENCY_RECORD_SIZE)
    }

    fn read_bytes(&self, id: UserId, buf: &mut [u8]) -> usize {
        let guard = self.adjacency.read();
        let Some(record) = guard.get(&id) else {
            return 0;
        };
        let to_copy = record.len().min(buf.len());
        let whole_records = to_copy / ADJACENCY_RECORD_SIZE * ADJACENCY_RECORD_SIZE;
        buf[..whole_records].copy_from_slice(&record[..whole_records]);
        whole_records / ADJACENCY_RECORD_SIZE
    }

    fn weight_data(&self, id: UserId) -> (Vec<UserId>, Vec<Strength>) {
        let guard = self.adjacency.read();
        let Some(record) = guard.get(&id) else {
            return (Vec::new(), Vec::new());
        };
        let mut targets = Vec::with_capacity(record.len() / ADJACENCY_RECORD_SIZE);
        let mut strengths = Vec::with_capacity(targets.capacity());
        for chunk in record.chunks_exact(ADJACENCY_RECORD_SIZE) {
            let mut cur = Cursor::new(chunk);
            targets.push(cur.read_u32::<LittleEndian>().unwrap());
            strengths.push(cur.read_i64::<LittleEndian>().unwrap());
        }
        (targets, strengths)
    }

    fn weight(&self, source: UserId, target: UserId) -> Option<Strength> {
        let guard = self.adjacency.read();
        let record = guard.get(&source)?;
        let offset = Self::find_record_offset(record, target)?;
        let mut cur = Cursor::new(&record[offset + 4..offset + ADJACENCY_RECORD_SIZE]);
        Some(cur.read_i64::<LittleEndian>().unwrap())
    }

    fn set_weight(
        &self,
        source: UserId,
        target: UserId,
        strength: Strength,
        timestamp: i64,
    ) -> Result<(), StoreError> {
        let mut ts_guard = self.timestamps.write();
        if let Some(&existing_ts) = ts_guard.get(&(source, target)) {
            if timestamp < existing_ts {
                // An out-of-order write loses to whatever is already recorded.
                return Ok(());
            }
        }

        let mut guard = self.adjacency.write();
        let record = guard.entry(source).or_default();
        if let Some(offset) = Self::find_record_offset(record, target) {
            let mut replacement = Vec::with_capacity(ADJACENCY_RECORD_SIZE);
            Self::encode_record(&mut replacement, target, strength);
            record[offset..offset + ADJACENCY_RECORD_SIZE].copy_from_slice(&replacement);
        } else {
            Self::encode_record(record, target, strength);
        }
        ts_guard.insert((source, target), timestamp);
        Ok(())
    }

    fn remove(&self, source: UserId, target: UserId, timestamp: i64) -> Result<(), StoreError> {
        let mut ts_guard = self.timestamps.write();
        if let Some(&existing_ts) = ts_guard.get(&(source, target)) {
            if timestamp < existing_ts {
                return Ok(());
            }
        }

        let mut guard = self.adjacency.write();
        if let Some(record) = guard.get_mut(&source) {
            if let Some(offset) = Self::find_record_offset(record, target) {
                record.drain(offset..offset + ADJACENCY_RECORD_SIZE);
            }
        }
        ts_guard.insert((source, target), timestamp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typeahead_core::{ConnectionsStore, SimpleElement};

    #[test]
    fn element_store_rejects_out_of_range_ids() {
        let store: InMemoryElementStore<SimpleElement> = InMemoryElementStore::new(Range::new(100, 10));
        let elem = SimpleElement::new(5, ["oops"]);
        assert!(store.set_element(5, elem, 0).is_err());
        assert!(!store.has_index(5));
    }

    #[test]
    fn element_store_round_trips_within_range() {
        let store = InMemoryElementStore::new(Range::new(0, 10));
        let elem = SimpleElement::new(3, ["alice", "smith"]);
        store.set_element(3, elem.clone(), 1).unwrap();
        assert!(store.has_index(3));
        assert_eq!(store.get_element(3), Some(elem));
    }

    #[test]
    fn connections_store_set_get_remove() {
        let store = InMemoryConnectionsStore::new();
        store.set_weight(1, 10, 3, 100).unwrap();
        store.set_weight(1, 20, 7, 101).unwrap();
        assert_eq!(store.weight(1, 10), Some(3));
        assert_eq!(store.length(1), 2);

        store.set_weight(1, 10, 9, 102).unwrap();
        assert_eq!(store.weight(1, 10), Some(9));
        assert_eq!(store.length(1), 2, "update must not append a duplicate record");

        store.remove(1, 10, 103).unwrap();
        assert_eq!(store.weight(1, 10), None);
        assert_eq!(store.length(1), 1);
    }

    #[test]
    fn connections_store_last_writer_wins_by_timestamp() {
        let store = InMemoryConnectionsStore::new();
        store.set_weight(1, 10, 5, 100).unwrap();
        store.set_weight(1, 10, 999, 50).unwrap();
        assert_eq!(
            store.weight(1, 10),
            Some(5),
            "a write with an older timestamp must not clobber a newer one"
        );
    }

    #[test]
    fn get_bytes_round_trips_through_weight_data() {
        let store = InMemoryConnectionsStore::new();
        store.set_weight(1, 10, 3, 1).unwrap();
        store.set_weight(1, 20, 7, 2).unwrap();

        let mut buf = Vec::new();
        let count = store.get_bytes(1, &mut buf).unwrap();
        assert_eq!(count, 2);
        assert_eq!(buf.len(), 2 * ADJACENCY_RECORD_SIZE);

        let (targets, strengths) = store.weight_data(1);
        assert_eq!(targets, vec![10, 20]);
        assert_eq!(strengths, vec![3, 7]);
    }
}
