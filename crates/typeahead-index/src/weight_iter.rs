use typeahead_core::{ElementId, Strength};

/// Wire size of one packed `(target, strength)` record: a little-endian `u32` target id
/// followed by a little-endian `i64` strength. Matches the layout `typeahead_store`'s reference
/// adjacency store writes; any `ConnectionsStore` the engine is pointed at must agree on this
/// encoding for `WeightIterator` to decode its bytes correctly.
pub const RECORD_SIZE: usize = 4 + 8;

/// Lazy, forward-only decoder over a packed byte buffer. Non-restartable: once a pair has been
/// yielded it cannot be replayed. The buffer is owned for the iterator's lifetime; `into_buffer`
/// recovers it (possibly larger than when it was handed in, if the store reallocated) so the
/// caller can decide whether it's still poolable.
pub struct WeightIterator {
    buffer: Vec<u8>,
    cursor: usize,
    end: usize,
}

impl WeightIterator {
    /// Builds an iterator over `buffer[offset..offset + length]`. `length` need not be a
    /// multiple of `RECORD_SIZE`; a short trailing remainder is simply never yielded.
    pub fn new(buffer: Vec<u8>, offset: usize, length: usize) -> Self {
        let start = offset.min(buffer.len());
        let end = start.saturating_add(length).min(buffer.len());
        Self {
            buffer,
            cursor: start,
            end,
        }
    }

    /// Builds an iterator over the first `record_count` records of `buffer`, as returned by
    /// `ConnectionsStore::get_bytes`.
    pub fn from_record_count(buffer: Vec<u8>, record_count: usize) -> Self {
        Self::new(buffer, 0, record_count * RECORD_SIZE)
    }

    /// Recovers the underlying buffer once the iterator is done (or abandoned early).
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

impl Iterator for WeightIterator {
    type Item = (ElementId, Strength);

    fn next(&mut self) -> Option<Self::Item> {
        if self.end.saturating_sub(self.cursor) < RECORD_SIZE {
            return None;
        }
        let chunk = &self.buffer[self.cursor..self.cursor + RECORD_SIZE];
        let target = u32::from_le_bytes(chunk[0..4].try_into().expect("4-byte slice"));
        let strength = i64::from_le_bytes(chunk[4..12].try_into().expect("8-byte slice"));
        self.cursor += RECORD_SIZE;
        Some((target, strength))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(pairs: &[(u32, i64)]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(pairs.len() * RECORD_SIZE);
        for (id, w) in pairs {
            buf.extend_from_slice(&id.to_le_bytes());
            buf.extend_from_slice(&w.to_le_bytes());
        }
        buf
    }

    #[test]
    fn decodes_pairs_in_order() {
        let pairs = [(1u32, 10i64), (2, 20), (3, 30)];
        let buf = encode(&pairs);
        let iter = WeightIterator::from_record_count(buf, pairs.len());
        let decoded: Vec<_> = iter.collect();
        assert_eq!(decoded, pairs.to_vec());
    }

    #[test]
    fn stops_at_configured_length_even_with_trailing_bytes() {
        let mut buf = encode(&[(1, 10), (2, 20)]);
        buf.extend_from_slice(&[0xFF; 4]); // short trailing garbage
        let iter = WeightIterator::new(buf, 0, 2 * RECORD_SIZE);
        assert_eq!(iter.count(), 2);
    }

    #[test]
    fn into_buffer_recovers_the_backing_storage() {
        let buf = encode(&[(1, 10)]);
        let original_ptr_len = buf.len();
        let mut iter = WeightIterator::from_record_count(buf, 1);
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        let recovered = iter.into_buffer();
        assert_eq!(recovered.len(), original_ptr_len);
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let iter = WeightIterator::from_record_count(Vec::new(), 0);
        assert_eq!(iter.count(), 0);
    }
}
