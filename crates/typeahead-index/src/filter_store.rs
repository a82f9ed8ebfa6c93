use std::sync::atomic::{AtomicU32, Ordering};

use typeahead_core::{ElementId, Range};

/// Dense `id -> ElemMask` table sized to a [`Range`]. Reads are lock-free; writes happen only
/// under the index executor's element lock, so a single `Release` store per word is enough to
/// make the new mask visible to concurrent `Relaxed` readers without an external lock.
///
/// A reader may observe a stale mask while an `index_element` call is mid-flight. This is
/// tolerated: the selector re-validates against the element fetched from the element store, so a
/// stale mask can only cost precision, never correctness.
pub struct FilterStore {
    range: Range,
    masks: Vec<AtomicU32>,
}

impl FilterStore {
    pub fn new(range: Range) -> Self {
        let masks = (0..range.capacity).map(|_| AtomicU32::new(0)).collect();
        Self { range, masks }
    }

    pub fn range(&self) -> Range {
        self.range
    }

    /// Returns the mask for `id`, or `0` (admits nothing but the empty query mask) if `id` is
    /// outside the store's range.
    pub fn get(&self, id: ElementId) -> u32 {
        self.slot(id)
            .map_or(0, |i| self.masks[i].load(Ordering::Relaxed))
    }

    /// Stores `mask` for `id`. Returns `false` without writing if `id` is outside the range.
    pub fn set(&self, id: ElementId, mask: u32) -> bool {
        match self.slot(id) {
            Some(i) => {
                self.masks[i].store(mask, Ordering::Release);
                true
            }
            None => false,
        }
    }

    fn slot(&self, id: ElementId) -> Option<usize> {
        if self.range.contains(id) {
            Some((id - self.range.index_start) as usize)
        } else {
            None
        }
    }
}
