use std::cmp::Ordering;
use std::collections::BinaryHeap;

use typeahead_core::{Collector, Element, Hit, Proximity};

/// Min-heap entry ordered by score so the smallest-scoring hit is always the one evicted when
/// the heap exceeds its cap. Ties fall back to insertion order via a monotone sequence number so
/// `Ord` stays total even when two scores compare equal.
struct Entry<E: Element> {
    hit: Hit<E>,
    seq: u64,
}

impl<E: Element> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.hit.score == other.hit.score && self.seq == other.seq
    }
}
impl<E: Element> Eq for Entry<E> {}

impl<E: Element> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E: Element> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap over score.
        other
            .hit
            .score
            .partial_cmp(&self.hit.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Reference `Collector`: a bounded min-heap top-K selector. `can_stop()` reports true once the
/// heap has reached its cap — once full, every subsequent add either displaces the current
/// minimum or is dropped.
pub struct TopKCollector<E: Element> {
    heap: BinaryHeap<Entry<E>>,
    cap: Option<usize>,
    next_seq: u64,
}

impl<E: Element> TopKCollector<E> {
    /// `cap = None` collects every match; `cap = Some(k)` bounds the collector to its top `k`.
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            heap: BinaryHeap::new(),
            cap,
            next_seq: 0,
        }
    }
}

impl<E: Element> Default for TopKCollector<E> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<E: Element> Collector<E> for TopKCollector<E> {
    fn add(&mut self, element: E, score: f64, source_name: &str, proximity: Proximity) {
        let entry = Entry {
            hit: Hit {
                element,
                score,
                source_name: source_name.to_string(),
                proximity,
            },
            seq: self.next_seq,
        };
        self.next_seq += 1;

        match self.cap {
            Some(cap) if cap == 0 => {}
            Some(cap) if self.heap.len() >= cap => {
                // `peek` on our reversed ordering returns the current minimum-scoring entry.
                if let Some(worst) = self.heap.peek() {
                    if entry.hit.score > worst.hit.score {
                        self.heap.pop();
                        self.heap.push(entry);
                    }
                }
            }
            _ => self.heap.push(entry),
        }
    }

    fn can_stop(&self) -> bool {
        matches!(self.cap, Some(cap) if self.heap.len() >= cap)
    }

    fn into_hits(self: Box<Self>) -> Vec<Hit<E>> {
        let mut hits: Vec<Hit<E>> = self.heap.into_iter().map(|e| e.hit).collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits
    }
}
