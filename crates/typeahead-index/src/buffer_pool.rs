use crossbeam::queue::ArrayQueue;

/// Bounded FIFO of fixed-size scratch buffers, so the query path can decode a user's adjacency
/// bytes without a per-query allocation. `get()` never blocks and returns `None` on an empty
/// pool; callers allocate a fresh buffer in that case. `put()` silently drops any buffer whose
/// length doesn't match the pool's canonical size, so a single oversized record can't poison the
/// pool with buffers that no longer amortize anything.
pub struct ByteBufferPool {
    queue: ArrayQueue<Vec<u8>>,
    buffer_size: usize,
}

impl ByteBufferPool {
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            buffer_size,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn get(&self) -> Option<Vec<u8>> {
        self.queue.pop()
    }

    /// Convenience over `get()` for call sites that always need a buffer: returns a pooled one
    /// or allocates a fresh, zero-filled buffer of the canonical size.
    pub fn get_or_alloc(&self) -> Vec<u8> {
        self.get().unwrap_or_else(|| vec![0u8; self.buffer_size])
    }

    pub fn put(&self, buf: Vec<u8>) {
        if buf.len() == self.buffer_size {
            // A full pool means some other thread already returned a buffer; drop ours rather
            // than block or grow the queue.
            let _ = self.queue.push(buf);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
