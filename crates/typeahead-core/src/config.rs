use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Runtime configuration for the typeahead engine.
/// Thread-safe via atomics, can be changed on-the-fly without taking a store lock.
#[derive(Debug)]
pub struct TypeaheadConfig {
    /// Number of buffers held by the byte-buffer pool.
    bytes_pool_size: AtomicU32,

    /// Size in bytes of each pooled buffer.
    byte_array_size: AtomicU32,

    /// Whether the post-query summary line is emitted via `tracing`.
    logging_enabled: AtomicBool,

    /// Whether `ConnectionsStore::read_bytes` (partial, non-allocating reads) is preferred
    /// over `get_bytes` (full, possibly-allocating reads) on the query path.
    partial_read_enabled: AtomicBool,

    /// Number of browsed edges between deadline checks in the inner loops.
    deadline_check_interval: AtomicU64,
}

pub const DEFAULT_BYTES_POOL_SIZE: u32 = 100;
pub const DEFAULT_BYTE_ARRAY_SIZE: u32 = 32_768;
pub const DEFAULT_DEADLINE_CHECK_INTERVAL: u64 = 100;

impl TypeaheadConfig {
    pub fn new() -> Self {
        Self {
            bytes_pool_size: AtomicU32::new(DEFAULT_BYTES_POOL_SIZE),
            byte_array_size: AtomicU32::new(DEFAULT_BYTE_ARRAY_SIZE),
            logging_enabled: AtomicBool::new(true),
            partial_read_enabled: AtomicBool::new(false),
            deadline_check_interval: AtomicU64::new(DEFAULT_DEADLINE_CHECK_INTERVAL),
        }
    }

    pub fn bytes_pool_size(&self) -> u32 {
        self.bytes_pool_size.load(Ordering::Relaxed)
    }

    pub fn set_bytes_pool_size(&self, val: u32) {
        self.bytes_pool_size.store(val, Ordering::Relaxed);
    }

    pub fn byte_array_size(&self) -> u32 {
        self.byte_array_size.load(Ordering::Relaxed)
    }

    pub fn set_byte_array_size(&self, val: u32) {
        self.byte_array_size.store(val, Ordering::Relaxed);
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled.load(Ordering::Relaxed)
    }

    pub fn set_logging_enabled(&self, val: bool) {
        self.logging_enabled.store(val, Ordering::Relaxed);
    }

    pub fn partial_read_enabled(&self) -> bool {
        self.partial_read_enabled.load(Ordering::Relaxed)
    }

    pub fn set_partial_read_enabled(&self, val: bool) {
        self.partial_read_enabled.store(val, Ordering::Relaxed);
    }

    pub fn deadline_check_interval(&self) -> u64 {
        self.deadline_check_interval.load(Ordering::Relaxed)
    }

    pub fn set_deadline_check_interval(&self, val: u64) {
        self.deadline_check_interval.store(val.max(1), Ordering::Relaxed);
    }
}

impl Default for TypeaheadConfig {
    fn default() -> Self {
        Self::new()
    }
}
