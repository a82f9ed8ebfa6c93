#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]

//! Reference implementations of the two external stores the typeahead engine depends on
//! (`typeahead_core::ElementStore` / `typeahead_core::ConnectionsStore`). Neither the wire
//! format nor the persistence strategy here is part of the engine's contract — a production
//! deployment is free to swap in its own store as long as it upholds the trait.

mod ram_impl;
pub use ram_impl::{InMemoryConnectionsStore, InMemoryElementStore};

/// Adjacency records are packed as repeated `[target: u32 LE][strength: i64 LE]` chunks. Both
/// the in-memory and persistent stores below write this format, and
/// `typeahead_index::WeightIterator` is the sole reader of it.
pub const ADJACENCY_RECORD_SIZE: usize = 4 + 8;

#[cfg(feature = "mmap")]
pub mod wal;

#[cfg(feature = "mmap")]
mod mmap_impl;
#[cfg(feature = "mmap")]
pub use mmap_impl::PersistentConnectionsStore;
