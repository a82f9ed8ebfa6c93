#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]

//! The two-hop weighted traversal engine for the network typeahead query path: the bloom
//! prefilter / filter store, the byte-buffer pool, the weight iterator, the reference top-K
//! collector, and the [`NetworkTypeahead`] engine itself (query executor + index executor).
//!
//! Everything the engine depends on (element storage, adjacency storage, the term selector, the
//! bloom hash, the connection admission filter, the weight adjuster) is a trait defined in
//! `typeahead_core` and supplied by the caller; this crate only orchestrates them.

mod buffer_pool;
mod collector;
mod engine;
mod filter_store;
mod weight_iter;

pub use buffer_pool::ByteBufferPool;
pub use collector::TopKCollector;
pub use engine::{NetworkTypeahead, NetworkTypeaheadContext};
pub use filter_store::FilterStore;
pub use weight_iter::{WeightIterator, RECORD_SIZE};
