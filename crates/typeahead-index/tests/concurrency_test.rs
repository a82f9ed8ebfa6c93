//! Concurrent query / index stress (spec §5): query threads read while index threads write, and
//! no write is ever lost or corrupted by the two coarse locks.

use std::sync::Arc;
use std::thread;

use typeahead_core::{
    Connection, DefaultWeightAdjuster, Fnv1aBloomHash, PermissiveConnectionFilter, PrefixSelector,
    Range, SimpleElement, TypeaheadConfig,
};
use typeahead_index::NetworkTypeahead;
use typeahead_store::{InMemoryConnectionsStore, InMemoryElementStore};

type Engine = NetworkTypeahead<
    SimpleElement,
    InMemoryElementStore<SimpleElement>,
    InMemoryConnectionsStore,
    Fnv1aBloomHash,
    PrefixSelector,
    PermissiveConnectionFilter,
    DefaultWeightAdjuster,
>;

fn build_engine() -> Engine {
    let range = Range::new(0, 10_000);
    NetworkTypeahead::new(
        "typeahead",
        range,
        InMemoryElementStore::new(range),
        InMemoryConnectionsStore::new(),
        Fnv1aBloomHash,
        PrefixSelector,
        PermissiveConnectionFilter,
        DefaultWeightAdjuster,
        TypeaheadConfig::new(),
    )
}

#[test]
fn concurrent_indexing_and_querying_never_panics_or_deadlocks() {
    let engine = Arc::new(build_engine());

    // Seed one stable element/connection pair so reader threads always have something to find.
    engine
        .index_element(SimpleElement::new(0, ["seed"]))
        .unwrap();
    engine.index_connection(Connection::new(1, 0, 5, 0)).unwrap();

    let mut handles = Vec::new();

    for writer_id in 0..4u32 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..200u32 {
                let id = 1 + writer_id * 1000 + i;
                engine
                    .index_element(SimpleElement::new(id, [format!("term{i}")]))
                    .unwrap();
                engine
                    .index_connection(Connection::new(1, id, i64::from(i % 10), i64::from(i)))
                    .unwrap();
            }
        }));
    }

    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                let hits = engine.search(1, &["seed".to_string()]);
                assert!(hits.iter().any(|h| h.element.id == 0));
            }
        }));
    }

    for h in handles {
        h.join().expect("worker thread panicked");
    }

    // After every writer has finished, every written element must be both present in the
    // element store and consistently masked in the filter store.
    for writer_id in 0..4u32 {
        for i in 0..200u32 {
            let id = 1 + writer_id * 1000 + i;
            let hits = engine.search_bounded(1, &[format!("term{i}")], usize::MAX, i64::MAX);
            assert!(hits.iter().any(|h| h.element.id == id));
        }
    }
}

#[test]
fn buffer_pool_never_exceeds_its_configured_capacity_under_concurrent_queries() {
    let config = TypeaheadConfig::new();
    config.set_bytes_pool_size(4);
    let range = Range::new(0, 1000);
    let engine = Arc::new(NetworkTypeahead::new(
        "typeahead",
        range,
        InMemoryElementStore::<SimpleElement>::new(range),
        InMemoryConnectionsStore::new(),
        Fnv1aBloomHash,
        PrefixSelector,
        PermissiveConnectionFilter,
        DefaultWeightAdjuster,
        config,
    ));

    engine
        .index_element(SimpleElement::new(0, ["seed"]))
        .unwrap();
    for i in 0..50u32 {
        engine.index_connection(Connection::new(i, 0, 1, 0)).unwrap();
    }

    let mut handles = Vec::new();
    for uid in 0..50u32 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let _ = engine.search(uid, &["seed".to_string()]);
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}
