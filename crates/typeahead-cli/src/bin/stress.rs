//! Concurrent index/query load generator: seed a graph, then hammer it with writer and reader
//! threads and report throughput. Not a shipped product surface.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use rand::Rng;
use typeahead_core::{
    Connection, DefaultWeightAdjuster, Fnv1aBloomHash, PermissiveConnectionFilter, PrefixSelector,
    Range, SimpleElement, TypeaheadConfig,
};
use typeahead_index::NetworkTypeahead;
use typeahead_store::{InMemoryConnectionsStore, InMemoryElementStore};

const TOTAL_USERS: u32 = 100_000;
const WRITER_THREADS: u32 = 8;
const READER_THREADS: u32 = 8;
const QUERIES_PER_READER: u32 = 2_000;

type Engine = NetworkTypeahead<
    SimpleElement,
    InMemoryElementStore<SimpleElement>,
    InMemoryConnectionsStore,
    Fnv1aBloomHash,
    PrefixSelector,
    PermissiveConnectionFilter,
    DefaultWeightAdjuster,
>;

fn main() {
    tracing_subscriber::fmt::init();
    println!("seeding {TOTAL_USERS} users");

    let range = Range::new(0, TOTAL_USERS);
    let engine = Arc::new(NetworkTypeahead::new(
        "stress",
        range,
        InMemoryElementStore::<SimpleElement>::new(range),
        InMemoryConnectionsStore::new(),
        Fnv1aBloomHash,
        PrefixSelector,
        PermissiveConnectionFilter,
        DefaultWeightAdjuster,
        TypeaheadConfig::new(),
    ));

    let per_writer = TOTAL_USERS / WRITER_THREADS;
    let start_index = Instant::now();
    let mut handles = Vec::new();
    for writer in 0..WRITER_THREADS {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let base = writer * per_writer;
            for offset in 0..per_writer {
                let id = base + offset;
                engine
                    .index_element(SimpleElement::new(id, [format!("user{id}")]))
                    .expect("ids are inside the configured range");
                engine.index_connection(Connection::new(0, id, 1, i64::from(id))).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().expect("writer thread panicked");
    }
    let index_elapsed = start_index.elapsed();
    println!(
        "indexed {TOTAL_USERS} users in {index_elapsed:.2?} ({:.0} elements/sec)",
        TOTAL_USERS as f64 / index_elapsed.as_secs_f64()
    );

    let start_query = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..READER_THREADS {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..QUERIES_PER_READER {
                let id: u32 = rng.gen_range(0..TOTAL_USERS);
                let term = format!("user{id}");
                let prefix = &term[..term.len().min(5)];
                let _ = engine.search_bounded(0, &[prefix.to_string()], 10, 50);
            }
        }));
    }
    for h in handles {
        h.join().expect("reader thread panicked");
    }
    let query_elapsed = start_query.elapsed();
    let total_queries = READER_THREADS * QUERIES_PER_READER;
    println!(
        "ran {total_queries} queries in {query_elapsed:.2?} ({:.0} queries/sec)",
        f64::from(total_queries) / query_elapsed.as_secs_f64()
    );
}
