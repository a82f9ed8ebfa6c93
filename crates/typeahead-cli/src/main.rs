//! Demo binary for the network typeahead engine. Not a shipped product surface: this wires up
//! the in-memory reference stores and the default collaborators so the engine can be exercised
//! from a terminal as an integration smoke test.

use clap::{Parser, Subcommand};
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

#[derive(Parser)]
#[command(name = "typeahead-cli", about = "Demo driver for the network typeahead engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a handful of sample users and connections, then run a few example queries.
    Demo,
    /// Index `--users` users each connected to the given source, then run a single query.
    Query {
        #[arg(long, default_value = "al")]
        term: String,
        #[arg(long, default_value_t = 1)]
        source: u32,
        #[arg(long, default_value_t = 100)]
        users: u32,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
}

fn build_engine(capacity: u32) -> Engine {
    let range = Range::new(0, capacity);
    NetworkTypeahead::new(
        "demo",
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

fn run_demo() {
    let engine = build_engine(1_000);

    let people = [
        (10u32, ["alice", "smith"].as_slice()),
        (20, ["bob", "jones"].as_slice()),
        (30, ["alicia", "keys"].as_slice()),
        (40, ["carol", "danvers"].as_slice()),
    ];
    for (id, terms) in people {
        engine
            .index_element(SimpleElement::new(id, terms.iter().copied()))
            .expect("demo ids are inside the configured range");
    }

    engine.index_connection(Connection::new(1, 10, 8, 0)).unwrap();
    engine.index_connection(Connection::new(1, 20, 3, 1)).unwrap();
    engine.index_connection(Connection::new(1, 2, 5, 2)).unwrap();
    engine.index_connection(Connection::new(2, 30, 4, 3)).unwrap();
    engine.index_connection(Connection::new(2, 40, 1, 4)).unwrap();

    for term in ["al", "bo", "car"] {
        let hits = engine.search(1, &[term.to_string()]);
        println!("query {term:?} -> {} hit(s)", hits.len());
        for hit in hits {
            println!(
                "  id={} score={:.3} proximity={:?}",
                hit.element.id, hit.score, hit.proximity
            );
        }
    }
}

fn run_query(term: String, source: u32, users: u32, top_k: usize) {
    let engine = build_engine(users + 1);
    for id in 0..users {
        engine
            .index_element(SimpleElement::new(id, [format!("{term}{id}")]))
            .expect("generated ids are inside the configured range");
        engine.index_connection(Connection::new(source, id, 1, i64::from(id))).unwrap();
    }

    let (hits, stats) = engine.search_bounded_with_stats(source, &[term.clone()], top_k, i64::MAX);
    println!(
        "term={term:?} browsed={} filtered={} results={} hits={}",
        stats.num_browse_hits,
        stats.num_filter_hits,
        stats.num_result_hits,
        hits.len()
    );
    for hit in hits {
        println!("  id={} score={:.3}", hit.element.id, hit.score);
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Demo => run_demo(),
        Command::Query { term, source, users, top_k } => run_query(term, source, users, top_k),
    }
}
