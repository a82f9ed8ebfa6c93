//! Index-executor properties (spec §8 properties 1, 2, 11).

use typeahead_core::{
    BloomHash, Connection, DefaultWeightAdjuster, Fnv1aBloomHash, PermissiveConnectionFilter,
    PrefixSelector, Range, SimpleElement, TypeaheadConfig,
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

fn build_engine_with_range(range: Range) -> Engine {
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
fn filter_store_matches_bloom_index_filter_after_a_successful_index() {
    let engine = build_engine_with_range(Range::new(0, 100));
    let elem = SimpleElement::new(5, ["alice", "smith"]);
    assert!(engine.index_element(elem.clone()).unwrap());

    let expected = Fnv1aBloomHash.index_filter(elem.terms());
    assert_eq!(engine.filter_mask(5), expected);
}

#[test]
fn range_gate_rejects_out_of_range_ids_without_mutating_the_filter_store() {
    let engine = build_engine_with_range(Range::new(100, 10));
    let elem = SimpleElement::new(5, ["oops"]);
    assert!(!engine.index_element(elem).unwrap());
    assert_eq!(engine.filter_mask(5), 0);
}

#[test]
fn connection_with_zero_strength_inherits_the_previous_positive_strength() {
    let engine = build_engine_with_range(Range::new(0, 100));
    engine.index_connection(Connection::new(1, 10, 7, 0)).unwrap();
    // strength 0 on a later index call must not clobber the stored strength of 7.
    engine.index_connection(Connection::new(1, 10, 0, 1)).unwrap();

    let ctx = engine.create_context(1);
    let (targets, strengths) = ctx.connection_strengths;
    let idx = targets.iter().position(|&t| t == 10).unwrap();
    assert_eq!(strengths[idx], 7);
}

#[test]
fn removing_a_connection_leaves_the_source_with_no_adjacency() {
    let engine = build_engine_with_range(Range::new(0, 100));
    engine.index_connection(Connection::new(1, 10, 7, 0)).unwrap();
    engine.index_connection(Connection::removal(1, 10, 1)).unwrap();

    let ctx = engine.create_context(1);
    assert!(!ctx.has_connections());
}

#[test]
fn flush_persists_both_stores_without_error() {
    let engine = build_engine_with_range(Range::new(0, 100));
    engine.index_element(SimpleElement::new(1, ["a"])).unwrap();
    engine.index_connection(Connection::new(1, 2, 1, 0)).unwrap();
    assert!(engine.flush().is_ok());
}

#[test]
fn connection_filter_rejection_leaves_the_store_untouched() {
    struct RejectAll;
    impl typeahead_core::ConnectionFilter for RejectAll {
        fn accept(&self, _connection: &Connection) -> bool {
            false
        }
        fn accept_parts(&self, _source: u32, _target: u32, _active: bool) -> bool {
            false
        }
    }

    let range = Range::new(0, 100);
    let engine: NetworkTypeahead<
        SimpleElement,
        InMemoryElementStore<SimpleElement>,
        InMemoryConnectionsStore,
        Fnv1aBloomHash,
        PrefixSelector,
        RejectAll,
        DefaultWeightAdjuster,
    > = NetworkTypeahead::new(
        "typeahead",
        range,
        InMemoryElementStore::new(range),
        InMemoryConnectionsStore::new(),
        Fnv1aBloomHash,
        PrefixSelector,
        RejectAll,
        DefaultWeightAdjuster,
        TypeaheadConfig::new(),
    );

    let applied = engine.index_connection(Connection::new(1, 2, 5, 0)).unwrap();
    assert!(!applied);
    let ctx = engine.create_context(1);
    assert!(!ctx.has_connections());
}
