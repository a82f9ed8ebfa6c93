pub mod config;

pub use config::TypeaheadConfig;

use std::collections::HashMap;

/// A querying user or any vertex in the affinity graph, addressed by integer id.
pub type UserId = u32;

/// The id space an `Element` lives in.
pub type ElementId = u32;

/// Non-negative edge weight between two vertices.
pub type Strength = i64;

/// Degree of separation a hit was reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proximity {
    Degree1,
    Degree2,
}

/// The capability the core requires of a search-result payload. The concrete element type
/// (name, profile, document, …) is supplied by the collaborator; the core never constructs one.
pub trait Element: Clone + Send + Sync {
    fn id(&self) -> ElementId;
    fn timestamp(&self) -> i64;
    fn terms(&self) -> &[String];
    /// Baseline score contributed by this element regardless of the query (usually 1.0).
    fn score(&self) -> f64;
}

/// A directed, weighted edge in the affinity graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub source: UserId,
    pub target: UserId,
    pub strength: Strength,
    pub timestamp: i64,
    pub active: bool,
}

impl Connection {
    pub fn new(source: UserId, target: UserId, strength: Strength, timestamp: i64) -> Self {
        Self {
            source,
            target,
            strength,
            timestamp,
            active: true,
        }
    }

    pub fn removal(source: UserId, target: UserId, timestamp: i64) -> Self {
        Self {
            source,
            target,
            strength: 0,
            timestamp,
            active: false,
        }
    }
}

/// The half-open interval of element ids a shard is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub index_start: ElementId,
    pub capacity: u32,
}

impl Range {
    pub fn new(index_start: ElementId, capacity: u32) -> Self {
        Self {
            index_start,
            capacity,
        }
    }

    pub fn contains(&self, id: ElementId) -> bool {
        id >= self.index_start && id < self.index_start.saturating_add(self.capacity)
    }

    pub fn end(&self) -> ElementId {
        self.index_start.saturating_add(self.capacity)
    }
}

/// A scored search result.
#[derive(Debug, Clone)]
pub struct Hit<E: Element> {
    pub element: E,
    pub score: f64,
    pub source_name: String,
    pub proximity: Proximity,
}

/// Monotone counters for a single query, surfaced in the post-query log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct HitStats {
    pub num_browse_hits: u64,
    pub num_filter_hits: u64,
    pub num_result_hits: u64,
    pub total_time_millis: u64,
}

/// Combines a 32-bit element-term mask and a 32-bit query-term mask. False positives are
/// tolerated (the selector re-validates); false negatives are forbidden.
pub trait BloomHash: Send + Sync {
    fn index_filter(&self, terms: &[String]) -> u32;
    fn query_filter(&self, terms: &[String]) -> u32;
}

/// Pure function combining a 1st-degree strength with a 2nd-degree strength into the
/// propagated strength used to score a 2-hop hit. Implementations must be deterministic and
/// monotone non-decreasing in both arguments.
pub trait WeightAdjuster: Send + Sync {
    fn adjust(&self, inherited: Strength, edge: Strength) -> Strength;
}

/// Per-query state handed to a `Selector`: carries whatever score the selector should report
/// back through `Hit::score`, plus the raw query terms.
#[derive(Debug, Clone)]
pub struct SelectorContext {
    pub terms: Vec<String>,
    pub score: f64,
}

/// Term-tokenizing predicate. Implementations range from literal prefix matching to compiled
/// n-gram matchers; the concrete implementation is supplied by the collaborator.
pub trait Selector<E: Element>: Send + Sync {
    /// Returns true (and may mutate `ctx.score`) iff `elem` matches `ctx.terms`.
    fn select(&self, elem: &E, ctx: &mut SelectorContext) -> bool;
}

/// Admission policy evaluated before a connection is written to the adjacency store.
pub trait ConnectionFilter: Send + Sync {
    fn accept(&self, connection: &Connection) -> bool;
    fn accept_parts(&self, source: UserId, target: UserId, active: bool) -> bool;
}

/// Accumulator owning top-K selection and early stop for one query. Strictly query-local —
/// never shared across threads.
pub trait Collector<E: Element> {
    fn add(&mut self, element: E, score: f64, source_name: &str, proximity: Proximity);
    fn can_stop(&self) -> bool;
    /// Drains the collector into its final, ranked hit list.
    fn into_hits(self: Box<Self>) -> Vec<Hit<E>>;
}

/// Recoverable failures surfaced by the index-write path. An out-of-range element id is not an
/// error here: `index_element` reports it by returning `Ok(false)` per the ArgumentRejected
/// contract in the error handling design.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("store I/O failure: {0}")]
    Store(#[from] StoreError),
}

/// Recoverable failures surfaced by an `ElementStore` / `ConnectionsStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record for id {0} not found")]
    NotFound(u32),
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },
    #[error("io error: {0}")]
    Io(String),
    #[error("codec error: {0}")]
    Codec(String),
}

/// Contract for id-addressed element storage. Owned and persisted by the collaborator; the
/// core only ever borrows immutable snapshots.
pub trait ElementStore<E: Element>: Send + Sync {
    fn has_index(&self, id: ElementId) -> bool;
    fn get_element(&self, id: ElementId) -> Option<E>;
    fn set_element(&self, id: ElementId, element: E, timestamp: i64) -> Result<(), StoreError>;
    fn index_start(&self) -> ElementId;
    fn capacity(&self) -> u32;
    fn persist(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Contract for id-addressed weighted-adjacency storage.
pub trait ConnectionsStore: Send + Sync {
    fn has_index(&self, id: UserId) -> bool;
    fn length(&self, id: UserId) -> usize;

    /// Full read. Returns the number of `(target, strength)` pairs. May grow `buf` if it is too
    /// small for the record; the caller should treat a returned buffer larger than the pool's
    /// canonical size as non-poolable.
    fn get_bytes(&self, id: UserId, buf: &mut Vec<u8>) -> Result<usize, StoreError>;

    /// Best-effort partial read into a fixed-size `buf`. Returns the number of whole
    /// `(target, strength)` records that fit; never grows `buf`.
    fn read_bytes(&self, id: UserId, buf: &mut [u8]) -> usize;

    fn weight_data(&self, id: UserId) -> (Vec<UserId>, Vec<Strength>);
    fn weight(&self, source: UserId, target: UserId) -> Option<Strength>;
    fn set_weight(
        &self,
        source: UserId,
        target: UserId,
        strength: Strength,
        timestamp: i64,
    ) -> Result<(), StoreError>;
    fn remove(&self, source: UserId, target: UserId, timestamp: i64) -> Result<(), StoreError>;
    fn persist(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A minimal in-memory `Element` used by tests and the demo CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleElement {
    pub id: ElementId,
    pub timestamp: i64,
    pub terms: Vec<String>,
    pub score: f64,
}

impl SimpleElement {
    pub fn new(id: ElementId, terms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id,
            timestamp: 0,
            terms: terms.into_iter().map(Into::into).collect(),
            score: 1.0,
        }
    }
}

impl Element for SimpleElement {
    fn id(&self) -> ElementId {
        self.id
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn terms(&self) -> &[String] {
        &self.terms
    }
    fn score(&self) -> f64 {
        self.score
    }
}

/// Default, deterministic, monotone non-decreasing weight adjuster.
///
/// `adjust(a, b) = min(a, b) + floor(log2(1 + |a - b|))`, clamped non-negative. Two strong
/// edges in series propagate close to their minimum (a typeahead chain is only as strong as
/// its weakest link) while still rewarding an exceptionally strong second hop.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWeightAdjuster;

impl WeightAdjuster for DefaultWeightAdjuster {
    fn adjust(&self, inherited: Strength, edge: Strength) -> Strength {
        let lo = inherited.min(edge).max(0);
        let hi = inherited.max(edge).max(0);
        let spread = (hi - lo) as f64;
        lo + (1.0 + spread).log2().floor() as i64
    }
}

/// FNV-1a based bloom hash. A query term is typed character-by-character, so at index time every
/// prefix of every element term contributes its own bit (`hash(prefix) % 32`) to the mask; a query
/// then sets the bit for each literal term it was given, which is itself a prefix the user typed.
/// The full term is always included as its own (longest) prefix, so the subset contract in
/// `BloomHash`'s docs holds for exact-term queries as well as partial ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fnv1aBloomHash;

impl Fnv1aBloomHash {
    fn term_bit(term: &str) -> u32 {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;
        let mut hash = FNV_OFFSET;
        for byte in term.to_lowercase().as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        1u32 << (hash % 32)
    }

    fn prefix_bits(term: &str) -> u32 {
        let lower = term.to_lowercase();
        let mut mask = 0u32;
        let mut end = 0;
        for ch in lower.chars() {
            end += ch.len_utf8();
            mask |= Self::term_bit(&lower[..end]);
        }
        mask
    }
}

impl BloomHash for Fnv1aBloomHash {
    fn index_filter(&self, terms: &[String]) -> u32 {
        terms.iter().fold(0u32, |mask, t| mask | Self::prefix_bits(t))
    }

    fn query_filter(&self, terms: &[String]) -> u32 {
        terms.iter().fold(0u32, |mask, t| mask | Self::term_bit(t))
    }
}

/// Default `ConnectionFilter` that accepts everything. The admission policy is deliberately
/// pluggable; this reference implementation exists so the engine is usable standalone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveConnectionFilter;

impl ConnectionFilter for PermissiveConnectionFilter {
    fn accept(&self, _connection: &Connection) -> bool {
        true
    }
    fn accept_parts(&self, _source: UserId, _target: UserId, _active: bool) -> bool {
        true
    }
}

/// Default `Selector`: a match requires every query term to be a case-insensitive prefix of
/// some element term. The score is the fraction of query terms matched times the element's
/// baseline score.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixSelector;

impl<E: Element> Selector<E> for PrefixSelector {
    fn select(&self, elem: &E, ctx: &mut SelectorContext) -> bool {
        if ctx.terms.is_empty() {
            return false;
        }
        let elem_terms: Vec<String> = elem.terms().iter().map(|t| t.to_lowercase()).collect();
        let mut matched = 0usize;
        for term in &ctx.terms {
            let needle = term.to_lowercase();
            if elem_terms.iter().any(|t| t.starts_with(&needle)) {
                matched += 1;
            }
        }
        if matched == 0 {
            return false;
        }
        ctx.score = elem.score() * (matched as f64 / ctx.terms.len() as f64);
        true
    }
}

/// Tokenizes free text into lowercase alphanumeric words, mirroring the tokenizer a selector
/// would use to build its own term index.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(str::to_lowercase)
        .map(|s| s.chars().filter(|c| c.is_alphanumeric()).collect())
        .filter(|s: &String| !s.is_empty())
        .collect()
}

/// Forward metadata lookup kept alongside an `Element`, for collaborators that want to attach
/// free-form attributes without widening the `Element` trait.
pub type Attributes = HashMap<String, String>;
