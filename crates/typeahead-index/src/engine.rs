use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Instant;

use parking_lot::Mutex;

use typeahead_core::{
    BloomHash, Collector, Connection, ConnectionFilter, ConnectionsStore, Element, ElementStore,
    HitStats, IndexError, Proximity, Range, Selector, SelectorContext, Strength, TypeaheadConfig,
    UserId, WeightAdjuster,
};

use crate::buffer_pool::ByteBufferPool;
use crate::filter_store::FilterStore;
use crate::weight_iter::WeightIterator;

/// Advisory, coarse-grained wall-clock budget for a single query. Checked at a configurable
/// cadence inside the inner loops; never aborts mid-edge. `i64::MAX` disables the check.
struct Deadline {
    start: Instant,
    timeout_millis: i64,
}

impl Deadline {
    fn new(timeout_millis: i64) -> Self {
        Self {
            start: Instant::now(),
            timeout_millis,
        }
    }

    fn exceeded(&self) -> bool {
        if self.timeout_millis == i64::MAX {
            return false;
        }
        i64::try_from(self.start.elapsed().as_millis()).unwrap_or(i64::MAX) >= self.timeout_millis
    }
}

/// Per-query state carrying the source id, a snapshot of its 1-hop adjacency taken at
/// `create_context` time, the deadline, and (implicitly, via the caller-supplied collector) the
/// accumulator. `connection_strengths` is a snapshot: later writes to the source's adjacency are
/// not reflected here.
#[derive(Debug, Clone)]
pub struct NetworkTypeaheadContext {
    pub source: UserId,
    pub connection_strengths: (Vec<UserId>, Vec<Strength>),
    pub timeout_millis: i64,
}

impl NetworkTypeaheadContext {
    pub fn has_connections(&self) -> bool {
        !self.connection_strengths.0.is_empty()
    }

    #[must_use]
    pub fn with_timeout_millis(mut self, timeout_millis: i64) -> Self {
        self.timeout_millis = timeout_millis;
        self
    }
}

/// The weighted network typeahead engine: orchestrates the 1-hop and 2-hop traversals described
/// in the module design, and the two lock-guarded index-write paths.
///
/// Generic over every external collaborator (`ElementStore`, `ConnectionsStore`, `BloomHash`,
/// `Selector`, `ConnectionFilter`, `WeightAdjuster`) so a deployment can swap any of them without
/// touching the traversal logic.
pub struct NetworkTypeahead<E, ES, CS, BH, SEL, CF, WA>
where
    E: Element,
    ES: ElementStore<E>,
    CS: ConnectionsStore,
    BH: BloomHash,
    SEL: Selector<E>,
    CF: ConnectionFilter,
    WA: WeightAdjuster,
{
    name: String,
    range: Range,
    element_store: ES,
    connections_store: CS,
    filter_store: FilterStore,
    bloom: BH,
    selector: SEL,
    conn_filter: CF,
    weight_adjuster: WA,
    buffer_pool: ByteBufferPool,
    config: TypeaheadConfig,
    element_lock: Mutex<()>,
    connection_lock: Mutex<()>,
    _marker: PhantomData<E>,
}

impl<E, ES, CS, BH, SEL, CF, WA> NetworkTypeahead<E, ES, CS, BH, SEL, CF, WA>
where
    E: Element,
    ES: ElementStore<E>,
    CS: ConnectionsStore,
    BH: BloomHash,
    SEL: Selector<E>,
    CF: ConnectionFilter,
    WA: WeightAdjuster,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        range: Range,
        element_store: ES,
        connections_store: CS,
        bloom: BH,
        selector: SEL,
        conn_filter: CF,
        weight_adjuster: WA,
        config: TypeaheadConfig,
    ) -> Self {
        let buffer_pool = ByteBufferPool::new(
            config.bytes_pool_size() as usize,
            config.byte_array_size() as usize,
        );
        Self {
            name: name.into(),
            filter_store: FilterStore::new(range),
            range,
            element_store,
            connections_store,
            bloom,
            selector,
            conn_filter,
            weight_adjuster,
            buffer_pool,
            config,
            element_lock: Mutex::new(()),
            connection_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn config(&self) -> &TypeaheadConfig {
        &self.config
    }

    /// The bloom mask currently recorded for `id`, or `0` if `id` has never been indexed (or
    /// falls outside this shard's range). Exposed primarily so callers and tests can check
    /// filter-store coherence against `BloomHash::index_filter`.
    pub fn filter_mask(&self, id: typeahead_core::ElementId) -> u32 {
        self.filter_store.get(id)
    }

    // ---- Index executor -------------------------------------------------

    /// Applies an element update under the element lock. Returns `Ok(false)` (no write
    /// attempted) if the element's id falls outside this shard's range.
    pub fn index_element(&self, element: E) -> Result<bool, IndexError> {
        let _guard = self.element_lock.lock();
        let id = element.id();
        if !self.range.contains(id) {
            return Ok(false);
        }
        // Filter store is updated before the element store so a concurrent reader observes
        // either the old mask+element or the new mask+old element, never a mask with no
        // backing element at all.
        let mask = self.bloom.index_filter(element.terms());
        self.filter_store.set(id, mask);
        let timestamp = element.timestamp();
        self.element_store.set_element(id, element, timestamp)?;
        Ok(true)
    }

    pub fn accept_connection(&self, connection: &Connection) -> bool {
        self.conn_filter.accept(connection)
    }

    pub fn accept(&self, source: UserId, target: UserId, active: bool) -> bool {
        self.conn_filter.accept_parts(source, target, active)
    }

    /// Applies a connection update under the connection lock. An active connection with
    /// `strength <= 0` inherits the currently stored strength for `(source, target)` (or `0` if
    /// none exists); an inactive connection is expressed as a removal.
    pub fn index_connection(&self, connection: Connection) -> Result<bool, IndexError> {
        let _guard = self.connection_lock.lock();
        if !self.conn_filter.accept(&connection) {
            return Ok(false);
        }
        if connection.active {
            let strength = if connection.strength <= 0 {
                self.connections_store
                    .weight(connection.source, connection.target)
                    .unwrap_or(0)
            } else {
                connection.strength
            };
            self.connections_store.set_weight(
                connection.source,
                connection.target,
                strength,
                connection.timestamp,
            )?;
        } else {
            self.connections_store
                .remove(connection.source, connection.target, connection.timestamp)?;
        }
        Ok(true)
    }

    /// Persists both stores, element lock first, then connection lock.
    pub fn flush(&self) -> Result<(), IndexError> {
        {
            let _guard = self.element_lock.lock();
            self.element_store.persist()?;
        }
        {
            let _guard = self.connection_lock.lock();
            self.connections_store.persist()?;
        }
        Ok(())
    }

    // ---- Query executor ---------------------------------------------------

    pub fn create_context(&self, uid: UserId) -> NetworkTypeaheadContext {
        NetworkTypeaheadContext {
            source: uid,
            connection_strengths: self.connections_store.weight_data(uid),
            timeout_millis: i64::MAX,
        }
    }

    pub fn search(&self, uid: UserId, terms: &[String]) -> Vec<typeahead_core::Hit<E>> {
        self.search_bounded(uid, terms, usize::MAX, i64::MAX)
    }

    pub fn search_with_deadline(
        &self,
        uid: UserId,
        terms: &[String],
        timeout_millis: i64,
    ) -> Vec<typeahead_core::Hit<E>> {
        self.search_bounded(uid, terms, usize::MAX, timeout_millis)
    }

    pub fn search_bounded(
        &self,
        uid: UserId,
        terms: &[String],
        max_results: usize,
        timeout_millis: i64,
    ) -> Vec<typeahead_core::Hit<E>> {
        self.search_bounded_with_stats(uid, terms, max_results, timeout_millis).0
    }

    /// Same as [`Self::search_bounded`], but also returns the [`HitStats`] counters accumulated
    /// during the query — the browse/filter/result triple the post-query log line reports.
    pub fn search_bounded_with_stats(
        &self,
        uid: UserId,
        terms: &[String],
        max_results: usize,
        timeout_millis: i64,
    ) -> (Vec<typeahead_core::Hit<E>>, HitStats) {
        if terms.is_empty() || max_results < 1 {
            return (Vec::new(), HitStats::default());
        }
        let mut collector = crate::collector::TopKCollector::new(Some(max_results));
        let stats = self.search_into_with_deadline(uid, terms, &mut collector, timeout_millis);
        (Box::new(collector).into_hits(), stats)
    }

    pub fn search_into(&self, uid: UserId, terms: &[String], collector: &mut dyn Collector<E>) {
        self.search_into_with_deadline(uid, terms, collector, i64::MAX);
    }

    pub fn search_into_with_deadline(
        &self,
        uid: UserId,
        terms: &[String],
        collector: &mut dyn Collector<E>,
        timeout_millis: i64,
    ) -> HitStats {
        if terms.is_empty() {
            return HitStats::default();
        }
        let mut stats = HitStats::default();
        let start = Instant::now();
        let deadline = Deadline::new(timeout_millis);
        let mut uniq_ids = HashSet::new();
        self.single_hop_inner(uid, terms, collector, &mut stats, &deadline, &mut uniq_ids);
        self.log_query(uid, terms, &mut stats, start);
        stats
    }

    pub fn search_network(
        &self,
        uid: UserId,
        terms: &[String],
        collector: &mut dyn Collector<E>,
        context: &NetworkTypeaheadContext,
    ) -> HitStats {
        if terms.is_empty() {
            return HitStats::default();
        }
        let mut stats = HitStats::default();
        let start = Instant::now();
        let deadline = Deadline::new(context.timeout_millis);

        if !context.has_connections() {
            let mut uniq_ids = HashSet::new();
            self.single_hop_inner(uid, terms, collector, &mut stats, &deadline, &mut uniq_ids);
            self.log_query(uid, terms, &mut stats, start);
            return stats;
        }

        let query_mask = self.bloom.query_filter(terms);
        let mut ctx = SelectorContext {
            terms: terms.to_vec(),
            score: 0.0,
        };
        let mut uniq_ids: HashSet<u32> = HashSet::new();
        uniq_ids.insert(context.source);

        let (conn_ids, weights) = &context.connection_strengths;

        // 1-hop pass over the already-decoded snapshot; no byte buffer needed.
        for (&neighbor, &w) in conn_ids.iter().zip(weights.iter()) {
            stats.num_browse_hits += 1;
            if self.visit_candidate(
                neighbor,
                query_mask,
                &mut ctx,
                collector,
                &mut stats,
                &mut uniq_ids,
                Proximity::Degree1,
                w + 1,
            ) {
                self.log_query(uid, terms, &mut stats, start);
                return stats;
            }
            if deadline.exceeded() {
                self.log_query(uid, terms, &mut stats, start);
                return stats;
            }
        }

        // 2-hop pass: one neighbor at a time, sharing a single pooled scratch buffer.
        let mut buf = self.buffer_pool.get_or_alloc();
        let canonical_size = buf.len();
        for (&neighbor, &w1) in conn_ids.iter().zip(weights.iter()) {
            if !self.connections_store.has_index(neighbor) {
                continue;
            }
            let count = match self.read_adjacency(neighbor, &mut buf) {
                Ok(count) => count,
                Err(error) => {
                    tracing::warn!(%error, neighbor, "adjacency decode failed, skipping neighbor");
                    continue;
                }
            };
            let iter = WeightIterator::from_record_count(std::mem::take(&mut buf), count);
            let (returned, stopped) = self.run_hop(
                iter,
                query_mask,
                &mut ctx,
                collector,
                &mut stats,
                &deadline,
                &mut uniq_ids,
                Proximity::Degree2,
                |edge_strength| self.weight_adjuster.adjust(w1, edge_strength) + 1,
            );
            buf = returned.into_buffer();
            if stopped {
                break;
            }
        }
        if buf.len() == canonical_size {
            self.buffer_pool.put(buf);
        }

        self.log_query(uid, terms, &mut stats, start);
        stats
    }

    // ---- internals ---------------------------------------------------------

    fn single_hop_inner(
        &self,
        uid: UserId,
        terms: &[String],
        collector: &mut dyn Collector<E>,
        stats: &mut HitStats,
        deadline: &Deadline,
        uniq_ids: &mut HashSet<u32>,
    ) {
        if !self.connections_store.has_index(uid) {
            return;
        }
        let mut buf = self.buffer_pool.get_or_alloc();
        let canonical_size = buf.len();
        let count = match self.read_adjacency(uid, &mut buf) {
            Ok(count) => count,
            Err(error) => {
                tracing::warn!(%error, uid, "adjacency decode failed");
                if buf.len() == canonical_size {
                    self.buffer_pool.put(buf);
                }
                return;
            }
        };
        let query_mask = self.bloom.query_filter(terms);
        let mut ctx = SelectorContext {
            terms: terms.to_vec(),
            score: 0.0,
        };
        let iter = WeightIterator::from_record_count(buf, count);
        let (returned, _stopped) = self.run_hop(
            iter,
            query_mask,
            &mut ctx,
            collector,
            stats,
            deadline,
            uniq_ids,
            Proximity::Degree1,
            |w| w + 1,
        );
        let buf = returned.into_buffer();
        if buf.len() == canonical_size {
            self.buffer_pool.put(buf);
        }
    }

    /// Fetches `id`'s adjacency bytes into `buf`, honoring `config.partial_read_enabled()`: when
    /// set, prefers the non-allocating `ConnectionsStore::read_bytes` (best-effort, never grows
    /// `buf`) over the full, possibly-allocating `get_bytes`.
    fn read_adjacency(
        &self,
        id: UserId,
        buf: &mut Vec<u8>,
    ) -> Result<usize, typeahead_core::StoreError> {
        if self.config.partial_read_enabled() {
            Ok(self.connections_store.read_bytes(id, buf))
        } else {
            self.connections_store.get_bytes(id, buf)
        }
    }

    /// Walks every pair in `iter`, applying the filter-store / element-store / selector gauntlet
    /// and feeding matches to `collector`. Returns the (possibly reallocated) iterator's buffer
    /// and whether the walk stopped early (collector full or deadline exceeded).
    #[allow(clippy::too_many_arguments)]
    fn run_hop<F>(
        &self,
        mut iter: WeightIterator,
        query_mask: u32,
        ctx: &mut SelectorContext,
        collector: &mut dyn Collector<E>,
        stats: &mut HitStats,
        deadline: &Deadline,
        uniq_ids: &mut HashSet<u32>,
        proximity: Proximity,
        strength_of_edge: F,
    ) -> (WeightIterator, bool)
    where
        F: Fn(Strength) -> Strength,
    {
        let interval = self.config.deadline_check_interval();
        let mut stopped = false;
        let mut browsed_since_check: u64 = 0;
        loop {
            let Some((elem_id, edge_weight)) = iter.next() else {
                break;
            };
            stats.num_browse_hits += 1;
            browsed_since_check += 1;

            if self.visit_candidate(
                elem_id,
                query_mask,
                ctx,
                collector,
                stats,
                uniq_ids,
                proximity,
                strength_of_edge(edge_weight),
            ) {
                stopped = true;
                break;
            }

            if browsed_since_check >= interval {
                browsed_since_check = 0;
                if deadline.exceeded() {
                    stopped = true;
                    break;
                }
            }
        }
        (iter, stopped)
    }

    /// Applies the filter-store / element-store / selector gauntlet to a single candidate and,
    /// on a match, adds it to the collector. Returns `true` if the collector is now satisfied
    /// and the caller should stop walking.
    #[allow(clippy::too_many_arguments)]
    fn visit_candidate(
        &self,
        candidate: u32,
        query_mask: u32,
        ctx: &mut SelectorContext,
        collector: &mut dyn Collector<E>,
        stats: &mut HitStats,
        uniq_ids: &mut HashSet<u32>,
        proximity: Proximity,
        propagated_strength: Strength,
    ) -> bool {
        if uniq_ids.contains(&candidate) {
            return false;
        }
        if !self.element_store.has_index(candidate) {
            return false;
        }
        if (self.filter_store.get(candidate) & query_mask) != query_mask {
            return false;
        }
        stats.num_filter_hits += 1;
        let Some(element) = self.element_store.get_element(candidate) else {
            return false;
        };
        ctx.score = 0.0;
        if !self.selector.select(&element, ctx) {
            return false;
        }
        stats.num_result_hits += 1;
        uniq_ids.insert(candidate);
        let score = ctx.score * propagated_strength as f64;
        collector.add(element, score, &self.name, proximity);
        collector.can_stop()
    }

    fn log_query(&self, uid: UserId, terms: &[String], stats: &mut HitStats, start: Instant) {
        let elapsed_ms = start.elapsed().as_millis();
        stats.total_time_millis = u64::try_from(elapsed_ms).unwrap_or(u64::MAX);
        if !self.config.logging_enabled() {
            return;
        }
        tracing::info!(
            target: "typeahead_query",
            "{} user={} time={} hits={}|{}|{} terms={{{}}}",
            self.name,
            uid,
            elapsed_ms,
            stats.num_browse_hits,
            stats.num_filter_hits,
            stats.num_result_hits,
            terms.join(",")
        );
    }
}
