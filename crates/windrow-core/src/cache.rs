//! The window cache: array-like random access over a forward-only source.
//!
//! [`RowWindowCache`] holds the most recently scanned rows in a
//! fixed-capacity ring. Requests inside the window are served directly;
//! requests ahead of the window advance the source cursor in chunks;
//! requests behind the window discard the cursor and replay the source from
//! row zero. Memory use is bounded by the capacity regardless of source
//! size.
//!
//! # Index arithmetic
//!
//! The row with pass-relative sequence number `s` lives in slot
//! `s % capacity`. At any moment the servable range is
//! `rows_seen - capacity .. rows_seen`; anything older requires a replay.
//!
//! # Counting
//!
//! `row_count()` is a lower bound until the source has been exhausted once
//! under the current filter, at which point `is_count_final()` flips. A
//! [`BackgroundCounter`] can discover the true size early; its snapshots are
//! folded in through [`poll_background_count`](RowWindowCache::poll_background_count).

use std::collections::HashSet;
use std::ops::Range;
use std::time::Duration;

use crate::counter::{BackgroundCounter, CountHandoff};
use crate::error::CacheError;
use crate::filter::FilterPolicy;
use crate::interest::InterestOracle;
use crate::notify::{ChangeQueue, RowsChange};
use crate::row::{Row, RowKey};
use crate::search::SearchCursor;
use crate::source::{RowCursor, RowSource, SourcePass};

/// One ring position: a cached row plus its frozen interest bit.
#[derive(Debug, Clone, Default)]
struct Slot {
    row: Option<Row>,
    interest: bool,
}

/// Windowed row cache over a restartable forward-only source.
///
/// All mutation happens on one logical consumer thread; the only concurrent
/// collaborator is the background counter, which communicates exclusively
/// through the generation-tagged hand-off drained by
/// [`poll_background_count`](Self::poll_background_count).
pub struct RowWindowCache<S: RowSource, O: InterestOracle> {
    source: Option<S>,
    pass: Option<SourcePass<S::Cursor>>,
    slots: Vec<Slot>,
    capacity: usize,
    chunk_size: usize,
    /// Visible (filter-matching) rows stored by the current pass.
    rows_seen_in_pass: usize,
    /// High-water mark of raw rows examined since the source was attached.
    raw_frontier: usize,
    /// Whether the end of the source has been observed since attach.
    raw_exhausted: bool,
    visible_total: usize,
    count_final: bool,
    filter: FilterPolicy,
    oracle: O,
    changes: ChangeQueue,
    handoff: CountHandoff,
    counter: Option<BackgroundCounter>,
    epoch: u64,
    report_interval: Duration,
    count_unavailable_reported: bool,
}

impl<S: RowSource, O: InterestOracle> std::fmt::Debug for RowWindowCache<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowWindowCache")
            .field("capacity", &self.capacity)
            .field("chunk_size", &self.chunk_size)
            .field("rows_seen_in_pass", &self.rows_seen_in_pass)
            .field("visible_total", &self.visible_total)
            .field("count_final", &self.count_final)
            .field("filter", &self.filter)
            .finish()
    }
}

impl<S: RowSource, O: InterestOracle> RowWindowCache<S, O> {
    /// Default ring capacity.
    pub const DEFAULT_CAPACITY: usize = 512;
    /// Default chunk size for amortized pulls.
    pub const DEFAULT_CHUNK_SIZE: usize = 64;

    /// Create a detached cache observing `oracle`.
    #[must_use]
    pub fn new(oracle: O) -> Self {
        Self {
            source: None,
            pass: None,
            slots: vec![Slot::default(); Self::DEFAULT_CAPACITY],
            capacity: Self::DEFAULT_CAPACITY,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            rows_seen_in_pass: 0,
            raw_frontier: 0,
            raw_exhausted: false,
            visible_total: 0,
            count_final: false,
            filter: FilterPolicy::ShowAll,
            oracle,
            changes: ChangeQueue::default(),
            handoff: CountHandoff::new(),
            counter: None,
            epoch: 0,
            report_interval: BackgroundCounter::DEFAULT_REPORT_INTERVAL,
            count_unavailable_reported: false,
        }
    }

    /// Set the ring capacity (minimum 1). The chunk size is re-clamped.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        self.capacity = capacity;
        self.slots = vec![Slot::default(); capacity];
        self.chunk_size = clamp_chunk(capacity, self.chunk_size);
        self
    }

    /// Set the chunk size, clamped to `[1, ceil(capacity / 2)]`.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk: usize) -> Self {
        self.chunk_size = clamp_chunk(self.capacity, chunk);
        self
    }

    /// Set how often a background counter publishes progress.
    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    // -- accessors --

    /// The reported row count. A valid lower bound while
    /// [`is_count_final`](Self::is_count_final) is `false`.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.visible_total
    }

    /// Whether the reported count is exact.
    #[must_use]
    pub fn is_count_final(&self) -> bool {
        self.count_final
    }

    /// The active filter policy.
    #[must_use]
    pub fn filter_policy(&self) -> FilterPolicy {
        self.filter
    }

    /// Ring capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether a source is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    /// Columns per row of the attached source (0 when detached).
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.source.as_ref().map_or(0, RowSource::column_count)
    }

    /// The range of row indices currently servable without a replay.
    #[must_use]
    pub fn window_range(&self) -> Range<usize> {
        self.rows_seen_in_pass.saturating_sub(self.capacity)..self.rows_seen_in_pass
    }

    /// A grid-mode search cursor sized to this cache's source.
    #[must_use]
    pub fn search_cursor(&self) -> SearchCursor {
        SearchCursor::grid(self.column_count())
    }

    // -- change notifications --

    /// Whether change notifications are pending.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.changes.has_changes()
    }

    /// Drain all pending change notifications.
    pub fn take_changes(&mut self) -> Vec<RowsChange> {
        self.changes.take_all()
    }

    /// Drain pending changes through a callback.
    ///
    /// While the callback runs, the cache rejects mutation (see
    /// [`CacheError::ReentrancyDetected`]).
    pub fn dispatch_changes(&mut self, mut f: impl FnMut(RowsChange)) {
        self.changes.begin_dispatch();
        while let Some(change) = self.changes.pop() {
            f(change);
        }
        self.changes.end_dispatch();
    }

    fn guard_mutation(&self) -> Result<(), CacheError> {
        if self.changes.is_dispatching() {
            debug_assert!(false, "cache mutation attempted during change dispatch");
            #[cfg(feature = "tracing")]
            tracing::error!("cache mutation attempted during change dispatch; ignored");
            return Err(CacheError::ReentrancyDetected);
        }
        Ok(())
    }

    // -- lifecycle --

    /// Attach a source, replacing any current one.
    ///
    /// Cancels the background counter, resets all state, and eagerly pulls
    /// the first chunk so "is there any data" queries are immediate.
    pub fn attach(&mut self, source: S) -> Result<(), CacheError> {
        self.guard_mutation()?;
        self.cancel_background_count();
        self.full_reset();
        self.source = Some(source);
        self.changes.push(RowsChange::StructureReset);
        #[cfg(feature = "tracing")]
        tracing::debug!(capacity = self.capacity, chunk = self.chunk_size, "source attached");
        self.fill_to(0)
    }

    /// Detach the current source, leaving the cache empty.
    pub fn detach(&mut self) {
        if self.guard_mutation().is_err() {
            return;
        }
        self.cancel_background_count();
        self.full_reset();
        self.source = None;
        self.changes.push(RowsChange::StructureReset);
        #[cfg(feature = "tracing")]
        tracing::debug!("source detached");
    }

    /// Attach or detach depending on `source`.
    pub fn set_source(&mut self, source: Option<S>) -> Result<(), CacheError> {
        match source {
            Some(source) => self.attach(source),
            None => {
                self.detach();
                Ok(())
            }
        }
    }

    /// Change the ring capacity. Clears the window and rebuilds from a fresh
    /// pass; count knowledge is retained.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), CacheError> {
        self.guard_mutation()?;
        let capacity = capacity.max(1);
        if capacity == self.capacity {
            return Ok(());
        }
        self.capacity = capacity;
        self.chunk_size = clamp_chunk(capacity, self.chunk_size);
        self.slots = vec![Slot::default(); capacity];
        self.reset_pass();
        self.changes.push(RowsChange::StructureReset);
        if self.source.is_some() {
            self.fill_to(0)?;
        }
        Ok(())
    }

    /// Change the chunk size, clamped to `[1, ceil(capacity / 2)]`.
    pub fn set_chunk_size(&mut self, chunk: usize) {
        self.chunk_size = clamp_chunk(self.capacity, chunk);
    }

    // -- row access --

    /// Get the row at `index`, scanning forward or replaying the source as
    /// needed.
    ///
    /// Requesting the last known index while the count is not final pulls
    /// one more chunk, so a polling consumer observes progress even without
    /// a background counter.
    pub fn get_row(&mut self, index: usize) -> Result<&Row, CacheError> {
        self.guard_mutation()?;
        if self.count_final && index >= self.visible_total {
            return Err(CacheError::IndexOutOfRange {
                index,
                count: self.visible_total,
            });
        }
        self.materialize(index)?;
        match &self.slots[index % self.capacity].row {
            Some(row) => Ok(row),
            None => Err(CacheError::IndexOutOfRange {
                index,
                count: self.visible_total,
            }),
        }
    }

    /// Get the frozen interest bit for the row at `index`, caching the row
    /// as a side effect.
    pub fn get_interest(&mut self, index: usize) -> Result<bool, CacheError> {
        self.get_row(index)?;
        Ok(self.slots[index % self.capacity].interest)
    }

    /// Make `index` servable from the window, or fail.
    fn materialize(&mut self, index: usize) -> Result<(), CacheError> {
        let window_start = self.rows_seen_in_pass.saturating_sub(self.capacity);
        let in_window = index >= window_start && index < self.rows_seen_in_pass;
        let newest_nonfinal = !self.count_final
            && self.rows_seen_in_pass > 0
            && index == self.rows_seen_in_pass - 1;
        if in_window && !newest_nonfinal {
            return Ok(());
        }
        if index < window_start {
            #[cfg(feature = "tracing")]
            tracing::debug!(index, window_start, "backward seek; replaying source");
            self.reset_pass();
        }
        self.fill_to(index)?;
        if index >= self.rows_seen_in_pass {
            return Err(CacheError::IndexOutOfRange {
                index,
                count: self.visible_total,
            });
        }
        Ok(())
    }

    /// Pull rows until the pass covers `index` plus one chunk of lookahead,
    /// the source is exhausted, or a read fails.
    ///
    /// Rows cached before a failure stay cached; the failure never flips the
    /// count final.
    fn fill_to(&mut self, index: usize) -> Result<(), CacheError> {
        if self.source.is_none() {
            return Ok(());
        }
        let before_total = self.visible_total;
        self.ensure_pass()?;
        // Lookahead is bounded so the requested row cannot be evicted by its
        // own pull.
        let target_last = index.saturating_add(self.chunk_size.min(self.capacity - 1));
        let result = loop {
            if self.rows_seen_in_pass > target_last {
                break Ok(());
            }
            let pulled = self
                .pass
                .as_mut()
                .expect("pass opened above")
                .next_row();
            match pulled {
                Ok(Some(row)) => {
                    self.raw_frontier = self.raw_frontier.max(self.raw_seen_in_pass());
                    let interest = self.oracle.is_of_interest(row.key());
                    if !self.filter.matches(interest) {
                        continue;
                    }
                    let slot = self.rows_seen_in_pass % self.capacity;
                    self.slots[slot] = Slot {
                        row: Some(row),
                        interest,
                    };
                    self.rows_seen_in_pass += 1;
                    self.visible_total = self.visible_total.max(self.rows_seen_in_pass);
                }
                Ok(None) => break self.observe_exhaustion(),
                Err(err) => break Err(CacheError::Source(err)),
            }
        };
        if self.visible_total > before_total {
            self.changes.push(RowsChange::Inserted {
                first: before_total,
                last: self.visible_total - 1,
            });
        }
        result
    }

    /// The pass hit the end of the source.
    fn observe_exhaustion(&mut self) -> Result<(), CacheError> {
        self.raw_exhausted = true;
        self.raw_frontier = self.raw_seen_in_pass();
        if self.rows_seen_in_pass < self.visible_total {
            // Fewer rows than previously reported: the source shrank
            // underneath us. Clamp to the last good count and go final.
            let reported = self.visible_total;
            let actual = self.rows_seen_in_pass;
            #[cfg(feature = "tracing")]
            tracing::error!(reported, actual, "source exhausted below reported count");
            self.visible_total = actual;
            self.count_final = true;
            self.changes.push(RowsChange::Deleted {
                first: actual,
                last: reported - 1,
            });
            return Err(CacheError::SourceExhaustedUnexpectedly { reported, actual });
        }
        self.count_final = true;
        Ok(())
    }

    fn ensure_pass(&mut self) -> Result<(), CacheError> {
        if self.pass.is_none() {
            let source = self.source.as_ref().expect("checked by caller");
            self.pass = Some(SourcePass::new(source.open()?));
        }
        Ok(())
    }

    /// Raw rows pulled by the current pass.
    fn raw_seen_in_pass(&self) -> usize {
        self.pass.as_ref().map_or(0, SourcePass::produced)
    }

    /// Discard the cursor and clear the window. Count knowledge survives.
    fn reset_pass(&mut self) {
        self.pass = None;
        self.rows_seen_in_pass = 0;
        for slot in &mut self.slots {
            *slot = Slot::default();
        }
    }

    /// Zero everything tied to the attached source.
    fn full_reset(&mut self) {
        self.reset_pass();
        self.visible_total = 0;
        self.count_final = false;
        self.raw_frontier = 0;
        self.raw_exhausted = false;
    }

    // -- filtering --

    /// Switch the filter policy. No-op when unchanged.
    ///
    /// Switching *to* [`FilterPolicy::ShowAll`] restores the count eagerly
    /// from raw-pass bookkeeping; switching to a filtering policy drops the
    /// count to zero, marks it non-final, and rescans from the start.
    pub fn set_filter_policy(&mut self, policy: FilterPolicy) -> Result<(), CacheError> {
        self.guard_mutation()?;
        if policy == self.filter {
            return Ok(());
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(from = %self.filter, to = %policy, "filter policy changed");
        self.filter = policy;
        self.reset_pass();
        if policy.is_filtering() {
            self.visible_total = 0;
            self.count_final = false;
        } else {
            // Every raw row examined so far is visible again.
            self.visible_total = self.raw_frontier;
            self.count_final = self.raw_exhausted;
        }
        self.changes.push(RowsChange::StructureReset);
        if self.source.is_some() {
            self.fill_to(0)?;
        }
        Ok(())
    }

    /// Re-sync frozen interest bits after the oracle changed for
    /// `changed_keys`, now answering `new_value`.
    ///
    /// Under [`FilterPolicy::ShowAll`] only the cached window is touched and
    /// a single coalesced `Updated` is emitted. Under a filtering policy the
    /// visible set itself changed, so the examined prefix of the source is
    /// recounted and the window rebuilt.
    pub fn notify_interest_changed(
        &mut self,
        changed_keys: &[RowKey],
        new_value: bool,
    ) -> Result<(), CacheError> {
        self.guard_mutation()?;
        if changed_keys.is_empty() || self.source.is_none() {
            return Ok(());
        }
        if !self.filter.is_filtering() {
            let changed: HashSet<RowKey> = changed_keys.iter().copied().collect();
            self.resync_window_bits(|key, _| changed.contains(&key).then_some(new_value));
            return Ok(());
        }
        self.refilter()
    }

    /// Optimized re-sync for "every hilite was cleared at once".
    ///
    /// The oracle must already answer `false` for all keys when this is
    /// called.
    pub fn notify_interest_cleared_all(&mut self) -> Result<(), CacheError> {
        self.guard_mutation()?;
        if self.source.is_none() {
            return Ok(());
        }
        match self.filter {
            FilterPolicy::ShowAll => {
                self.resync_window_bits(|_, interest| interest.then_some(false));
                Ok(())
            }
            FilterPolicy::InterestOnly => {
                // Nothing can match an empty interest set: zero is exact.
                let old_total = self.visible_total;
                self.reset_pass();
                self.visible_total = 0;
                self.count_final = true;
                if old_total > 0 {
                    self.changes.push(RowsChange::Deleted {
                        first: 0,
                        last: old_total - 1,
                    });
                }
                Ok(())
            }
            FilterPolicy::OtherOnly => {
                // Every raw row examined so far now qualifies.
                let old_total = self.visible_total;
                self.reset_pass();
                self.visible_total = self.raw_frontier;
                self.count_final = self.raw_exhausted;
                self.push_count_delta(old_total, self.visible_total);
                self.fill_to(0)
            }
        }
    }

    /// Flip cached interest bits where `update` returns a new value; emit
    /// one coalesced `Updated` spanning the affected rows.
    fn resync_window_bits(&mut self, update: impl Fn(RowKey, bool) -> Option<bool>) {
        let mut affected: Option<(usize, usize)> = None;
        for seq in self.window_range() {
            let slot = &mut self.slots[seq % self.capacity];
            let Some(row) = &slot.row else { continue };
            if let Some(value) = update(row.key(), slot.interest)
                && slot.interest != value
            {
                slot.interest = value;
                affected = Some(match affected {
                    Some((lo, hi)) => (lo.min(seq), hi.max(seq)),
                    None => (seq, seq),
                });
            }
        }
        if let Some((first, last)) = affected {
            self.changes.push(RowsChange::Updated { first, last });
        }
    }

    /// Recount the examined raw prefix against the oracle's current state,
    /// adjust the total by the net delta, and rebuild the window.
    fn refilter(&mut self) -> Result<(), CacheError> {
        let source = self.source.as_ref().expect("checked by caller");
        let mut cursor = source.open()?;
        let limit = self.raw_frontier;
        let mut raw = 0usize;
        let mut matched = 0usize;
        let mut hit_end = false;
        while raw < limit {
            match cursor.next_row()? {
                Some(row) => {
                    raw += 1;
                    if self.filter.matches(self.oracle.is_of_interest(row.key())) {
                        matched += 1;
                    }
                }
                None => {
                    hit_end = true;
                    break;
                }
            }
        }
        if hit_end {
            // The source shrank since the frontier was recorded.
            self.raw_frontier = raw;
            self.raw_exhausted = true;
        }
        let old_total = self.visible_total;
        self.reset_pass();
        self.visible_total = matched;
        self.count_final = self.raw_exhausted;
        #[cfg(feature = "tracing")]
        tracing::debug!(old_total, new_total = matched, scanned = raw, "refiltered prefix");
        self.push_count_delta(old_total, matched);
        self.fill_to(0)
    }

    /// Emit the insertion/deletion/update implied by a total moving from
    /// `old` to `new`.
    fn push_count_delta(&mut self, old: usize, new: usize) {
        if new > old {
            self.changes.push(RowsChange::Inserted {
                first: old,
                last: new - 1,
            });
        } else if new < old {
            self.changes.push(RowsChange::Deleted {
                first: new,
                last: old - 1,
            });
        } else if new > 0 {
            // Same count, different membership: contents replaced in place.
            self.changes.push(RowsChange::Updated {
                first: 0,
                last: new - 1,
            });
        }
    }
}

impl<S, O> RowWindowCache<S, O>
where
    S: RowSource + Clone + Send + 'static,
    O: InterestOracle,
{
    /// Start a background count over a private copy of the source.
    ///
    /// No-op when already running, when the count is final, or when
    /// detached. The counter only ever counts *all* rows, so its snapshots
    /// are ignored while a filtering policy is active (see
    /// [`poll_background_count`](Self::poll_background_count)).
    pub fn start_background_count(&mut self) -> Result<(), CacheError> {
        self.guard_mutation()?;
        if self.count_final {
            return Ok(());
        }
        if self.counter.as_ref().is_some_and(BackgroundCounter::is_running) {
            return Ok(());
        }
        let Some(source) = self.source.as_ref() else {
            return Ok(());
        };
        self.count_unavailable_reported = false;
        match BackgroundCounter::spawn(
            source.clone(),
            self.handoff.clone(),
            self.epoch,
            self.report_interval,
        ) {
            Ok(counter) => {
                self.counter = Some(counter);
                Ok(())
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "background counter failed to start");
                self.changes.push(RowsChange::CountUnavailable);
                self.count_unavailable_reported = true;
                Ok(())
            }
        }
    }
}

impl<S: RowSource, O: InterestOracle> RowWindowCache<S, O> {
    /// Cancel any running background count. Idempotent. In-flight snapshots
    /// are invalidated by bumping the epoch.
    pub fn cancel_background_count(&mut self) {
        if let Some(counter) = self.counter.take() {
            counter.cancel();
        }
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Fold a pending counter snapshot into the count, if one is waiting.
    ///
    /// Returns `Ok(true)` when the visible count or finality changed.
    /// Snapshots are applied only when their generation matches the current
    /// epoch, the policy is [`FilterPolicy::ShowAll`], and they do not move
    /// the count backward.
    pub fn poll_background_count(&mut self) -> Result<bool, CacheError> {
        self.guard_mutation()?;
        let Some(report) = self.handoff.take_if(self.epoch) else {
            return Ok(false);
        };
        if report.failed {
            self.counter = None;
            if self.count_unavailable_reported {
                return Ok(false);
            }
            self.count_unavailable_reported = true;
            self.changes.push(RowsChange::CountUnavailable);
            return Ok(true);
        }
        if self.filter.is_filtering() {
            // The counter counts all rows; under a filter its result does
            // not describe the visible set.
            #[cfg(feature = "tracing")]
            tracing::warn!(rows = report.rows, "counter snapshot refused under active filter");
            return Ok(false);
        }
        let mut applied = false;
        if report.rows > self.visible_total {
            self.changes.push(RowsChange::Inserted {
                first: self.visible_total,
                last: report.rows - 1,
            });
            self.visible_total = report.rows;
            applied = true;
        }
        if report.is_final && report.rows >= self.visible_total {
            self.raw_exhausted = true;
            self.raw_frontier = self.raw_frontier.max(report.rows);
            if !self.count_final {
                self.count_final = true;
                applied = true;
            }
            self.counter = None;
        }
        Ok(applied)
    }
}

/// Clamp a chunk size to `[1, ceil(capacity / 2)]`.
fn clamp_chunk(capacity: usize, chunk: usize) -> usize {
    chunk.clamp(1, capacity.div_ceil(2).max(1))
}
