//! Forward-only, restartable row sources.
//!
//! A [`RowSource`] is traversed through cursors that move forward one row at
//! a time and cannot seek. Restartability is the source's job: every call to
//! [`RowSource::open`] yields a fresh cursor positioned before the first
//! row. The window cache leans on this to replay the source when a consumer
//! seeks behind the current window.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::SourceError;
use crate::row::Row;

/// A sequential data source that can be reopened from the start.
pub trait RowSource {
    /// The cursor type produced by [`open`](Self::open).
    type Cursor: RowCursor;

    /// Open a fresh cursor positioned before the first row.
    fn open(&self) -> Result<Self::Cursor, SourceError>;

    /// Number of columns in every row this source produces.
    fn column_count(&self) -> usize;
}

/// A forward-only cursor over a source.
pub trait RowCursor {
    /// Produce the next row, or `Ok(None)` at the end of the source.
    fn next_row(&mut self) -> Result<Option<Row>, SourceError>;
}

/// One pass over a source: a cursor plus the count of raw rows it has
/// produced so far.
///
/// Dropping the pass and constructing a new one from a fresh cursor is how
/// the cache restarts from row zero.
#[derive(Debug)]
pub struct SourcePass<C> {
    cursor: C,
    produced: usize,
}

impl<C: RowCursor> SourcePass<C> {
    /// Wrap a freshly opened cursor.
    #[must_use]
    pub fn new(cursor: C) -> Self {
        Self {
            cursor,
            produced: 0,
        }
    }

    /// Pull the next raw row, counting it.
    pub fn next_row(&mut self) -> Result<Option<Row>, SourceError> {
        let row = self.cursor.next_row()?;
        if row.is_some() {
            self.produced += 1;
        }
        Ok(row)
    }

    /// Raw rows produced by this pass so far.
    #[must_use]
    pub fn produced(&self) -> usize {
        self.produced
    }
}

/// In-memory [`RowSource`] over a vector of rows.
///
/// Clones share the backing rows and instrumentation counters, so a clone
/// handed to a background counter observes the same data. The knobs
/// ([`truncate_to`](Self::truncate_to), [`set_fail_open`](Self::set_fail_open),
/// [`fail_from`](Self::fail_from)) exist for hosts and tests that need to
/// exercise shrinking or failing sources.
#[derive(Debug, Clone)]
pub struct VecSource {
    rows: Arc<Vec<Row>>,
    columns: usize,
    reads: Arc<AtomicUsize>,
    limit: Arc<AtomicUsize>,
    fail_open: Arc<AtomicBool>,
    fail_from: Arc<AtomicUsize>,
}

impl VecSource {
    /// Create a source over `rows`. The column count is taken from the first
    /// row (zero for an empty source).
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        let columns = rows.first().map_or(0, Row::column_count);
        let limit = rows.len();
        Self {
            rows: Arc::new(rows),
            columns,
            reads: Arc::new(AtomicUsize::new(0)),
            limit: Arc::new(AtomicUsize::new(limit)),
            fail_open: Arc::new(AtomicBool::new(false)),
            fail_from: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    /// Total raw rows read through all cursors of this source.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Reset the read counter.
    pub fn reset_reads(&self) {
        self.reads.store(0, Ordering::Relaxed);
    }

    /// Number of rows cursors will currently produce.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len().min(self.limit.load(Ordering::Relaxed))
    }

    /// Whether cursors currently produce no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shrink the source so cursors end after `len` rows. Existing cursors
    /// observe the new end on their next read.
    pub fn truncate_to(&self, len: usize) {
        self.limit.store(len, Ordering::Relaxed);
    }

    /// Make [`open`](RowSource::open) fail while set.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::Relaxed);
    }

    /// Make reads at positions `>= position` fail.
    pub fn fail_from(&self, position: usize) {
        self.fail_from.store(position, Ordering::Relaxed);
    }
}

impl RowSource for VecSource {
    type Cursor = VecCursor;

    fn open(&self) -> Result<Self::Cursor, SourceError> {
        if self.fail_open.load(Ordering::Relaxed) {
            return Err(SourceError::Unavailable("open disabled".into()));
        }
        Ok(VecCursor {
            source: self.clone(),
            position: 0,
        })
    }

    fn column_count(&self) -> usize {
        self.columns
    }
}

/// Cursor over a [`VecSource`].
#[derive(Debug)]
pub struct VecCursor {
    source: VecSource,
    position: usize,
}

impl RowCursor for VecCursor {
    fn next_row(&mut self) -> Result<Option<Row>, SourceError> {
        if self.position >= self.source.fail_from.load(Ordering::Relaxed) {
            return Err(SourceError::Read(format!(
                "read failure injected at row {}",
                self.position
            )));
        }
        if self.position >= self.source.len() {
            return Ok(None);
        }
        let row = self.source.rows[self.position].clone();
        self.position += 1;
        self.source.reads.fetch_add(1, Ordering::Relaxed);
        Ok(Some(row))
    }
}
