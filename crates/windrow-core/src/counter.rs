//! Background row counting over a private cursor.
//!
//! The counter discovers the true size of a source without blocking the
//! consumer thread. It owns its own cursor (never the cache's), yields after
//! every row to stay out of the consumer's way, and publishes `(count,
//! is_final)` snapshots through a mutex-guarded hand-off cell. Snapshots are
//! tagged with a generation so that a snapshot published by a counter
//! belonging to a detached source or a cancelled run is dropped on arrival.
//!
//! # Hand-off protocol
//!
//! - Single writer (the counter thread), single reader (the cache's
//!   [`poll_background_count`](crate::cache::RowWindowCache::poll_background_count)).
//! - The writer never overwrites a report from a newer generation.
//! - The reader takes a report only if its generation matches the cache's
//!   current epoch; anything else is discarded.
//! - Cancellation is observed within one row-read: the flag is checked every
//!   loop iteration, not only at the reporting interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::SourceError;
use crate::source::{RowCursor, RowSource};

/// One published count snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountReport {
    /// Raw rows counted so far.
    pub rows: usize,
    /// Whether the source was exhausted (the count is exact).
    pub is_final: bool,
    /// Whether the counter failed to open or read its cursor.
    pub failed: bool,
    /// Generation tag of the counter run that produced this report.
    pub generation: u64,
}

/// Shared hand-off cell between one counter thread and the cache.
#[derive(Debug, Clone, Default)]
pub struct CountHandoff {
    cell: Arc<Mutex<Option<CountReport>>>,
}

impl CountHandoff {
    /// Create an empty hand-off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a report. A pending report from a newer generation wins over
    /// this one; otherwise the pending report is replaced (only the latest
    /// count matters).
    pub fn publish(&self, report: CountReport) {
        let mut slot = self.cell.lock().unwrap();
        match *slot {
            Some(pending) if pending.generation > report.generation => {}
            _ => *slot = Some(report),
        }
    }

    /// Take the pending report if it belongs to `generation`. Reports from
    /// other generations are discarded.
    pub fn take_if(&self, generation: u64) -> Option<CountReport> {
        let mut slot = self.cell.lock().unwrap();
        match *slot {
            Some(report) if report.generation == generation => slot.take(),
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }
}

/// Handle to a running counter thread.
///
/// Dropping the handle cancels the run; the thread itself is detached and
/// exits at its next row-read.
#[derive(Debug)]
pub struct BackgroundCounter {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl BackgroundCounter {
    /// How often a running counter publishes progress.
    pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

    /// Spawn a counter over its own cursor on `source`.
    ///
    /// Fails only if the OS refuses the thread; a source that cannot open
    /// its cursor is reported through the hand-off instead, from inside the
    /// thread.
    pub fn spawn<S>(
        source: S,
        handoff: CountHandoff,
        generation: u64,
        report_interval: Duration,
    ) -> Result<Self, SourceError>
    where
        S: RowSource + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name("windrow-counter".into())
            .spawn(move || run_counter(&source, &handoff, generation, report_interval, &flag))
            .map_err(|e| SourceError::Unavailable(format!("counter thread: {e}")))?;
        Ok(Self {
            cancel,
            handle: Some(handle),
            generation,
        })
    }

    /// Signal the thread to stop at its next row-read. Idempotent.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Whether the thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Generation tag this run publishes under.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the thread to exit. Used by tests and orderly shutdown.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BackgroundCounter {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_counter<S: RowSource>(
    source: &S,
    handoff: &CountHandoff,
    generation: u64,
    report_interval: Duration,
    cancel: &AtomicBool,
) {
    let mut cursor = match source.open() {
        Ok(cursor) => cursor,
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_err, "background counter could not open its cursor");
            handoff.publish(CountReport {
                rows: 0,
                is_final: false,
                failed: true,
                generation,
            });
            return;
        }
    };

    let mut rows = 0usize;
    let mut last_report = Instant::now();
    loop {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        match cursor.next_row() {
            Ok(Some(_)) => {
                rows += 1;
                if last_report.elapsed() >= report_interval {
                    handoff.publish(CountReport {
                        rows,
                        is_final: false,
                        failed: false,
                        generation,
                    });
                    last_report = Instant::now();
                }
                // Stay low-priority: give the consumer thread the core.
                thread::yield_now();
            }
            Ok(None) => {
                handoff.publish(CountReport {
                    rows,
                    is_final: true,
                    failed: false,
                    generation,
                });
                return;
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, rows, "background counter read failed");
                handoff.publish(CountReport {
                    rows,
                    is_final: false,
                    failed: true,
                    generation,
                });
                return;
            }
        }
    }
}
