#![forbid(unsafe_code)]

//! Host-agnostic windowed row model.
//!
//! `windrow-core` presents random-access, scrollable viewing over a data
//! source that can only be traversed forward, once, one row at a time. To
//! its consumer it looks like an array — "give me row *i*" works for any
//! previously-seen or future *i* — while memory stays bounded by a
//! fixed-capacity ring window and backward seeks are served by replaying
//! the source from the start.
//!
//! # Primary responsibilities
//!
//! - **Window cache**: ring buffer of the most recently scanned rows with
//!   chunked forward pulls and replay-on-backward-seek.
//! - **Interest**: a per-row "hilited" bit frozen at scan time, re-synced
//!   on demand against an externally mutable oracle.
//! - **Filtering**: show all rows, only interesting rows, or only the rest;
//!   the filter decides what "row count" means.
//! - **Background counting**: a low-priority thread discovers the true
//!   source size without blocking the consumer.
//! - **Search traversal**: wrap-detecting iteration over the virtual
//!   row/column grid for "search again from here, stop after a full loop".
//! - **Change notifications**: coalesced inserted/updated/deleted index
//!   ranges, never row content.
//!
//! # Design principles
//!
//! - **No I/O**: sources and oracles are in-process traits the host
//!   supplies; presentation is someone else's job.
//! - **One consumer thread**: all cache mutation happens on one logical
//!   thread; the background counter communicates only through a
//!   generation-tagged hand-off.
//! - **`#![forbid(unsafe_code)]`**: safety enforced at compile time.

pub mod cache;
pub mod counter;
pub mod error;
pub mod filter;
pub mod interest;
pub mod notify;
pub mod row;
pub mod search;
pub mod source;

pub use cache::RowWindowCache;
pub use counter::{BackgroundCounter, CountHandoff, CountReport};
pub use error::{CacheError, SourceError};
pub use filter::FilterPolicy;
pub use interest::{InterestOracle, SharedInterestSet};
pub use notify::RowsChange;
pub use row::{CellValue, Row, RowKey};
pub use search::SearchCursor;
pub use source::{RowCursor, RowSource, SourcePass, VecSource};
