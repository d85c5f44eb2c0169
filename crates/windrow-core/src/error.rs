//! Error types for sources and the window cache.

/// Errors produced by a row source or its cursors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not produce a cursor.
    Unavailable(String),
    /// A row read failed mid-pass.
    Read(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "source unavailable: {msg}"),
            Self::Read(msg) => write!(f, "row read failed: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Errors surfaced by [`RowWindowCache`](crate::cache::RowWindowCache)
/// operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The requested index is invalid given current knowledge. Recoverable:
    /// re-read the row count and retry.
    IndexOutOfRange {
        /// The requested row index.
        index: usize,
        /// The row count known at the time of the request.
        count: usize,
    },
    /// The source ended with fewer rows than previously reported. The cache
    /// has been forced final at the last good count.
    SourceExhaustedUnexpectedly {
        /// The count reported before the pass.
        reported: usize,
        /// The number of rows the pass actually produced.
        actual: usize,
    },
    /// The underlying source failed while pulling rows. Previously cached
    /// rows are preserved; the pull was aborted.
    Source(SourceError),
    /// A mutating operation was attempted while change notifications were
    /// being dispatched.
    ReentrancyDetected,
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfRange { index, count } => {
                write!(f, "row index {index} out of range (count {count})")
            }
            Self::SourceExhaustedUnexpectedly { reported, actual } => {
                write!(
                    f,
                    "source ended at {actual} rows but {reported} were reported"
                )
            }
            Self::Source(err) => write!(f, "{err}"),
            Self::ReentrancyDetected => {
                write!(f, "cache mutation attempted during change dispatch")
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SourceError> for CacheError {
    fn from(err: SourceError) -> Self {
        Self::Source(err)
    }
}
