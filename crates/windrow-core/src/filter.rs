//! Filtering modes: which rows count toward the visible total.

/// Selects which rows the cache counts and caches.
///
/// Changing the policy changes what "row count" means: under a filtering
/// policy the reported total counts only matching rows, and visible indices
/// address the matching subsequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPolicy {
    /// Every row is visible.
    #[default]
    ShowAll,
    /// Only rows whose key is in the interest set at scan time.
    InterestOnly,
    /// Only rows whose key is *not* in the interest set at scan time.
    OtherOnly,
}

impl FilterPolicy {
    /// The scan predicate: does a row with this interest bit pass the
    /// filter?
    #[must_use]
    pub const fn matches(self, interest: bool) -> bool {
        match self {
            Self::ShowAll => true,
            Self::InterestOnly => interest,
            Self::OtherOnly => !interest,
        }
    }

    /// Whether this policy can reject rows.
    #[must_use]
    pub const fn is_filtering(self) -> bool {
        !matches!(self, Self::ShowAll)
    }
}

impl std::fmt::Display for FilterPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShowAll => write!(f, "show-all"),
            Self::InterestOnly => write!(f, "interest-only"),
            Self::OtherOnly => write!(f, "other-only"),
        }
    }
}
