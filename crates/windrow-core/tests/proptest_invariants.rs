//! Property-based invariant tests for windrow-core.
//!
//! These tests verify structural invariants that must hold for **any**
//! input:
//!
//! 1. Chunk size is always clamped to `[1, ceil(capacity / 2)]`.
//! 2. A monotone forward pass never reads a source row twice.
//! 3. Random access agrees with the source, for any seek sequence.
//! 4. Interest-only and other-only counts partition the total.
//! 5. A search cursor wraps exactly once per full pass over any grid.

use proptest::prelude::*;

use windrow_core::{
    CellValue, FilterPolicy, Row, RowKey, RowWindowCache, SearchCursor, SharedInterestSet,
    VecSource,
};

// ── Helpers ─────────────────────────────────────────────────────────────

fn make_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            Row::new(
                RowKey::from_raw(i as u64),
                vec![CellValue::Int(i as i64), CellValue::from(format!("r{i}"))],
            )
        })
        .collect()
}

/// Small cache geometries: enough to cover degenerate rings and windows
/// larger than the source.
fn geometry() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=32, 0usize..=64)
}

fn attach_cache(
    rows: usize,
    capacity: usize,
    chunk: usize,
    set: &SharedInterestSet,
) -> RowWindowCache<VecSource, SharedInterestSet> {
    let mut cache = RowWindowCache::new(set.clone())
        .with_capacity(capacity)
        .with_chunk_size(chunk);
    cache.attach(VecSource::new(make_rows(rows))).unwrap();
    cache
}

proptest! {
    #[test]
    fn chunk_always_clamped((capacity, chunk) in geometry()) {
        let cache: RowWindowCache<VecSource, SharedInterestSet> =
            RowWindowCache::new(SharedInterestSet::new())
                .with_capacity(capacity)
                .with_chunk_size(chunk);
        prop_assert!(cache.chunk_size() >= 1);
        prop_assert!(cache.chunk_size() <= capacity.div_ceil(2).max(1));
    }

    #[test]
    fn monotone_pass_reads_each_row_at_most_once(
        rows in 0usize..=64,
        (capacity, chunk) in geometry(),
    ) {
        let source = VecSource::new(make_rows(rows));
        let mut cache = RowWindowCache::new(SharedInterestSet::new())
            .with_capacity(capacity)
            .with_chunk_size(chunk);
        cache.attach(source.clone()).unwrap();
        for i in 0..rows {
            cache.get_row(i).unwrap();
        }
        prop_assert!(source.reads() <= rows);
        prop_assert_eq!(cache.row_count(), rows);
    }

    #[test]
    fn random_access_agrees_with_source(
        rows in 1usize..=48,
        (capacity, chunk) in geometry(),
        seeks in prop::collection::vec(0usize..48, 1..24),
    ) {
        let data = make_rows(rows);
        let set = SharedInterestSet::new();
        let mut cache = attach_cache(rows, capacity, chunk, &set);
        for seek in seeks {
            let index = seek % rows;
            let row = cache.get_row(index).unwrap();
            prop_assert_eq!(row, &data[index]);
            // Same request again is identical.
            let row = cache.get_row(index).unwrap();
            prop_assert_eq!(row, &data[index]);
        }
    }

    #[test]
    fn filter_counts_partition_the_total(
        rows in 0usize..=48,
        (capacity, chunk) in geometry(),
        hilited in prop::collection::btree_set(0u64..48, 0..16),
    ) {
        let set = SharedInterestSet::new();
        for key in &hilited {
            set.insert(RowKey::from_raw(*key));
        }

        let mut interest = attach_cache(rows, capacity, chunk, &set);
        interest
            .set_filter_policy(FilterPolicy::InterestOnly)
            .unwrap();
        let mut i = 0;
        while interest.get_row(i).is_ok() {
            i += 1;
        }
        let interest_count = interest.row_count();

        let mut other = attach_cache(rows, capacity, chunk, &set);
        other.set_filter_policy(FilterPolicy::OtherOnly).unwrap();
        let mut i = 0;
        while other.get_row(i).is_ok() {
            i += 1;
        }
        let other_count = other.row_count();

        let expected_interest = hilited.iter().filter(|k| (**k as usize) < rows).count();
        prop_assert_eq!(interest_count, expected_interest);
        prop_assert_eq!(interest_count + other_count, rows);
    }

    #[test]
    fn search_cursor_wraps_once_per_full_pass(
        rows in 1usize..=24,
        columns in 0usize..=8,
    ) {
        let mut cursor = SearchCursor::grid(columns);
        cursor.mark();
        let mut wraps = 0;
        for _ in 0..rows * (columns + 1) {
            if cursor.next(rows) {
                wraps += 1;
            }
        }
        prop_assert_eq!(wraps, 1);
        prop_assert!(cursor.reached_mark());
        prop_assert_eq!(cursor.current_row(), 0);
    }

    #[test]
    fn key_only_cursor_wraps_once_per_row_pass(rows in 1usize..=64) {
        let mut cursor = SearchCursor::keys_only();
        cursor.mark();
        let mut wraps = 0;
        for _ in 0..rows {
            if cursor.next(rows) {
                wraps += 1;
            }
        }
        prop_assert_eq!(wraps, 1);
        prop_assert!(cursor.reached_mark());
    }

    #[test]
    fn row_count_is_monotone_during_forward_reads(
        rows in 0usize..=48,
        (capacity, chunk) in geometry(),
    ) {
        let set = SharedInterestSet::new();
        let mut cache = attach_cache(rows, capacity, chunk, &set);
        let mut last = cache.row_count();
        for i in 0..rows {
            cache.get_row(i).unwrap();
            let count = cache.row_count();
            prop_assert!(count >= last);
            last = count;
        }
    }
}
