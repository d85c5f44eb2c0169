//! Wrap-detecting traversal over the virtual row/column grid.
//!
//! A [`SearchCursor`] walks every cell of a `rows × (columns + 1)` grid
//! (the extra trailing pseudo-column stands for the row key itself), or
//! every row key when constructed key-only. It exists so a caller can
//! implement
//! "find the next match, wrapping around, and stop with not-found once we
//! are back where we started" without a per-call-site has-wrapped flag:
//! [`next`](SearchCursor::next) reports the single wrap per full pass, and
//! [`mark`](SearchCursor::mark)/[`reached_mark`](SearchCursor::reached_mark)
//! detect the return to the starting cell.
//!
//! Row and column counts are supplied by the caller at each step (they come
//! from the cache and may grow between calls); the cursor owns only its
//! position.

/// Stateful position over the virtual search grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCursor {
    row: usize,
    /// Extended column index; `columns` itself is the key pseudo-column.
    column: usize,
    /// `None` restricts traversal to row keys only.
    columns: Option<usize>,
    mark: Option<(usize, usize)>,
    advanced_since_mark: bool,
}

impl SearchCursor {
    /// A cursor over full rows of `columns` cells plus the key
    /// pseudo-column.
    #[must_use]
    pub fn grid(columns: usize) -> Self {
        Self {
            row: 0,
            column: 0,
            columns: Some(columns),
            mark: None,
            advanced_since_mark: false,
        }
    }

    /// A cursor over row keys only.
    #[must_use]
    pub fn keys_only() -> Self {
        Self {
            row: 0,
            column: 0,
            columns: None,
            mark: None,
            advanced_since_mark: false,
        }
    }

    /// Whether this cursor visits row keys only.
    #[must_use]
    pub fn is_key_only(&self) -> bool {
        self.columns.is_none()
    }

    /// The current row index.
    #[must_use]
    pub fn current_row(&self) -> usize {
        self.row
    }

    /// The current cell column, or `None` while on the key pseudo-column
    /// (always `None` for a key-only cursor).
    #[must_use]
    pub fn current_column(&self) -> Option<usize> {
        match self.columns {
            Some(columns) if self.column < columns => Some(self.column),
            _ => None,
        }
    }

    /// Cells per row in the extended grid.
    fn extended_columns(&self) -> usize {
        match self.columns {
            Some(columns) => columns + 1,
            None => 1,
        }
    }

    /// Advance one cell: column first, then row, wrapping modulo the grid.
    ///
    /// Returns `true` exactly when the row counter wraps past the last row
    /// back to zero — the "every cell has now been visited once since the
    /// last wrap" signal. `rows` is the current row count; a count that
    /// shrank below the cursor's position wraps immediately.
    pub fn next(&mut self, rows: usize) -> bool {
        self.advanced_since_mark = true;
        if rows == 0 || self.row >= rows {
            self.row = 0;
            self.column = 0;
            return true;
        }
        self.column += 1;
        if self.column < self.extended_columns() {
            return false;
        }
        self.column = 0;
        self.row += 1;
        if self.row < rows {
            return false;
        }
        self.row = 0;
        true
    }

    /// Snapshot the current position for [`reached_mark`](Self::reached_mark).
    pub fn mark(&mut self) {
        self.mark = Some((self.row, self.column));
        self.advanced_since_mark = false;
    }

    /// Whether the cursor is back on the marked cell after at least one
    /// [`next`](Self::next). The advance requirement prevents terminating a
    /// search before it starts.
    #[must_use]
    pub fn reached_mark(&self) -> bool {
        self.advanced_since_mark && self.mark == Some((self.row, self.column))
    }

    /// Return to the origin and forget the mark.
    pub fn reset(&mut self) {
        self.row = 0;
        self.column = 0;
        self.mark = None;
        self.advanced_since_mark = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_advances_column_first() {
        let mut cursor = SearchCursor::grid(2);
        assert_eq!(cursor.current_row(), 0);
        assert_eq!(cursor.current_column(), Some(0));

        assert!(!cursor.next(3));
        assert_eq!(cursor.current_column(), Some(1));

        // Third extended cell is the key pseudo-column.
        assert!(!cursor.next(3));
        assert_eq!(cursor.current_column(), None);
        assert_eq!(cursor.current_row(), 0);

        assert!(!cursor.next(3));
        assert_eq!(cursor.current_row(), 1);
        assert_eq!(cursor.current_column(), Some(0));
    }

    #[test]
    fn wraps_exactly_once_per_full_pass() {
        let rows = 4;
        let columns = 3;
        let mut cursor = SearchCursor::grid(columns);
        cursor.mark();

        let mut wraps = 0;
        for _ in 0..rows * (columns + 1) {
            if cursor.next(rows) {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 1);
        assert!(cursor.reached_mark());
    }

    #[test]
    fn key_only_visits_one_cell_per_row() {
        let mut cursor = SearchCursor::keys_only();
        assert!(cursor.is_key_only());
        assert_eq!(cursor.current_column(), None);

        assert!(!cursor.next(3));
        assert_eq!(cursor.current_row(), 1);
        assert!(!cursor.next(3));
        assert_eq!(cursor.current_row(), 2);
        assert!(cursor.next(3));
        assert_eq!(cursor.current_row(), 0);
    }

    #[test]
    fn mark_requires_an_advance() {
        let mut cursor = SearchCursor::grid(1);
        cursor.mark();
        assert!(!cursor.reached_mark());

        // A full loop over a 1x2 extended grid returns to the mark.
        cursor.next(1);
        assert!(!cursor.reached_mark());
        cursor.next(1);
        assert!(cursor.reached_mark());
    }

    #[test]
    fn mark_taken_mid_grid_is_honored() {
        let mut cursor = SearchCursor::grid(2);
        let rows = 3;
        cursor.next(rows);
        cursor.next(rows);
        cursor.mark();
        let marked = (cursor.current_row(), cursor.current_column());

        let mut steps = 0;
        loop {
            cursor.next(rows);
            steps += 1;
            if cursor.reached_mark() {
                break;
            }
            assert!(steps <= rows * 3, "never returned to mark");
        }
        assert_eq!(steps, rows * 3);
        assert_eq!((cursor.current_row(), cursor.current_column()), marked);
    }

    #[test]
    fn empty_grid_wraps_immediately() {
        let mut cursor = SearchCursor::grid(4);
        assert!(cursor.next(0));
        assert_eq!(cursor.current_row(), 0);
        assert_eq!(cursor.current_column(), Some(0));
    }

    #[test]
    fn shrunken_row_count_wraps_to_origin() {
        let mut cursor = SearchCursor::keys_only();
        for _ in 0..5 {
            cursor.next(10);
        }
        assert_eq!(cursor.current_row(), 5);
        // The table shrank below the cursor position.
        assert!(cursor.next(3));
        assert_eq!(cursor.current_row(), 0);
    }

    #[test]
    fn growing_row_count_extends_the_pass() {
        let mut cursor = SearchCursor::keys_only();
        assert!(!cursor.next(2));
        // More rows appeared before the wrap; the pass keeps going.
        assert!(!cursor.next(3));
        assert!(cursor.next(3));
    }

    #[test]
    fn reset_returns_to_origin_and_clears_mark() {
        let mut cursor = SearchCursor::grid(2);
        cursor.next(5);
        cursor.next(5);
        cursor.mark();
        cursor.next(5);
        cursor.reset();

        assert_eq!(cursor.current_row(), 0);
        assert_eq!(cursor.current_column(), Some(0));
        assert!(!cursor.reached_mark());
        // A fresh mark at the origin behaves normally.
        cursor.mark();
        assert!(!cursor.reached_mark());
    }

    #[test]
    fn zero_column_grid_still_visits_keys() {
        // A grid cursor over zero data columns degenerates to key-only
        // traversal, but keeps reporting grid mode.
        let mut cursor = SearchCursor::grid(0);
        assert!(!cursor.is_key_only());
        assert_eq!(cursor.current_column(), None);
        assert!(!cursor.next(2));
        assert_eq!(cursor.current_row(), 1);
        assert!(cursor.next(2));
    }
}
