/// Row inversion and range descriptors shared by both projections.
///
/// Sources store their entries oldest-first; list views present them
/// newest-first. Every conversion between the two orders goes through
/// [`invert`], which is its own inverse for a fixed sibling count.

/// Maps `row` to its position in reversed order among `count` siblings.
///
/// `invert(invert(r, n), n) == r` for every `r < n`.
#[inline]
pub fn invert(row: usize, count: usize) -> usize {
    debug_assert!(row < count, "row {} out of range [0, {})", row, count);
    count - 1 - row
}

/// Inverts an inclusive range. The bounds swap, so the result is still
/// ordered `(first, last)` with `first <= last`.
#[inline]
pub fn invert_range(first: usize, last: usize, count: usize) -> (usize, usize) {
    (invert(last, count), invert(first, count))
}

/// Position in reversed order *before which* rows inserted at source
/// position `first` will appear, given the sibling count prior to the
/// insertion.
///
/// Inserting before source row `first` means inserting after the reversed
/// row `invert(first)`, hence the `+1`. Inserting at the end of the source
/// (`first == count`) lands at the very top.
#[inline]
pub fn insertion_point(first: usize, count_before: usize) -> usize {
    debug_assert!(first <= count_before);
    count_before - first
}

/// A contiguous range of rows together with the source entity owning them:
/// `None` for top-level rows, `Some(group)` for the children of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub parent: Option<usize>,
    pub first: usize,
    pub last: usize,
}

impl IndexRange {
    pub fn new(parent: Option<usize>, first: usize, last: usize) -> Self {
        debug_assert!(first <= last);
        IndexRange { parent, first, last }
    }

    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    /// Always false; empty ranges cannot be constructed.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, row: usize) -> bool {
        self.first <= row && row <= self.last
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}
