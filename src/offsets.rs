/// Prefix-sum table over the widths of the top-level groups.
///
/// `offsets[slot]` is the flat row of the first element contributed by the
/// group presented at `slot`. Slots are in presented (reversed) order.
/// Zero-width slots are allowed; several slots may then share an offset.
///
/// Complexity:
/// - O(log N) lookup of the slot containing a flat row
/// - O(N) point updates and range shifts (entries after the touched slot move)

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: Vec<usize>,
    total: usize,
}

impl OffsetTable {
    pub fn new() -> Self {
        OffsetTable {
            offsets: Vec::new(),
            total: 0,
        }
    }

    /// Build a table from widths listed in slot order
    pub fn from_widths<I: IntoIterator<Item = usize>>(widths: I) -> Self {
        let mut table = OffsetTable::new();
        table.rebuild(widths);
        table
    }

    /// Replace the contents with the running totals of `widths`
    pub fn rebuild<I: IntoIterator<Item = usize>>(&mut self, widths: I) {
        self.offsets.clear();
        self.total = 0;
        for width in widths {
            self.offsets.push(self.total);
            self.total += width;
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Total number of flat rows
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Flat row where `slot` starts. `slot == len()` yields the total.
    pub fn offset(&self, slot: usize) -> usize {
        self.offsets.get(slot).copied().unwrap_or(self.total)
    }

    pub fn width(&self, slot: usize) -> usize {
        self.offset(slot + 1) - self.offset(slot)
    }

    /// Find the slot containing flat `row`.
    /// Returns (slot, offset_within_slot).
    ///
    /// Among slots sharing an offset the last one wins, since the zero-width
    /// slots before it cannot contain any row.
    pub fn find(&self, row: usize) -> Option<(usize, usize)> {
        if row >= self.total {
            return None;
        }
        // Rightmost slot where offsets[slot] <= row
        let slot = self.offsets.partition_point(|&offset| offset <= row).checked_sub(1)?;
        Some((slot, row - self.offsets[slot]))
    }

    /// Add `delta` to the offsets of every slot after `slot`, i.e. grow or
    /// shrink the width of `slot` itself.
    pub fn resize_slot(&mut self, slot: usize, delta: isize) {
        for offset in self.offsets.iter_mut().skip(slot + 1) {
            *offset = (*offset as isize + delta) as usize;
        }
        self.total = (self.total as isize + delta) as usize;
    }

    /// Insert new slots with the given widths before `slot`.
    /// Returns the combined width of the new slots.
    pub fn insert_slots(&mut self, slot: usize, widths: &[usize]) -> usize {
        let start = self.offset(slot);
        let mut running = start;
        let mut new_offsets = Vec::with_capacity(widths.len());
        for &width in widths {
            new_offsets.push(running);
            running += width;
        }
        let added = running - start;
        for offset in self.offsets.iter_mut().skip(slot) {
            *offset += added;
        }
        self.offsets.splice(slot..slot, new_offsets);
        self.total += added;
        added
    }

    /// Remove slots `first..=last`. Returns their widths in slot order.
    pub fn remove_slots(&mut self, first: usize, last: usize) -> Vec<usize> {
        let widths: Vec<usize> = (first..=last).map(|slot| self.width(slot)).collect();
        let removed: usize = widths.iter().sum();
        self.offsets.drain(first..=last);
        for offset in self.offsets.iter_mut().skip(first) {
            *offset -= removed;
        }
        self.total -= removed;
        widths
    }

    /// Checks that offsets are non-decreasing, start at zero and stay
    /// within the total.
    pub fn is_consistent(&self) -> bool {
        let starts_at_zero = self.offsets.first().map_or(true, |&first| first == 0);
        let ordered = self.offsets.windows(2).all(|pair| pair[0] <= pair[1]);
        let bounded = self.offsets.last().map_or(self.total == 0, |&last| last <= self.total);
        starts_at_zero && ordered && bounded
    }
}
