/// Changeset - Flat-Space Change Propagation for LiveList
///
/// Projections never rebuild their flat row space from scratch. Every
/// source mutation is translated into zero or more flat-space changes,
/// which accumulate in the projection's changeset until the presentation
/// layer drains them.
///
/// # Change Types
///
/// Structural changes come in begin/end pairs that bracket the moment the
/// rows actually appear, disappear or relocate:
///
/// - `InsertBegin`/`InsertEnd`: rows `first..=last` are being inserted
/// - `RemoveBegin`/`RemoveEnd`: rows `first..=last` are being removed
/// - `MoveBegin`/`MoveEnd`: rows `first..=last` move before row `dest`
/// - `ResetBegin`/`ResetEnd`: everything is being replaced
///
/// Content changes are single-shot:
///
/// - `DataChanged`: rows `first..=last` show different content
/// - `CurrentChanged`: the current row is now `row`
///
/// # Usage Pattern
///
/// 1. The source notifies the projection before and after a mutation
/// 2. The projection pushes flat `ViewChange` events into its changeset
/// 3. The presentation layer calls `drain_changes()` and replays them
use crate::error::Result;
use crate::source::SourcePosition;
use serde::Serialize;

/// A single change to a flat view, in flat (presented) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ViewChange {
    ResetBegin,
    ResetEnd,
    InsertBegin { first: usize, last: usize },
    InsertEnd { first: usize, last: usize },
    RemoveBegin { first: usize, last: usize },
    RemoveEnd { first: usize, last: usize },
    /// Rows `first..=last` move so that they end up before the row that is
    /// `dest` in the pre-move numbering.
    MoveBegin { first: usize, last: usize, dest: usize },
    MoveEnd { first: usize, last: usize, dest: usize },
    DataChanged { first: usize, last: usize },
    CurrentChanged { row: Option<usize> },
}

impl ViewChange {
    /// Returns true for the opening half of a begin/end pair
    pub fn is_begin(&self) -> bool {
        matches!(
            self,
            ViewChange::ResetBegin
                | ViewChange::InsertBegin { .. }
                | ViewChange::RemoveBegin { .. }
                | ViewChange::MoveBegin { .. }
        )
    }

    /// The closing event matching a begin event
    pub fn end_event(&self) -> Option<ViewChange> {
        match *self {
            ViewChange::ResetBegin => Some(ViewChange::ResetEnd),
            ViewChange::InsertBegin { first, last } => Some(ViewChange::InsertEnd { first, last }),
            ViewChange::RemoveBegin { first, last } => Some(ViewChange::RemoveEnd { first, last }),
            ViewChange::MoveBegin { first, last, dest } => Some(ViewChange::MoveEnd { first, last, dest }),
            _ => None,
        }
    }
}

/// A collection of flat changes waiting to be consumed
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    changes: Vec<ViewChange>,
    /// Generation counter - incremented each time changeset is cleared
    generation: u64,
}

impl Changeset {
    pub fn new() -> Self {
        Changeset {
            changes: Vec::new(),
            generation: 0,
        }
    }

    /// Add a change to the changeset
    pub fn push(&mut self, change: ViewChange) {
        log::debug!("view change: {:?}", change);
        self.changes.push(change);
    }

    /// Returns all changes since the last clear
    pub fn changes(&self) -> &[ViewChange] {
        &self.changes
    }

    /// Returns the current generation number
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Clear all changes and increment generation
    pub fn clear(&mut self) {
        self.changes.clear();
        self.generation += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Drain changes, returning ownership and clearing the buffer
    pub fn drain(&mut self) -> Vec<ViewChange> {
        self.generation += 1;
        std::mem::take(&mut self.changes)
    }

    /// Serialize the pending changes as a JSON array
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(&self.changes)
    }
}

/// Common read surface of the flat projections
pub trait FlatProjection {
    type Item;

    /// Number of rows in flat space
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source position shown at flat `row`
    fn map_to_source(&self, row: usize) -> Result<SourcePosition>;

    /// Flat row showing the source `position`
    fn map_from_source(&self, position: SourcePosition) -> Result<usize>;

    /// Source record shown at flat `row`
    fn get_row(&self, row: usize) -> Result<Self::Item>;

    /// Flat changes not yet consumed
    fn changeset(&self) -> &Changeset;

    /// Take the pending flat changes
    fn drain_changes(&mut self) -> Vec<ViewChange>;
}

/// Helper to carry a tracked row across a structural change.
///
/// Rows are inclusive ranges `first..=last` in flat coordinates. A row after
/// an inserted or removed block shifts by the block width, a row inside a
/// removed block disappears, and a row inside a moved block travels with it.
pub struct IndexAdjuster;

impl IndexAdjuster {
    /// Adjust a row after rows `first..=last` were inserted.
    /// The inserted block starts at `first`, so a row at `first` shifts too.
    pub fn adjust_for_insert(row: usize, first: usize, last: usize) -> usize {
        if row >= first {
            row + (last - first + 1)
        } else {
            row
        }
    }

    /// Adjust a row after rows `first..=last` were removed.
    /// Returns None if the row itself was removed.
    pub fn adjust_for_remove(row: usize, first: usize, last: usize) -> Option<usize> {
        if row < first {
            Some(row)
        } else if row > last {
            Some(row - (last - first + 1))
        } else {
            None
        }
    }

    /// Adjust a row after rows `first..=last` moved before row `dest`
    /// (numbered before the move). `dest` must lie outside `first..=last+1`.
    pub fn adjust_for_move(row: usize, first: usize, last: usize, dest: usize) -> usize {
        let width = last - first + 1;
        if (first..=last).contains(&row) {
            if dest < first {
                row - (first - dest)
            } else {
                row + (dest - last - 1)
            }
        } else if dest <= row && row < first {
            // Block moved up past the row
            row + width
        } else if last < row && row < dest {
            // Block moved down past the row
            row - width
        } else {
            row
        }
    }

    pub fn adjust_option_for_insert(row: Option<usize>, first: usize, last: usize) -> Option<usize> {
        row.map(|r| Self::adjust_for_insert(r, first, last))
    }

    pub fn adjust_option_for_remove(row: Option<usize>, first: usize, last: usize) -> Option<usize> {
        row.and_then(|r| Self::adjust_for_remove(r, first, last))
    }

    pub fn adjust_option_for_move(row: Option<usize>, first: usize, last: usize, dest: usize) -> Option<usize> {
        row.map(|r| Self::adjust_for_move(r, first, last, dest))
    }
}
