/// The hierarchical source contract consumed by the projections.
///
/// A source is a two-level ordered tree: top-level groups, each either a
/// plain leaf or a container of ordered items. Positions and notifications
/// are expressed in source-natural (non-inverted) order.

/// A row in the source tree. `parent` is `None` for top-level groups and
/// `Some(group)` for the items of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    pub parent: Option<usize>,
    pub row: usize,
}

impl SourcePosition {
    pub fn top_level(row: usize) -> Self {
        SourcePosition { parent: None, row }
    }

    pub fn child(group: usize, row: usize) -> Self {
        SourcePosition {
            parent: Some(group),
            row,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// Read access to a two-level tree
pub trait HierarchicalSource {
    type Item: Clone;

    fn top_level_count(&self) -> usize;

    /// Number of items inside `group`; zero for leaves
    fn child_count(&self, group: usize) -> usize;

    fn is_container(&self, group: usize) -> bool;

    /// Record at `position`, or None if there is no such row
    fn read(&self, position: SourcePosition) -> Option<Self::Item>;

    /// Number of siblings at `parent`'s level
    fn count_under(&self, parent: Option<usize>) -> usize {
        match parent {
            None => self.top_level_count(),
            Some(group) => self.child_count(group),
        }
    }
}

/// A structural mutation, reported before and after it happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceChange {
    /// The whole tree is being replaced
    Reset,
    /// Rows `first..=last` appear under `parent`; indices are post-insert
    Insert {
        parent: Option<usize>,
        first: usize,
        last: usize,
    },
    /// Rows `first..=last` disappear from under `parent`
    Remove {
        parent: Option<usize>,
        first: usize,
        last: usize,
    },
    /// Rows `first..=last` of `parent` move under `dest_parent`, before its
    /// row `dest_row`. All indices use the pre-move numbering.
    Move {
        parent: Option<usize>,
        first: usize,
        last: usize,
        dest_parent: Option<usize>,
        dest_row: usize,
    },
}

impl SourceChange {
    /// Number of rows touched, zero for a reset
    pub fn count(&self) -> usize {
        match *self {
            SourceChange::Reset => 0,
            SourceChange::Insert { first, last, .. }
            | SourceChange::Remove { first, last, .. }
            | SourceChange::Move { first, last, .. } => last - first + 1,
        }
    }
}

/// Receiver of source notifications.
///
/// `about_to_change` is called strictly before the source mutates and
/// `did_change` strictly after, with the same change value. No other
/// mutation happens in between.
pub trait SourceObserver {
    fn about_to_change(&mut self, change: &SourceChange);

    fn did_change(&mut self, change: &SourceChange);

    /// Content of rows `top_left.row..=bottom_right.row` under a common
    /// parent changed.
    fn data_changed(&mut self, _top_left: SourcePosition, _bottom_right: SourcePosition) {}

    /// The selected source row changed
    fn current_changed(&mut self, _current: Option<SourcePosition>) {}
}
