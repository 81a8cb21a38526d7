/// Expandable projection of a two-level source.
///
/// Every top-level group is shown, newest first. At most one group is
/// expanded at a time; its items are spliced into the flat list directly
/// below it, also newest first. The projection tracks the expanded group
/// and the current row across every source mutation.
use crate::changeset::{Changeset, FlatProjection, IndexAdjuster, ViewChange};
use crate::config::ViewConfig;
use crate::error::{Error, Result};
use crate::rows::{insertion_point, invert, invert_range, IndexRange};
use crate::source::{HierarchicalSource, SourceChange, SourceObserver, SourcePosition};
use std::cell::RefCell;
use std::rc::Rc;

/// Per-row fields a presentation layer can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The source record, relayed untouched
    Record,
    /// Whether the row is a top-level group rather than an item
    IsTopLevel,
    /// Whether the row is a group that holds items
    IsContainer,
    /// Whether the row is the expanded group
    IsExpanded,
    /// Whether the row is the current row
    IsCurrent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    Record(T),
    Flag(bool),
}

/// Where the second half of a degraded move lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertTarget {
    TopLevel { row: usize },
    Expanded { row: usize },
}

/// Work decided before a source mutation, finished after it.
/// Visibility is judged once, against the pre-mutation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Invisible,
    Reset,
    Remove { first: usize, last: usize },
    Insert { first: usize, last: usize },
    Move { first: usize, last: usize, dest: usize },
    RemoveThenInsert { first: usize, last: usize, count: usize, target: InsertTarget },
}

/// A flat list of every group plus the items of at most one expanded group
///
/// # Examples
///
/// ```
/// use livelist::{ExpandableProjection, FlatProjection, Group, TreeModel, ViewChange};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let mut model = TreeModel::new(vec![
///     Group::Leaf("A"),
///     Group::container("T", vec!["x", "y"]),
///     Group::Leaf("B"),
/// ]);
/// let view = Rc::new(RefCell::new(ExpandableProjection::new(model.tree())));
/// model.subscribe(view.clone());
///
/// // Flat order is [B, T, A]; expanding T splices in [y, x]
/// view.borrow_mut().expand(1);
/// assert_eq!(view.borrow().len(), 5);
/// assert_eq!(view.borrow().get_row(2).unwrap(), "y");
/// assert_eq!(
///     view.borrow_mut().drain_changes(),
///     vec![
///         ViewChange::InsertBegin { first: 2, last: 3 },
///         ViewChange::InsertEnd { first: 2, last: 3 },
///     ]
/// );
/// ```
pub struct ExpandableProjection<S: HierarchicalSource> {
    source: Rc<RefCell<S>>,
    config: ViewConfig,
    /// Flat row of the expanded group
    expanded: Option<usize>,
    /// Flat row of the current item
    current: Option<usize>,
    changeset: Changeset,
    pending: Option<Plan>,
}

impl<S: HierarchicalSource> ExpandableProjection<S> {
    pub fn new(source: Rc<RefCell<S>>) -> Self {
        Self::with_config(source, ViewConfig::default())
    }

    pub fn with_config(source: Rc<RefCell<S>>, config: ViewConfig) -> Self {
        ExpandableProjection {
            source,
            config,
            expanded: None,
            current: None,
            changeset: Changeset::new(),
            pending: None,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Flat row of the expanded group
    pub fn expanded_row(&self) -> Option<usize> {
        self.expanded
    }

    /// Source index of the expanded group
    pub fn expanded_group(&self) -> Option<usize> {
        let count = self.top_count();
        self.expanded.filter(|&e| e < count).map(|e| invert(e, count))
    }

    pub fn current_row(&self) -> Option<usize> {
        self.current
    }

    fn top_count(&self) -> usize {
        self.source.borrow().top_level_count()
    }

    /// Number of items spliced in below the expanded group
    fn expanded_children(&self) -> usize {
        let source = self.source.borrow();
        let count = source.top_level_count();
        match self.expanded {
            Some(e) if e < count => source.child_count(invert(e, count)),
            _ => 0,
        }
    }

    /// Top-level rows and the expanded group's items are visible; items of
    /// any other group are not.
    fn is_visible(&self, parent: Option<usize>) -> bool {
        parent.is_none() || parent == self.expanded_group()
    }

    /// Flat image of source rows `first..=last` under `parent`, or None if
    /// they are not visible.
    ///
    /// A top-level range containing the expanded group also covers its
    /// items, so the image stays contiguous.
    fn flat_range(&self, parent: Option<usize>, first: usize, last: usize) -> Option<IndexRange> {
        if !self.is_visible(parent) {
            return None;
        }
        let k = self.expanded_children();
        let (lo, hi) = match (parent, self.expanded) {
            (None, expanded) => {
                let (top_lo, top_hi) = invert_range(first, last, self.top_count());
                let lo = match expanded {
                    Some(e) if top_lo > e => top_lo + k,
                    _ => top_lo,
                };
                let hi = match expanded {
                    Some(e) if top_hi >= e => top_hi + k,
                    _ => top_hi,
                };
                (lo, hi)
            }
            (Some(_), Some(e)) => {
                let (child_lo, child_hi) = invert_range(first, last, k);
                (e + 1 + child_lo, e + 1 + child_hi)
            }
            (Some(_), None) => return None,
        };
        Some(IndexRange::new(parent, lo, hi))
    }

    /// Flat rows that `count` rows inserted at top-level source row `first`
    /// will occupy. `top_before` is the top-level count before the insert,
    /// `k` the expanded group's item count.
    fn top_insert_span(&self, top_before: usize, first: usize, count: usize, k: usize) -> (usize, usize) {
        let top = insertion_point(first, top_before);
        let lo = match self.expanded {
            Some(e) if e < top => top + k,
            _ => top,
        };
        (lo, lo + count - 1)
    }

    /// Flat rows for an insert into a visible parent, judged pre-insert
    fn insert_span(&self, parent: Option<usize>, first: usize, count: usize) -> Option<(usize, usize)> {
        let k = self.expanded_children();
        match (parent, self.expanded) {
            (None, _) => Some(self.top_insert_span(self.top_count(), first, count, k)),
            (Some(_), Some(e)) => {
                let lo = e + 1 + insertion_point(first, k);
                Some((lo, lo + count - 1))
            }
            (Some(_), None) => None,
        }
    }

    /// Flat row before which rows moved to `dest_row` of a visible parent
    /// will appear, pre-move numbering
    fn move_destination(&self, dest_parent: Option<usize>, dest_row: usize) -> Option<usize> {
        let k = self.expanded_children();
        match (dest_parent, self.expanded) {
            (None, expanded) => {
                let top = insertion_point(dest_row, self.top_count());
                Some(match expanded {
                    Some(e) if e < top => top + k,
                    _ => top,
                })
            }
            (Some(_), Some(e)) => Some(e + 1 + insertion_point(dest_row, k)),
            (Some(_), None) => None,
        }
    }

    /// Rows that a degraded move re-inserts, judged after the source
    /// mutated and the removal half has been applied
    fn reinsert_span(&self, target: InsertTarget, count: usize) -> Option<(usize, usize)> {
        let source = self.source.borrow();
        let top_after = source.top_level_count();
        match target {
            InsertTarget::TopLevel { row } => {
                let top_before = top_after.checked_sub(count)?;
                let top = insertion_point(row.min(top_before), top_before);
                let k = match self.expanded {
                    Some(e) => {
                        let e_after = if e >= top { e + count } else { e };
                        if e_after < top_after {
                            source.child_count(invert(e_after, top_after))
                        } else {
                            0
                        }
                    }
                    None => 0,
                };
                let lo = match self.expanded {
                    Some(e) if e < top => top + k,
                    _ => top,
                };
                Some((lo, lo + count - 1))
            }
            InsertTarget::Expanded { row } => {
                let e = self.expanded.filter(|&e| e < top_after)?;
                let k_before = source.child_count(invert(e, top_after)).checked_sub(count)?;
                let lo = e + 1 + insertion_point(row.min(k_before), k_before);
                Some((lo, lo + count - 1))
            }
        }
    }

    fn begin(&mut self, change: ViewChange) {
        self.changeset.push(change);
    }

    /// Forget the current row, telling the presentation layer if there was one
    fn clear_current(&mut self) {
        if self.current.take().is_some() {
            self.changeset.push(ViewChange::CurrentChanged { row: None });
        }
    }

    fn finish_remove(&mut self, first: usize, last: usize) {
        let was_expanded = self.expanded;
        self.expanded = IndexAdjuster::adjust_option_for_remove(self.expanded, first, last);
        if was_expanded.is_some() && self.expanded.is_none() {
            log::debug!("expanded group removed, collapsing");
        }
        let current = self.current.and_then(|row| IndexAdjuster::adjust_for_remove(row, first, last));
        self.changeset.push(ViewChange::RemoveEnd { first, last });
        match current {
            Some(row) => self.current = Some(row),
            None => self.clear_current(),
        }
    }

    fn finish_insert(&mut self, first: usize, last: usize) {
        self.expanded = IndexAdjuster::adjust_option_for_insert(self.expanded, first, last);
        self.current = IndexAdjuster::adjust_option_for_insert(self.current, first, last);
        self.changeset.push(ViewChange::InsertEnd { first, last });
    }

    fn prepare_remove(&mut self, parent: Option<usize>, first: usize, last: usize) -> Plan {
        match self.flat_range(parent, first, last) {
            Some(range) => {
                self.begin(ViewChange::RemoveBegin {
                    first: range.first,
                    last: range.last,
                });
                Plan::Remove {
                    first: range.first,
                    last: range.last,
                }
            }
            None => Plan::Invisible,
        }
    }

    fn prepare_insert(&mut self, parent: Option<usize>, first: usize, count: usize) -> Plan {
        if !self.is_visible(parent) {
            return Plan::Invisible;
        }
        match self.insert_span(parent, first, count) {
            Some((lo, hi)) => {
                self.begin(ViewChange::InsertBegin { first: lo, last: hi });
                Plan::Insert { first: lo, last: hi }
            }
            None => Plan::Invisible,
        }
    }

    // Moving rows has numerous cases; those crossing the edge of the
    // visible scope degrade to removing or inserting rows.
    fn prepare_move(
        &mut self,
        parent: Option<usize>,
        first: usize,
        last: usize,
        dest_parent: Option<usize>,
        dest_row: usize,
        count: usize,
    ) -> Plan {
        if parent.is_none() && dest_parent.is_some() {
            let source = self.source.borrow();
            if (first..=last).any(|g| source.is_container(g)) {
                log::warn!("ExpandableProjection: moving groups {}..={} into a group", first, last);
            }
        }

        match (self.is_visible(parent), self.is_visible(dest_parent)) {
            (false, false) => Plan::Invisible,
            (true, false) => self.prepare_remove(parent, first, last),
            (false, true) => self.prepare_insert(dest_parent, dest_row, count),
            (true, true) if parent == dest_parent => {
                let (Some(range), Some(dest)) =
                    (self.flat_range(parent, first, last), self.move_destination(dest_parent, dest_row))
                else {
                    return Plan::Invisible;
                };
                if (range.first..=range.last + 1).contains(&dest) {
                    log::warn!(
                        "ExpandableProjection: move of {}..={} before {} is a no-op",
                        range.first,
                        range.last,
                        dest
                    );
                    return Plan::Invisible;
                }
                self.begin(ViewChange::MoveBegin {
                    first: range.first,
                    last: range.last,
                    dest,
                });
                Plan::Move {
                    first: range.first,
                    last: range.last,
                    dest,
                }
            }
            (true, true) => {
                let Some(range) = self.flat_range(parent, first, last) else {
                    return Plan::Invisible;
                };
                let target = match dest_parent {
                    None => InsertTarget::TopLevel { row: dest_row },
                    Some(_) => InsertTarget::Expanded { row: dest_row },
                };
                self.begin(ViewChange::RemoveBegin {
                    first: range.first,
                    last: range.last,
                });
                Plan::RemoveThenInsert {
                    first: range.first,
                    last: range.last,
                    count,
                    target,
                }
            }
        }
    }

    fn execute(&mut self, plan: Plan) {
        match plan {
            Plan::Invisible => {}
            Plan::Reset => {
                self.expanded = None;
                self.changeset.push(ViewChange::ResetEnd);
                self.clear_current();
            }
            Plan::Remove { first, last } => self.finish_remove(first, last),
            Plan::Insert { first, last } => self.finish_insert(first, last),
            Plan::Move { first, last, dest } => {
                self.expanded = IndexAdjuster::adjust_option_for_move(self.expanded, first, last, dest);
                self.current = IndexAdjuster::adjust_option_for_move(self.current, first, last, dest);
                self.changeset.push(ViewChange::MoveEnd { first, last, dest });
            }
            Plan::RemoveThenInsert {
                first,
                last,
                count,
                target,
            } => {
                self.finish_remove(first, last);
                match self.reinsert_span(target, count) {
                    Some((lo, hi)) => {
                        self.begin(ViewChange::InsertBegin { first: lo, last: hi });
                        self.finish_insert(lo, hi);
                    }
                    None => log::warn!("ExpandableProjection: moved rows have no visible destination"),
                }
            }
        }
    }

    /// Splice the items of the group at flat `row` in below it, collapsing
    /// any other expanded group first (which clears the current row). Only
    /// top-level rows can be expanded.
    pub fn expand(&mut self, row: usize) {
        if row >= self.len() {
            log::warn!("ExpandableProjection::expand(): row {} out of range [0, {})", row, self.len());
            return;
        }
        if self.expanded == Some(row) {
            return;
        }

        let mut row = row;
        if let Some(e) = self.expanded {
            let k = self.expanded_children();
            if row > e {
                if row <= e + k {
                    log::warn!("ExpandableProjection::expand(): row {} is inside the expanded group", row);
                    return;
                }
                // Collapsing pulls every later row up
                row -= k;
            }
            self.unexpand();
        }

        let count = {
            let source = self.source.borrow();
            source.child_count(invert(row, source.top_level_count()))
        };
        log::debug!("expanding row {} ({} items)", row, count);
        if count == 0 {
            // An empty range has no insert notification
            self.expanded = Some(row);
            return;
        }
        let (first, last) = (row + 1, row + count);
        self.begin(ViewChange::InsertBegin { first, last });
        self.expanded = Some(row);
        self.current = IndexAdjuster::adjust_option_for_insert(self.current, first, last);
        self.changeset.push(ViewChange::InsertEnd { first, last });
    }

    /// Collapse the expanded group, if any. The current row is cleared.
    pub fn unexpand(&mut self) {
        let Some(e) = self.expanded else {
            return;
        };
        let k = self.expanded_children();
        log::debug!("collapsing row {} ({} items)", e, k);
        self.expanded = None;
        if k > 0 {
            let (first, last) = (e + 1, e + k);
            self.begin(ViewChange::RemoveBegin { first, last });
            self.changeset.push(ViewChange::RemoveEnd { first, last });
        }
        self.clear_current();
    }

    /// Collapse `row` if it is the expanded group, expand it otherwise
    pub fn toggle(&mut self, row: usize) {
        if self.expanded == Some(row) {
            self.unexpand();
        } else {
            self.expand(row);
        }
    }

    /// Flat row of `position`, or None if it is not visible
    fn visible_row(&self, position: SourcePosition) -> Option<usize> {
        let source = self.source.borrow();
        let count = source.top_level_count();
        let k = self.expanded_children();
        match position.parent {
            None => {
                if position.row >= count {
                    return None;
                }
                let top = invert(position.row, count);
                Some(match self.expanded {
                    Some(e) if top > e => top + k,
                    _ => top,
                })
            }
            Some(group) => {
                if Some(group) != self.expanded_group() || position.row >= k {
                    return None;
                }
                self.expanded.map(|e| e + 1 + invert(position.row, k))
            }
        }
    }

    /// Make `position` the current row, expanding its group when needed
    pub fn on_current_changed(&mut self, position: Option<SourcePosition>) {
        let new_row = match position {
            None => None,
            Some(position) => {
                if let Some(group) = position.parent {
                    if self.config.follow_current && self.expanded_group() != Some(group) {
                        if let Some(row) = self.visible_row(SourcePosition::top_level(group)) {
                            self.expand(row);
                        }
                    }
                }
                self.visible_row(position)
            }
        };

        let old_row = self.current;
        self.current = new_row;
        if let Some(row) = old_row {
            if row < self.len() {
                self.changeset.push(ViewChange::DataChanged { first: row, last: row });
            }
        }
        if let Some(row) = new_row {
            if old_row != Some(row) {
                self.changeset.push(ViewChange::DataChanged { first: row, last: row });
            }
        }
        self.changeset.push(ViewChange::CurrentChanged { row: new_row });
    }

    /// Forward a content change of source rows `top_left..=bottom_right`
    pub fn on_data_changed(&mut self, top_left: SourcePosition, bottom_right: SourcePosition) {
        if top_left.parent != bottom_right.parent || top_left.row > bottom_right.row {
            log::warn!(
                "ExpandableProjection: malformed change range {:?}..{:?}",
                top_left,
                bottom_right
            );
            return;
        }
        let parent = top_left.parent;
        if !self.is_visible(parent) {
            return;
        }
        let k = self.expanded_children();
        match (parent, self.expanded) {
            (None, expanded) => {
                let count = self.top_count();
                if bottom_right.row >= count {
                    return;
                }
                let (top_lo, top_hi) = invert_range(top_left.row, bottom_right.row, count);
                match expanded {
                    // The expanded group's items sit inside the range: split
                    // around them
                    Some(e) if k > 0 && top_lo <= e && e < top_hi => {
                        self.changeset.push(ViewChange::DataChanged { first: top_lo, last: e });
                        self.changeset.push(ViewChange::DataChanged {
                            first: e + 1 + k,
                            last: top_hi + k,
                        });
                    }
                    Some(e) if top_lo > e => {
                        self.changeset.push(ViewChange::DataChanged {
                            first: top_lo + k,
                            last: top_hi + k,
                        });
                    }
                    _ => {
                        self.changeset.push(ViewChange::DataChanged {
                            first: top_lo,
                            last: top_hi,
                        });
                    }
                }
            }
            (Some(_), Some(_)) => {
                if bottom_right.row >= k {
                    return;
                }
                if let Some(range) = self.flat_range(parent, top_left.row, bottom_right.row) {
                    self.changeset.push(ViewChange::DataChanged {
                        first: range.first,
                        last: range.last,
                    });
                }
            }
            (Some(_), None) => {}
        }
    }

    /// Whether flat `row` shows a top-level group
    pub fn is_top_level(&self, row: usize) -> bool {
        match self.expanded {
            Some(e) => row <= e || row > e + self.expanded_children(),
            None => true,
        }
    }

    pub fn is_expanded_row(&self, row: usize) -> bool {
        self.expanded == Some(row)
    }

    /// Value of `field` for flat `row`
    pub fn data(&self, row: usize, field: Field) -> Result<FieldValue<S::Item>> {
        if row >= self.len() {
            return Err(Error::RowOutOfRange { row, len: self.len() });
        }
        Ok(match field {
            Field::Record => FieldValue::Record(self.get_row(row)?),
            Field::IsTopLevel => FieldValue::Flag(self.is_top_level(row)),
            Field::IsContainer => {
                let position = self.map_to_source(row)?;
                FieldValue::Flag(position.is_top_level() && self.source.borrow().is_container(position.row))
            }
            Field::IsExpanded => FieldValue::Flag(self.is_expanded_row(row)),
            Field::IsCurrent => FieldValue::Flag(self.current == Some(row)),
        })
    }
}

impl<S: HierarchicalSource> FlatProjection for ExpandableProjection<S> {
    type Item = S::Item;

    fn len(&self) -> usize {
        self.top_count() + self.expanded_children()
    }

    fn map_to_source(&self, row: usize) -> Result<SourcePosition> {
        let len = self.len();
        if row >= len {
            return Err(Error::RowOutOfRange { row, len });
        }
        let count = self.top_count();
        let Some(e) = self.expanded else {
            return Ok(SourcePosition::top_level(invert(row, count)));
        };
        let k = self.expanded_children();
        if row <= e {
            Ok(SourcePosition::top_level(invert(row, count)))
        } else if row <= e + k {
            Ok(SourcePosition::child(invert(e, count), invert(row - e - 1, k)))
        } else {
            Ok(SourcePosition::top_level(invert(row - k, count)))
        }
    }

    /// Asking for an item of a group that is not expanded is a caller bug;
    /// it is logged and answered with `Error::NotExpanded`.
    fn map_from_source(&self, position: SourcePosition) -> Result<usize> {
        if let Some(group) = position.parent {
            if Some(group) != self.expanded_group() {
                log::warn!(
                    "ExpandableProjection::map_from_source() called on an item of group {}, which is not expanded",
                    group
                );
                return Err(Error::NotExpanded { group });
            }
        }
        self.visible_row(position).ok_or_else(|| Error::RowOutOfRange {
            row: position.row,
            len: self.source.borrow().count_under(position.parent),
        })
    }

    fn get_row(&self, row: usize) -> Result<S::Item> {
        let position = self.map_to_source(row)?;
        self.source
            .borrow()
            .read(position)
            .ok_or(Error::RowOutOfRange { row, len: self.len() })
    }

    fn changeset(&self) -> &Changeset {
        &self.changeset
    }

    fn drain_changes(&mut self) -> Vec<ViewChange> {
        self.changeset.drain()
    }
}

impl<S: HierarchicalSource> SourceObserver for ExpandableProjection<S> {
    fn about_to_change(&mut self, change: &SourceChange) {
        if let Some(plan) = self.pending.take() {
            log::warn!("ExpandableProjection: {:?} still pending, finishing it early", plan);
            self.execute(plan);
        }
        let plan = match *change {
            SourceChange::Reset => {
                self.begin(ViewChange::ResetBegin);
                Plan::Reset
            }
            SourceChange::Remove { parent, first, last } => self.prepare_remove(parent, first, last),
            SourceChange::Insert { parent, first, .. } => self.prepare_insert(parent, first, change.count()),
            SourceChange::Move {
                parent,
                first,
                last,
                dest_parent,
                dest_row,
            } => self.prepare_move(parent, first, last, dest_parent, dest_row, change.count()),
        };
        self.pending = Some(plan);
    }

    fn did_change(&mut self, change: &SourceChange) {
        match self.pending.take() {
            Some(plan) => self.execute(plan),
            None => log::warn!("ExpandableProjection: {:?} finished without being announced", change),
        }
    }

    fn data_changed(&mut self, top_left: SourcePosition, bottom_right: SourcePosition) {
        self.on_data_changed(top_left, bottom_right);
    }

    fn current_changed(&mut self, current: Option<SourcePosition>) {
        self.on_current_changed(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{apply_op, init_logging, op_strategy, render, replay, sample_groups, Op};
    use crate::tree::{Group, GroupTree, TreeModel};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    type View = ExpandableProjection<GroupTree<String>>;

    fn leaf(name: &str) -> Group<String> {
        Group::Leaf(name.to_string())
    }

    fn trip(name: &str, items: &[&str]) -> Group<String> {
        Group::container(name.to_string(), items.iter().map(|s| s.to_string()).collect())
    }

    fn setup(groups: Vec<Group<String>>) -> (TreeModel<String>, Rc<RefCell<View>>) {
        init_logging();
        let mut model = TreeModel::new(groups);
        let view = Rc::new(RefCell::new(ExpandableProjection::new(model.tree())));
        model.subscribe(view.clone());
        (model, view)
    }

    fn rows(view: &Rc<RefCell<View>>) -> Vec<String> {
        render(&*view.borrow())
    }

    fn drain(view: &Rc<RefCell<View>>) -> Vec<ViewChange> {
        view.borrow_mut().drain_changes()
    }

    #[test]
    fn test_leaves_are_reversed() {
        let (_model, view) = setup(vec![leaf("A"), leaf("B"), leaf("C")]);
        assert_eq!(view.borrow().len(), 3);
        assert_eq!(rows(&view), vec!["C", "B", "A"]);
        assert_eq!(view.borrow().map_to_source(0).unwrap(), SourcePosition::top_level(2));
    }

    #[test]
    fn test_expand_splices_children_in_reverse() {
        let (_model, view) = setup(vec![leaf("A"), trip("T", &["x", "y"]), leaf("B")]);
        assert_eq!(view.borrow().len(), 3);

        view.borrow_mut().expand(1);
        assert_eq!(view.borrow().len(), 5);
        assert_eq!(rows(&view), vec!["B", "T", "y", "x", "A"]);
        assert_eq!(view.borrow().map_to_source(2).unwrap(), SourcePosition::child(1, 1));
        assert_eq!(view.borrow().map_to_source(3).unwrap(), SourcePosition::child(1, 0));
        assert_eq!(view.borrow().map_to_source(4).unwrap(), SourcePosition::top_level(0));
        assert_eq!(view.borrow().expanded_group(), Some(1));
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::InsertBegin { first: 2, last: 3 },
                ViewChange::InsertEnd { first: 2, last: 3 },
            ]
        );
    }

    #[test]
    fn test_remove_before_expanded_group_in_source() {
        let (mut model, view) = setup(vec![leaf("A"), leaf("B"), trip("T", &["x", "y"])]);
        view.borrow_mut().expand(0);
        assert_eq!(view.borrow().expanded_group(), Some(2));
        drain(&view);

        model.remove_groups(0, 0).unwrap();
        assert_eq!(view.borrow().expanded_group(), Some(1));
        assert_eq!(view.borrow().expanded_row(), Some(0));
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::RemoveBegin { first: 4, last: 4 },
                ViewChange::RemoveEnd { first: 4, last: 4 },
            ]
        );
        assert_eq!(rows(&view), vec!["T", "y", "x", "B"]);
    }

    #[test]
    fn test_remove_after_expanded_group_in_source_shifts_row() {
        let (mut model, view) = setup(vec![trip("T", &["x"]), leaf("A"), leaf("B")]);
        view.borrow_mut().expand(2);
        drain(&view);

        model.remove_groups(2, 2).unwrap();
        assert_eq!(view.borrow().expanded_row(), Some(1));
        assert_eq!(view.borrow().expanded_group(), Some(0));
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::RemoveBegin { first: 0, last: 0 },
                ViewChange::RemoveEnd { first: 0, last: 0 },
            ]
        );
    }

    #[test]
    fn test_removing_expanded_group_takes_its_children() {
        let (mut model, view) = setup(vec![leaf("A"), trip("T", &["x", "y"]), leaf("B")]);
        view.borrow_mut().expand(1);
        drain(&view);

        model.remove_groups(1, 1).unwrap();
        assert_eq!(view.borrow().expanded_row(), None);
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::RemoveBegin { first: 1, last: 3 },
                ViewChange::RemoveEnd { first: 1, last: 3 },
            ]
        );
        assert_eq!(rows(&view), vec!["B", "A"]);
    }

    #[test]
    fn test_move_child_to_top_level_degrades_to_remove_insert() {
        let (mut model, view) = setup(vec![leaf("A"), trip("T", &["x", "y"]), leaf("B")]);
        view.borrow_mut().expand(1);
        drain(&view);

        model.move_rows(Some(1), 0, 0, None, 3).unwrap();
        let changes = drain(&view);
        assert!(changes.iter().all(|c| !matches!(c, ViewChange::MoveBegin { .. })));
        assert_eq!(
            changes,
            vec![
                ViewChange::RemoveBegin { first: 3, last: 3 },
                ViewChange::RemoveEnd { first: 3, last: 3 },
                ViewChange::InsertBegin { first: 0, last: 0 },
                ViewChange::InsertEnd { first: 0, last: 0 },
            ]
        );
        assert_eq!(rows(&view), vec!["x", "B", "T", "y", "A"]);
        assert_eq!(view.borrow().expanded_row(), Some(2));
    }

    #[test]
    fn test_move_leaf_into_expanded_group() {
        let (mut model, view) = setup(vec![leaf("A"), trip("T", &["x", "y"]), leaf("B")]);
        view.borrow_mut().expand(1);
        let mut mirror = rows(&view);
        drain(&view);

        model.move_rows(None, 2, 2, Some(1), 0).unwrap();
        let changes = drain(&view);
        replay(&mut mirror, &changes, &*view.borrow());
        assert_eq!(mirror, vec!["T", "y", "x", "B", "A"]);
        assert_eq!(view.borrow().expanded_row(), Some(0));
    }

    #[test]
    fn test_top_level_move_carries_expanded_group() {
        let (mut model, view) = setup(vec![leaf("A"), trip("T", &["x", "y"]), leaf("B"), leaf("C")]);
        view.borrow_mut().expand(2);
        assert_eq!(rows(&view), vec!["C", "B", "T", "y", "x", "A"]);
        drain(&view);

        model.move_rows(None, 1, 2, None, 4).unwrap();
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::MoveBegin { first: 1, last: 4, dest: 0 },
                ViewChange::MoveEnd { first: 1, last: 4, dest: 0 },
            ]
        );
        assert_eq!(view.borrow().expanded_row(), Some(1));
        assert_eq!(rows(&view), vec!["B", "T", "y", "x", "C", "A"]);
    }

    #[test]
    fn test_changes_in_collapsed_group_are_invisible() {
        let (mut model, view) = setup(vec![trip("S", &["a"]), trip("T", &["x"])]);
        view.borrow_mut().expand(0);
        view.borrow_mut().on_current_changed(Some(SourcePosition::child(1, 0)));
        drain(&view);
        let (expanded, current) = (view.borrow().expanded_row(), view.borrow().current_row());

        model.insert_items(0, 0, vec!["b".to_string()]).unwrap();
        model.remove_items(0, 0, 1).unwrap();
        model.touch(Some(0), 0, 0).ok();
        assert!(drain(&view).is_empty());
        assert_eq!(view.borrow().expanded_row(), expanded);
        assert_eq!(view.borrow().current_row(), current);
    }

    #[test]
    fn test_expand_other_group_collapses_first() {
        let (_model, view) = setup(vec![trip("T1", &["a", "b"]), trip("T2", &["c"])]);
        view.borrow_mut().expand(0);
        assert_eq!(rows(&view), vec!["T2", "c", "T1"]);
        drain(&view);

        // T1 is at flat row 2 while T2 is expanded
        view.borrow_mut().expand(2);
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::RemoveBegin { first: 1, last: 1 },
                ViewChange::RemoveEnd { first: 1, last: 1 },
                ViewChange::InsertBegin { first: 2, last: 3 },
                ViewChange::InsertEnd { first: 2, last: 3 },
            ]
        );
        assert_eq!(view.borrow().expanded_row(), Some(1));
        assert_eq!(rows(&view), vec!["T2", "T1", "b", "a"]);
    }

    #[test]
    fn test_expand_inside_expanded_group_is_ignored() {
        let (_model, view) = setup(vec![trip("T1", &["a", "b"]), trip("T2", &["c"])]);
        view.borrow_mut().expand(0);
        drain(&view);

        view.borrow_mut().expand(1);
        assert!(drain(&view).is_empty());
        assert_eq!(view.borrow().expanded_row(), Some(0));

        view.borrow_mut().expand(7);
        assert!(drain(&view).is_empty());
    }

    #[test]
    fn test_empty_group_expands_silently() {
        let (_model, view) = setup(vec![trip("E", &[]), leaf("A")]);
        view.borrow_mut().expand(1);
        assert_eq!(view.borrow().expanded_row(), Some(1));
        assert_eq!(view.borrow().expanded_group(), Some(0));
        assert!(drain(&view).is_empty());

        view.borrow_mut().unexpand();
        assert_eq!(view.borrow().expanded_row(), None);
        assert!(drain(&view).is_empty());
    }

    #[test]
    fn test_toggle() {
        let (_model, view) = setup(vec![leaf("A"), trip("T", &["x", "y"])]);
        view.borrow_mut().toggle(0);
        assert_eq!(view.borrow().len(), 4);
        view.borrow_mut().toggle(0);
        assert_eq!(view.borrow().len(), 2);
        assert_eq!(view.borrow().expanded_row(), None);
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::InsertBegin { first: 1, last: 2 },
                ViewChange::InsertEnd { first: 1, last: 2 },
                ViewChange::RemoveBegin { first: 1, last: 2 },
                ViewChange::RemoveEnd { first: 1, last: 2 },
            ]
        );
    }

    #[test]
    fn test_map_from_source_rejects_collapsed_children() {
        let (_model, view) = setup(vec![trip("T1", &["a"]), trip("T2", &["c"])]);
        view.borrow_mut().expand(0);
        let view = view.borrow();
        assert_eq!(view.map_from_source(SourcePosition::child(1, 0)), Ok(1));
        assert_eq!(
            view.map_from_source(SourcePosition::child(0, 0)),
            Err(Error::NotExpanded { group: 0 })
        );
        assert_eq!(view.map_from_source(SourcePosition::top_level(0)), Ok(2));
        assert!(matches!(view.map_to_source(3), Err(Error::RowOutOfRange { row: 3, len: 3 })));
    }

    #[test]
    fn test_current_change_expands_group() {
        let (mut model, view) = setup(vec![trip("T1", &["a", "b"]), trip("T2", &["c"])]);
        model.set_current(Some(SourcePosition::child(0, 0))).unwrap();

        assert_eq!(rows(&view), vec!["T2", "T1", "b", "a"]);
        assert_eq!(view.borrow().current_row(), Some(3));
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::InsertBegin { first: 2, last: 3 },
                ViewChange::InsertEnd { first: 2, last: 3 },
                ViewChange::DataChanged { first: 3, last: 3 },
                ViewChange::CurrentChanged { row: Some(3) },
            ]
        );

        // Moving to a top-level row touches both rows
        model.set_current(Some(SourcePosition::top_level(1))).unwrap();
        assert_eq!(view.borrow().current_row(), Some(0));
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::DataChanged { first: 3, last: 3 },
                ViewChange::DataChanged { first: 0, last: 0 },
                ViewChange::CurrentChanged { row: Some(0) },
            ]
        );

        model.set_current(None).unwrap();
        assert_eq!(view.borrow().current_row(), None);
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::DataChanged { first: 0, last: 0 },
                ViewChange::CurrentChanged { row: None },
            ]
        );
    }

    #[test]
    fn test_current_without_follow() {
        init_logging();
        let mut model = TreeModel::new(vec![trip("T1", &["a"]), leaf("B")]);
        let view = Rc::new(RefCell::new(ExpandableProjection::with_config(
            model.tree(),
            ViewConfig::default().without_follow_current(),
        )));
        model.subscribe(view.clone());

        model.set_current(Some(SourcePosition::child(0, 0))).unwrap();
        assert_eq!(view.borrow().expanded_row(), None);
        assert_eq!(view.borrow().current_row(), None);
    }

    #[test]
    fn test_current_row_survives_unrelated_changes() {
        let (mut model, view) = setup(vec![trip("T1", &["a", "b"]), leaf("B")]);
        model.set_current(Some(SourcePosition::child(0, 1))).unwrap();
        assert_eq!(view.borrow().get_row(view.borrow().current_row().unwrap()).unwrap(), "b");

        model.insert_groups(2, vec![leaf("C")]).unwrap();
        model.insert_items(0, 2, vec!["c".to_string()]).unwrap();
        model.move_rows(None, 2, 2, None, 0).unwrap();
        let current = view.borrow().current_row().unwrap();
        assert_eq!(view.borrow().get_row(current).unwrap(), "b");

        // Removing the item clears the current row
        let b = view.borrow().map_to_source(current).unwrap();
        model.remove_items(b.parent.unwrap(), b.row, b.row).unwrap();
        assert_eq!(view.borrow().current_row(), None);
    }

    #[test]
    fn test_unexpand_clears_current() {
        let (mut model, view) = setup(vec![leaf("A"), trip("T", &["x", "y"]), leaf("B")]);
        view.borrow_mut().expand(1);
        model.set_current(Some(SourcePosition::top_level(0))).unwrap();
        assert_eq!(view.borrow().current_row(), Some(4));
        drain(&view);

        view.borrow_mut().unexpand();
        assert_eq!(view.borrow().current_row(), None);
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::RemoveBegin { first: 2, last: 3 },
                ViewChange::RemoveEnd { first: 2, last: 3 },
                ViewChange::CurrentChanged { row: None },
            ]
        );

        // Selecting an item reopens its group; collapsing drops it again
        model.set_current(Some(SourcePosition::child(1, 0))).unwrap();
        assert_eq!(view.borrow().current_row(), Some(3));
        drain(&view);
        view.borrow_mut().unexpand();
        assert_eq!(view.borrow().current_row(), None);
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::RemoveBegin { first: 2, last: 3 },
                ViewChange::RemoveEnd { first: 2, last: 3 },
                ViewChange::CurrentChanged { row: None },
            ]
        );
    }

    #[test]
    fn test_unexpand_empty_group_clears_current() {
        let (mut model, view) = setup(vec![trip("E", &[]), leaf("A")]);
        view.borrow_mut().expand(1);
        model.set_current(Some(SourcePosition::top_level(1))).unwrap();
        drain(&view);

        view.borrow_mut().unexpand();
        assert_eq!(view.borrow().current_row(), None);
        assert_eq!(drain(&view), vec![ViewChange::CurrentChanged { row: None }]);

        // Nothing to report when there was no current row
        view.borrow_mut().expand(1);
        view.borrow_mut().unexpand();
        assert!(drain(&view).is_empty());
    }

    #[test]
    fn test_removing_current_row_is_announced() {
        let (mut model, view) = setup(vec![leaf("A"), trip("T", &["x", "y"]), leaf("B")]);
        model.set_current(Some(SourcePosition::child(1, 1))).unwrap();
        assert_eq!(view.borrow().current_row(), Some(2));
        drain(&view);

        model.remove_items(1, 1, 1).unwrap();
        assert_eq!(view.borrow().current_row(), None);
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::RemoveBegin { first: 2, last: 2 },
                ViewChange::RemoveEnd { first: 2, last: 2 },
                ViewChange::CurrentChanged { row: None },
            ]
        );
    }

    #[test]
    fn test_data_changed_splits_around_children() {
        let (mut model, view) = setup(vec![leaf("A"), trip("T", &["x", "y"]), leaf("B")]);
        view.borrow_mut().expand(1);
        drain(&view);

        model.touch(None, 0, 2).unwrap();
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::DataChanged { first: 0, last: 1 },
                ViewChange::DataChanged { first: 4, last: 4 },
            ]
        );

        model.touch(None, 1, 2).unwrap();
        model.touch(Some(1), 0, 1).unwrap();
        model.update(SourcePosition::top_level(0), "A2".to_string()).unwrap();
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::DataChanged { first: 0, last: 1 },
                ViewChange::DataChanged { first: 2, last: 3 },
                ViewChange::DataChanged { first: 4, last: 4 },
            ]
        );
        assert_eq!(view.borrow().get_row(4).unwrap(), "A2");
    }

    #[test]
    fn test_reset() {
        let (mut model, view) = setup(vec![leaf("A"), trip("T", &["x"])]);
        view.borrow_mut().expand(0);
        model.set_current(Some(SourcePosition::child(1, 0))).unwrap();
        drain(&view);

        model.reset(vec![leaf("Z")]);
        assert_eq!(
            drain(&view),
            vec![
                ViewChange::ResetBegin,
                ViewChange::ResetEnd,
                ViewChange::CurrentChanged { row: None },
            ]
        );
        assert_eq!(view.borrow().expanded_row(), None);
        assert_eq!(view.borrow().current_row(), None);
        assert_eq!(rows(&view), vec!["Z"]);
    }

    #[test]
    fn test_data_fields() {
        let (mut model, view) = setup(vec![leaf("A"), trip("T", &["x"])]);
        view.borrow_mut().expand(0);
        model.set_current(Some(SourcePosition::top_level(0))).unwrap();

        let view = view.borrow();
        assert_eq!(view.data(0, Field::Record).unwrap(), FieldValue::Record("T".to_string()));
        assert_eq!(view.data(0, Field::IsExpanded).unwrap(), FieldValue::Flag(true));
        assert_eq!(view.data(1, Field::IsTopLevel).unwrap(), FieldValue::Flag(false));
        assert_eq!(view.data(2, Field::IsTopLevel).unwrap(), FieldValue::Flag(true));
        assert_eq!(view.data(2, Field::IsCurrent).unwrap(), FieldValue::Flag(true));
        assert_eq!(view.data(0, Field::IsContainer).unwrap(), FieldValue::Flag(true));
        assert_eq!(view.data(1, Field::IsContainer).unwrap(), FieldValue::Flag(false));
        assert_eq!(view.data(2, Field::IsContainer).unwrap(), FieldValue::Flag(false));
        assert!(view.data(3, Field::Record).is_err());
    }

    fn expected_rows(tree: &GroupTree<String>, expanded: Option<usize>) -> Vec<String> {
        let mut rows = Vec::new();
        for (index, group) in tree.groups().iter().enumerate().rev() {
            rows.push(group.record().clone());
            if Some(index) == expanded {
                rows.extend(group.items().iter().rev().cloned());
            }
        }
        rows
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_events_track_the_source(ops in proptest::collection::vec(op_strategy(), 1..30)) {
            let (mut model, view) = setup(sample_groups());
            let tree = model.tree();
            let mut mirror = rows(&view);
            let mut next = 10;

            for op in ops {
                let expanded_before = view.borrow().expanded_group().map(|g| tree.borrow().groups()[g].record().clone());
                let current_before = view.borrow().current_row().map(|r| view.borrow().get_row(r).unwrap());

                match op {
                    Op::Toggle(row) => view.borrow_mut().toggle(row),
                    _ => apply_op(&mut model, &op, &mut next),
                }

                let changes = drain(&view);
                replay(&mut mirror, &changes, &*view.borrow());

                let view_ref = view.borrow();
                let expected = expected_rows(&tree.borrow(), view_ref.expanded_group());
                prop_assert_eq!(&mirror, &expected);

                for row in 0..view_ref.len() {
                    let position = view_ref.map_to_source(row).unwrap();
                    prop_assert_eq!(view_ref.map_from_source(position), Ok(row));
                }
                if let Some(current) = view_ref.current_row() {
                    prop_assert!(current < view_ref.len());
                }

                if op.is_structural() {
                    if let (Some(before), Some(after)) = (expanded_before, view_ref.expanded_group()) {
                        let tree_ref = tree.borrow();
                        prop_assert_eq!(&before, tree_ref.groups()[after].record());
                    }
                    if let (Some(before), Some(after)) = (current_before, view_ref.current_row()) {
                        prop_assert_eq!(before, view_ref.get_row(after).unwrap());
                    }
                }
            }
        }
    }
}
