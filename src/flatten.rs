/// Full-flatten projection of a two-level source.
///
/// Every item of every group is shown, groups newest first and items newest
/// first within their group. A plain leaf group contributes its own record
/// as a single row; a container contributes its items only.
///
/// Row lookup goes through an [`OffsetTable`] holding the flat start of
/// each group, so the projection keeps O(groups) state regardless of how
/// many items the source holds.
use crate::changeset::{Changeset, FlatProjection, ViewChange};
use crate::config::ViewConfig;
use crate::error::{Error, Result};
use crate::expandable::{Field, FieldValue};
use crate::offsets::OffsetTable;
use crate::rows::{insertion_point, invert, invert_range};
use crate::source::{HierarchicalSource, SourceChange, SourceObserver, SourcePosition};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Last row resolved by `map_to_source`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheEntry {
    row: usize,
    position: SourcePosition,
}

/// Offset table update that completes a move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableMove {
    /// Top-level groups reordered
    Groups {
        first_slot: usize,
        last_slot: usize,
        dest_slot: usize,
    },
    /// Top-level leaves became items of the group at `dest_slot`
    IntoGroup {
        first_slot: usize,
        last_slot: usize,
        dest_slot: usize,
        count: usize,
    },
    /// Items of the group at `slot` became top-level leaves
    OutOfGroup { slot: usize, count: usize, dest_slot: usize },
    /// Items changed group
    Across { slot: usize, dest_slot: usize, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Reset,
    /// Widths of new groups are only known once they exist
    InsertGroups { first: usize, count: usize },
    RemoveGroups {
        first_slot: usize,
        last_slot: usize,
        rows: Option<(usize, usize)>,
    },
    Resize { slot: usize, delta: isize, end: Option<ViewChange> },
    Move { table: TableMove, end: Option<ViewChange> },
}

/// Every item of every group as one flat list, newest first
///
/// # Examples
///
/// ```
/// use livelist::{FlatProjection, FullFlattenProjection, Group, TreeModel};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let mut model = TreeModel::new(vec![
///     Group::Leaf("A"),
///     Group::container("T", vec!["x", "y", "z"]),
///     Group::container("U", vec!["p", "q"]),
/// ]);
/// let view = Rc::new(RefCell::new(FullFlattenProjection::new(model.tree())));
/// model.subscribe(view.clone());
///
/// assert_eq!(view.borrow().offsets().offsets(), &[0, 2, 5]);
/// assert_eq!(view.borrow().get_row(0).unwrap(), "q");
///
/// model.insert_items(1, 3, vec!["u", "v"]).unwrap();
/// assert_eq!(view.borrow().offsets().offsets(), &[0, 2, 7]);
/// assert_eq!(view.borrow().len(), 8);
/// ```
pub struct FullFlattenProjection<S: HierarchicalSource> {
    source: Rc<RefCell<S>>,
    config: ViewConfig,
    offsets: OffsetTable,
    cache: Cell<Option<CacheEntry>>,
    changeset: Changeset,
    pending: Option<Plan>,
}

/// Rows a group contributes: its items if it is a container, else itself
fn group_width<S: HierarchicalSource>(source: &S, group: usize) -> usize {
    if source.is_container(group) {
        source.child_count(group)
    } else {
        1
    }
}

impl<S: HierarchicalSource> FullFlattenProjection<S> {
    pub fn new(source: Rc<RefCell<S>>) -> Self {
        Self::with_config(source, ViewConfig::default())
    }

    pub fn with_config(source: Rc<RefCell<S>>, config: ViewConfig) -> Self {
        let mut projection = FullFlattenProjection {
            source,
            config,
            offsets: OffsetTable::new(),
            cache: Cell::new(None),
            changeset: Changeset::new(),
            pending: None,
        };
        projection.rebuild();
        projection
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// Recompute the offset table with one scan over the groups
    fn rebuild(&mut self) {
        let source = self.source.borrow();
        let count = source.top_level_count();
        self.offsets
            .rebuild((0..count).rev().map(|group| group_width(&*source, group)));
        self.cache.set(None);
    }

    fn top_count(&self) -> usize {
        self.source.borrow().top_level_count()
    }

    /// Flat rows of slots `first_slot..=last_slot`, None when they are all empty
    fn slot_rows(&self, first_slot: usize, last_slot: usize) -> Option<(usize, usize)> {
        let start = self.offsets.offset(first_slot);
        let end = self.offsets.offset(last_slot + 1);
        (end > start).then(|| (start, end - 1))
    }

    /// Flat rows of items `first..=last` of `group`, pre-change numbering
    fn item_rows(&self, group: usize, first: usize, last: usize) -> (usize, usize) {
        let source = self.source.borrow();
        let slot = invert(group, source.top_level_count());
        let (lo, hi) = invert_range(first, last, source.child_count(group));
        let start = self.offsets.offset(slot);
        (start + lo, start + hi)
    }

    /// Flat row before which rows moved to `dest_row` of `dest_parent` land
    fn destination_row(&self, dest_parent: Option<usize>, dest_row: usize) -> usize {
        let source = self.source.borrow();
        let count = source.top_level_count();
        match dest_parent {
            None => self.offsets.offset(insertion_point(dest_row, count)),
            Some(group) => {
                let start = self.offsets.offset(invert(group, count));
                start + insertion_point(dest_row, source.child_count(group))
            }
        }
    }

    /// Push `begin` and hand back the event that will close it
    fn open(&mut self, begin: ViewChange) -> Option<ViewChange> {
        self.changeset.push(begin);
        begin.end_event()
    }

    fn prepare_remove(&mut self, parent: Option<usize>, first: usize, last: usize, count: usize) -> Plan {
        match parent {
            None => {
                let (first_slot, last_slot) = invert_range(first, last, self.top_count());
                let rows = self.slot_rows(first_slot, last_slot);
                if let Some((lo, hi)) = rows {
                    self.changeset.push(ViewChange::RemoveBegin { first: lo, last: hi });
                }
                Plan::RemoveGroups {
                    first_slot,
                    last_slot,
                    rows,
                }
            }
            Some(group) => {
                let slot = invert(group, self.top_count());
                let (lo, hi) = self.item_rows(group, first, last);
                let end = self.open(ViewChange::RemoveBegin { first: lo, last: hi });
                Plan::Resize {
                    slot,
                    delta: -(count as isize),
                    end,
                }
            }
        }
    }

    fn prepare_insert(&mut self, parent: Option<usize>, first: usize, count: usize) -> Plan {
        match parent {
            // Nothing can be announced before the new groups exist
            None => Plan::InsertGroups { first, count },
            Some(group) => {
                let source = self.source.borrow();
                if !source.is_container(group) {
                    log::warn!("FullFlattenProjection: inserting items into leaf group {}", group);
                }
                let slot = invert(group, source.top_level_count());
                let lo = self.offsets.offset(slot) + insertion_point(first, source.child_count(group));
                let hi = lo + count - 1;
                drop(source);
                let end = self.open(ViewChange::InsertBegin { first: lo, last: hi });
                Plan::Resize {
                    slot,
                    delta: count as isize,
                    end,
                }
            }
        }
    }

    fn prepare_move(
        &mut self,
        parent: Option<usize>,
        first: usize,
        last: usize,
        dest_parent: Option<usize>,
        dest_row: usize,
        count: usize,
    ) -> Plan {
        let top = self.top_count();
        let (table, rows) = match (parent, dest_parent) {
            (None, None) => {
                let (first_slot, last_slot) = invert_range(first, last, top);
                let table = TableMove::Groups {
                    first_slot,
                    last_slot,
                    dest_slot: insertion_point(dest_row, top),
                };
                (table, self.slot_rows(first_slot, last_slot))
            }
            (None, Some(dest)) => {
                let source = self.source.borrow();
                if (first..=last).any(|g| source.is_container(g)) {
                    log::warn!("FullFlattenProjection: moving groups {}..={} into a group", first, last);
                }
                drop(source);
                let (first_slot, last_slot) = invert_range(first, last, top);
                let table = TableMove::IntoGroup {
                    first_slot,
                    last_slot,
                    dest_slot: invert(dest, top),
                    count,
                };
                (table, self.slot_rows(first_slot, last_slot))
            }
            (Some(group), None) => {
                let table = TableMove::OutOfGroup {
                    slot: invert(group, top),
                    count,
                    dest_slot: insertion_point(dest_row, top),
                };
                (table, Some(self.item_rows(group, first, last)))
            }
            (Some(group), Some(dest)) => {
                let table = TableMove::Across {
                    slot: invert(group, top),
                    dest_slot: invert(dest, top),
                    count,
                };
                (table, Some(self.item_rows(group, first, last)))
            }
        };

        let dest = self.destination_row(dest_parent, dest_row);
        let end = match rows {
            Some((lo, hi)) if !(lo..=hi + 1).contains(&dest) => self.open(ViewChange::MoveBegin {
                first: lo,
                last: hi,
                dest,
            }),
            _ => {
                log::debug!("FullFlattenProjection: move leaves flat order unchanged");
                None
            }
        };
        Plan::Move { table, end }
    }

    fn finish_insert_groups(&mut self, first: usize, count: usize) {
        let top = self.top_count();
        let Some(top_before) = top.checked_sub(count) else {
            log::warn!("FullFlattenProjection: {} groups inserted into {}", count, top);
            self.rebuild();
            return;
        };
        let first_slot = insertion_point(first, top_before);
        let widths: Vec<usize> = {
            let source = self.source.borrow();
            (first_slot..first_slot + count)
                .map(|slot| group_width(&*source, invert(slot, top)))
                .collect()
        };
        let start = self.offsets.offset(first_slot);
        let added = self.offsets.insert_slots(first_slot, &widths);
        if added > 0 {
            let last = start + added - 1;
            self.changeset.push(ViewChange::InsertBegin { first: start, last });
            self.changeset.push(ViewChange::InsertEnd { first: start, last });
        }
    }

    fn finish_move(&mut self, table: TableMove) {
        match table {
            TableMove::Groups {
                first_slot,
                last_slot,
                dest_slot,
            } => {
                let widths = self.offsets.remove_slots(first_slot, last_slot);
                let dest_slot = if dest_slot > last_slot {
                    dest_slot - widths.len()
                } else {
                    dest_slot
                };
                self.offsets.insert_slots(dest_slot, &widths);
            }
            TableMove::IntoGroup {
                first_slot,
                last_slot,
                dest_slot,
                count,
            } => {
                self.offsets.remove_slots(first_slot, last_slot);
                let dest_slot = if dest_slot > last_slot {
                    dest_slot - count
                } else {
                    dest_slot
                };
                self.offsets.resize_slot(dest_slot, count as isize);
            }
            TableMove::OutOfGroup { slot, count, dest_slot } => {
                self.offsets.resize_slot(slot, -(count as isize));
                self.offsets.insert_slots(dest_slot, &vec![1; count]);
            }
            TableMove::Across { slot, dest_slot, count } => {
                if slot != dest_slot {
                    self.offsets.resize_slot(slot, -(count as isize));
                    self.offsets.resize_slot(dest_slot, count as isize);
                }
            }
        }
    }

    fn execute(&mut self, plan: Plan) {
        match plan {
            Plan::Reset => {
                self.rebuild();
                self.changeset.push(ViewChange::ResetEnd);
            }
            Plan::InsertGroups { first, count } => self.finish_insert_groups(first, count),
            Plan::RemoveGroups {
                first_slot,
                last_slot,
                rows,
            } => {
                self.offsets.remove_slots(first_slot, last_slot);
                if let Some((first, last)) = rows {
                    self.changeset.push(ViewChange::RemoveEnd { first, last });
                }
            }
            Plan::Resize { slot, delta, end } => {
                self.offsets.resize_slot(slot, delta);
                if let Some(end) = end {
                    self.changeset.push(end);
                }
            }
            Plan::Move { table, end } => {
                self.finish_move(table);
                if let Some(end) = end {
                    self.changeset.push(end);
                }
            }
        }
        debug_assert!(self.offsets.is_consistent());
    }

    /// Forward a content change of source rows `top_left..=bottom_right`
    pub fn on_data_changed(&mut self, top_left: SourcePosition, bottom_right: SourcePosition) {
        if top_left.parent != bottom_right.parent || top_left.row > bottom_right.row {
            log::warn!(
                "FullFlattenProjection: malformed change range {:?}..{:?}",
                top_left,
                bottom_right
            );
            return;
        }
        let rows = match top_left.parent {
            None => {
                let top = self.top_count();
                if bottom_right.row >= top {
                    return;
                }
                let (first_slot, last_slot) = invert_range(top_left.row, bottom_right.row, top);
                self.slot_rows(first_slot, last_slot)
            }
            Some(_) => match (self.map_from_source(bottom_right), self.map_from_source(top_left)) {
                (Ok(first), Ok(last)) => Some((first, last)),
                _ => None,
            },
        };
        if let Some((first, last)) = rows {
            self.changeset.push(ViewChange::DataChanged { first, last });
        }
    }

    /// Value of `field` for flat `row`. Nothing is ever expanded or current
    /// in this projection, and containers have no row of their own.
    pub fn data(&self, row: usize, field: Field) -> Result<FieldValue<S::Item>> {
        Ok(match field {
            Field::Record => FieldValue::Record(self.get_row(row)?),
            Field::IsTopLevel => FieldValue::Flag(self.map_to_source(row)?.is_top_level()),
            Field::IsContainer => {
                let position = self.map_to_source(row)?;
                FieldValue::Flag(position.is_top_level() && self.source.borrow().is_container(position.row))
            }
            Field::IsExpanded | Field::IsCurrent => {
                self.map_to_source(row)?;
                FieldValue::Flag(false)
            }
        })
    }
}

impl<S: HierarchicalSource> FlatProjection for FullFlattenProjection<S> {
    type Item = S::Item;

    fn len(&self) -> usize {
        self.offsets.total()
    }

    fn map_to_source(&self, row: usize) -> Result<SourcePosition> {
        if self.config.lookup_cache {
            if let Some(entry) = self.cache.get().filter(|entry| entry.row == row) {
                log::trace!("FullFlattenProjection: cache hit for row {}", row);
                return Ok(entry.position);
            }
        }
        let (slot, remainder) = self.offsets.find(row).ok_or(Error::RowOutOfRange {
            row,
            len: self.offsets.total(),
        })?;
        let source = self.source.borrow();
        let group = invert(slot, source.top_level_count());
        let position = if remainder != 0 || source.is_container(group) {
            SourcePosition::child(group, invert(remainder, source.child_count(group)))
        } else {
            SourcePosition::top_level(group)
        };
        if self.config.lookup_cache {
            self.cache.set(Some(CacheEntry { row, position }));
        }
        Ok(position)
    }

    fn map_from_source(&self, position: SourcePosition) -> Result<usize> {
        let source = self.source.borrow();
        let top = source.top_level_count();
        match position.parent {
            None => {
                if position.row >= top {
                    return Err(Error::GroupOutOfRange {
                        group: position.row,
                        len: top,
                    });
                }
                Ok(self.offsets.offset(invert(position.row, top)))
            }
            Some(group) => {
                if group >= top {
                    return Err(Error::GroupOutOfRange { group, len: top });
                }
                let count = source.child_count(group);
                if position.row >= count {
                    return Err(Error::RowOutOfRange {
                        row: position.row,
                        len: count,
                    });
                }
                Ok(self.offsets.offset(invert(group, top)) + invert(position.row, count))
            }
        }
    }

    fn get_row(&self, row: usize) -> Result<S::Item> {
        let position = self.map_to_source(row)?;
        self.source.borrow().read(position).ok_or(Error::RowOutOfRange {
            row,
            len: self.offsets.total(),
        })
    }

    fn changeset(&self) -> &Changeset {
        &self.changeset
    }

    fn drain_changes(&mut self) -> Vec<ViewChange> {
        self.changeset.drain()
    }
}

impl<S: HierarchicalSource> SourceObserver for FullFlattenProjection<S> {
    fn about_to_change(&mut self, change: &SourceChange) {
        if let Some(plan) = self.pending.take() {
            log::warn!("FullFlattenProjection: {:?} still pending, finishing it early", plan);
            self.execute(plan);
        }
        self.cache.set(None);
        let plan = match *change {
            SourceChange::Reset => {
                self.changeset.push(ViewChange::ResetBegin);
                Plan::Reset
            }
            SourceChange::Remove { parent, first, last } => self.prepare_remove(parent, first, last, change.count()),
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
        self.cache.set(None);
        match self.pending.take() {
            Some(plan) => self.execute(plan),
            None => {
                log::warn!("FullFlattenProjection: {:?} finished without being announced", change);
                self.rebuild();
            }
        }
    }

    fn data_changed(&mut self, top_left: SourcePosition, bottom_right: SourcePosition) {
        self.on_data_changed(top_left, bottom_right);
    }
}
