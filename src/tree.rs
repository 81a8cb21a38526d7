/// LiveList Tree Implementation
///
/// An in-memory two-level tree that implements [`HierarchicalSource`], and
/// [`TreeModel`], which owns such a tree together with its observers and
/// brackets every mutation with notifications.
use crate::error::{Error, Result};
use crate::source::{HierarchicalSource, SourceChange, SourceObserver, SourcePosition};
use std::cell::RefCell;
use std::rc::Rc;

/// A top-level entry: either a single record or a record with items
#[derive(Debug, Clone, PartialEq)]
pub enum Group<T> {
    Leaf(T),
    Container { record: T, items: Vec<T> },
}

impl<T> Group<T> {
    pub fn container(record: T, items: Vec<T>) -> Self {
        Group::Container { record, items }
    }

    pub fn record(&self) -> &T {
        match self {
            Group::Leaf(record) => record,
            Group::Container { record, .. } => record,
        }
    }

    pub fn items(&self) -> &[T] {
        match self {
            Group::Leaf(_) => &[],
            Group::Container { items, .. } => items,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Group::Container { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupTree<T> {
    groups: Vec<Group<T>>,
}

impl<T> GroupTree<T> {
    pub fn new(groups: Vec<Group<T>>) -> Self {
        GroupTree { groups }
    }

    pub fn groups(&self) -> &[Group<T>] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Option<&Group<T>> {
        self.groups.get(index)
    }

    fn check_group(&self, group: usize) -> Result<()> {
        if group >= self.groups.len() {
            return Err(Error::GroupOutOfRange {
                group,
                len: self.groups.len(),
            });
        }
        Ok(())
    }

    fn items_mut(&mut self, group: usize) -> Result<&mut Vec<T>> {
        self.check_group(group)?;
        match &mut self.groups[group] {
            Group::Container { items, .. } => Ok(items),
            Group::Leaf(_) => Err(Error::NotAContainer(group)),
        }
    }

    fn len_under(&self, parent: Option<usize>) -> Result<usize> {
        match parent {
            None => Ok(self.groups.len()),
            Some(group) => {
                self.check_group(group)?;
                match &self.groups[group] {
                    Group::Container { items, .. } => Ok(items.len()),
                    Group::Leaf(_) => Err(Error::NotAContainer(group)),
                }
            }
        }
    }

    /// Remove rows `first..=last` under `parent` as plain records
    fn take_records(&mut self, parent: Option<usize>, first: usize, last: usize) -> Result<Vec<T>> {
        match parent {
            None => Ok(self
                .groups
                .drain(first..=last)
                .map(|group| match group {
                    Group::Leaf(record) => record,
                    Group::Container { record, .. } => record,
                })
                .collect()),
            Some(group) => Ok(self.items_mut(group)?.drain(first..=last).collect()),
        }
    }
}

impl<T: Clone> HierarchicalSource for GroupTree<T> {
    type Item = T;

    fn top_level_count(&self) -> usize {
        self.groups.len()
    }

    fn child_count(&self, group: usize) -> usize {
        self.groups.get(group).map_or(0, |g| g.items().len())
    }

    fn is_container(&self, group: usize) -> bool {
        self.groups.get(group).is_some_and(Group::is_container)
    }

    fn read(&self, position: SourcePosition) -> Option<T> {
        match position.parent {
            None => self.groups.get(position.row).map(|g| g.record().clone()),
            Some(group) => self.groups.get(group)?.items().get(position.row).cloned(),
        }
    }
}

/// A tree plus the observers that must hear about its mutations.
///
/// The tree sits behind `Rc<RefCell<_>>` so observers can read it while they
/// are being notified. No borrow of the tree is held across a notification.
///
/// # Examples
///
/// ```
/// use livelist::{Group, TreeModel, HierarchicalSource};
///
/// let mut model = TreeModel::new(vec![
///     Group::Leaf("A"),
///     Group::container("T", vec!["x", "y"]),
/// ]);
/// model.insert_groups(2, vec![Group::Leaf("B")]).unwrap();
///
/// let tree = model.tree();
/// assert_eq!(tree.borrow().top_level_count(), 3);
/// assert_eq!(tree.borrow().child_count(1), 2);
/// ```
pub struct TreeModel<T> {
    tree: Rc<RefCell<GroupTree<T>>>,
    observers: Vec<Rc<RefCell<dyn SourceObserver>>>,
    current: Option<SourcePosition>,
}

impl<T: Clone> TreeModel<T> {
    pub fn new(groups: Vec<Group<T>>) -> Self {
        TreeModel {
            tree: Rc::new(RefCell::new(GroupTree::new(groups))),
            observers: Vec::new(),
            current: None,
        }
    }

    /// Shared handle to the tree, for constructing projections
    pub fn tree(&self) -> Rc<RefCell<GroupTree<T>>> {
        self.tree.clone()
    }

    /// Register an observer. Observers are notified in registration order.
    pub fn subscribe(&mut self, observer: Rc<RefCell<dyn SourceObserver>>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// The position last passed to `set_current`. Structural mutations do
    /// not renumber it; a reset clears it.
    pub fn current(&self) -> Option<SourcePosition> {
        self.current
    }

    fn notify_before(&self, change: &SourceChange) {
        for observer in &self.observers {
            observer.borrow_mut().about_to_change(change);
        }
    }

    fn notify_after(&self, change: &SourceChange) {
        for observer in &self.observers {
            observer.borrow_mut().did_change(change);
        }
    }

    /// Replace the whole tree
    pub fn reset(&mut self, groups: Vec<Group<T>>) {
        let change = SourceChange::Reset;
        self.notify_before(&change);
        self.tree.borrow_mut().groups = groups;
        self.current = None;
        self.notify_after(&change);
    }

    /// Insert top-level groups before group `at`
    pub fn insert_groups(&mut self, at: usize, groups: Vec<Group<T>>) -> Result<()> {
        let len = self.tree.borrow().groups.len();
        if at > len {
            return Err(Error::GroupOutOfRange { group: at, len });
        }
        if groups.is_empty() {
            return Ok(());
        }
        let change = SourceChange::Insert {
            parent: None,
            first: at,
            last: at + groups.len() - 1,
        };
        self.notify_before(&change);
        self.tree.borrow_mut().groups.splice(at..at, groups);
        self.notify_after(&change);
        Ok(())
    }

    /// Remove top-level groups `first..=last`
    pub fn remove_groups(&mut self, first: usize, last: usize) -> Result<()> {
        let len = self.tree.borrow().groups.len();
        check_range(first, last, len)?;
        let change = SourceChange::Remove {
            parent: None,
            first,
            last,
        };
        self.notify_before(&change);
        self.tree.borrow_mut().groups.drain(first..=last);
        self.notify_after(&change);
        Ok(())
    }

    /// Insert items into container `group` before item `at`
    pub fn insert_items(&mut self, group: usize, at: usize, items: Vec<T>) -> Result<()> {
        let len = self.tree.borrow().len_under(Some(group))?;
        if at > len {
            return Err(Error::RowOutOfRange { row: at, len });
        }
        if items.is_empty() {
            return Ok(());
        }
        let change = SourceChange::Insert {
            parent: Some(group),
            first: at,
            last: at + items.len() - 1,
        };
        self.notify_before(&change);
        self.tree.borrow_mut().items_mut(group)?.splice(at..at, items);
        self.notify_after(&change);
        Ok(())
    }

    /// Remove items `first..=last` from container `group`
    pub fn remove_items(&mut self, group: usize, first: usize, last: usize) -> Result<()> {
        let len = self.tree.borrow().len_under(Some(group))?;
        check_range(first, last, len)?;
        let change = SourceChange::Remove {
            parent: Some(group),
            first,
            last,
        };
        self.notify_before(&change);
        self.tree.borrow_mut().items_mut(group)?.drain(first..=last);
        self.notify_after(&change);
        Ok(())
    }

    /// Move rows `first..=last` of `parent` under `dest_parent`, before its
    /// row `dest_row` (pre-move numbering).
    ///
    /// Items moved to the top level become leaves; leaves moved into a
    /// container become items. Containers cannot be moved into a container.
    pub fn move_rows(
        &mut self,
        parent: Option<usize>,
        first: usize,
        last: usize,
        dest_parent: Option<usize>,
        dest_row: usize,
    ) -> Result<()> {
        {
            let tree = self.tree.borrow();
            check_range(first, last, tree.len_under(parent)?)?;
            let dest_len = tree.len_under(dest_parent)?;
            if dest_row > dest_len {
                return Err(Error::RowOutOfRange {
                    row: dest_row,
                    len: dest_len,
                });
            }
            if parent == dest_parent && (first..=last + 1).contains(&dest_row) {
                return Err(Error::InvalidMove(format!(
                    "rows {}..={} cannot move before row {} of the same parent",
                    first, last, dest_row
                )));
            }
            if let (None, Some(dest)) = (parent, dest_parent) {
                if (first..=last).contains(&dest) {
                    return Err(Error::InvalidMove(format!("group {} cannot move into itself", dest)));
                }
                if (first..=last).any(|g| tree.groups[g].is_container()) {
                    return Err(Error::InvalidMove("containers cannot be nested".to_string()));
                }
            }
        }

        let change = SourceChange::Move {
            parent,
            first,
            last,
            dest_parent,
            dest_row,
        };
        self.notify_before(&change);
        {
            let mut tree = self.tree.borrow_mut();
            let count = last - first + 1;
            // Positions after the taken rows shift when both live in the same list
            let mut dest_row = dest_row;
            if parent == dest_parent && dest_row > last {
                dest_row -= count;
            }
            // Removing top-level groups shifts the destination group's index
            let dest_parent = match (parent, dest_parent) {
                (None, Some(dest)) if dest > last => Some(dest - count),
                _ => dest_parent,
            };
            if parent.is_none() && dest_parent.is_none() {
                // Reordering groups keeps them whole
                let groups: Vec<Group<T>> = tree.groups.drain(first..=last).collect();
                tree.groups.splice(dest_row..dest_row, groups);
            } else {
                let records = tree.take_records(parent, first, last)?;
                match dest_parent {
                    None => {
                        let groups: Vec<Group<T>> = records.into_iter().map(Group::Leaf).collect();
                        tree.groups.splice(dest_row..dest_row, groups);
                    }
                    Some(dest) => {
                        tree.items_mut(dest)?.splice(dest_row..dest_row, records);
                    }
                }
            }
        }
        self.notify_after(&change);
        Ok(())
    }

    /// Replace the record at `position` and report the content change
    pub fn update(&mut self, position: SourcePosition, record: T) -> Result<()> {
        {
            let mut tree = self.tree.borrow_mut();
            let len = tree.len_under(position.parent)?;
            if position.row >= len {
                return Err(Error::RowOutOfRange { row: position.row, len });
            }
            match position.parent {
                None => match &mut tree.groups[position.row] {
                    Group::Leaf(existing) => *existing = record,
                    Group::Container { record: existing, .. } => *existing = record,
                },
                Some(group) => tree.items_mut(group)?[position.row] = record,
            }
        }
        for observer in &self.observers {
            observer.borrow_mut().data_changed(position, position);
        }
        Ok(())
    }

    /// Report that rows `first..=last` under `parent` changed content
    pub fn touch(&mut self, parent: Option<usize>, first: usize, last: usize) -> Result<()> {
        check_range(first, last, self.tree.borrow().len_under(parent)?)?;
        let top_left = SourcePosition { parent, row: first };
        let bottom_right = SourcePosition { parent, row: last };
        for observer in &self.observers {
            observer.borrow_mut().data_changed(top_left, bottom_right);
        }
        Ok(())
    }

    /// Select a source row, or clear the selection
    pub fn set_current(&mut self, current: Option<SourcePosition>) -> Result<()> {
        if let Some(position) = current {
            let len = self.tree.borrow().len_under(position.parent)?;
            if position.row >= len {
                return Err(Error::RowOutOfRange { row: position.row, len });
            }
        }
        self.current = current;
        for observer in &self.observers {
            observer.borrow_mut().current_changed(current);
        }
        Ok(())
    }
}

fn check_range(first: usize, last: usize, len: usize) -> Result<()> {
    if first > last {
        return Err(Error::InvalidMove(format!("empty range {}..={}", first, last)));
    }
    if last >= len {
        return Err(Error::RowOutOfRange { row: last, len });
    }
    Ok(())
}
