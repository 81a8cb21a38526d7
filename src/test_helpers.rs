//! Shared test support: replays drained flat changes onto a mirror list the
//! way a presentation layer would, so tests can check that the event stream
//! and the projection agree.

use crate::changeset::{FlatProjection, ViewChange};
use crate::source::SourcePosition;
use crate::tree::{Group, TreeModel};
use proptest::prelude::*;

/// Placeholder for rows announced by an insert; filled in from the view
/// once the batch has been replayed.
const PENDING: &str = "<pending>";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// All records of a view in flat order
pub fn render<V>(view: &V) -> Vec<String>
where
    V: FlatProjection,
    V::Item: ToString,
{
    (0..view.len())
        .map(|row| view.get_row(row).map(|r| r.to_string()).unwrap_or_default())
        .collect()
}

/// Apply one batch of drained changes to `mirror`.
///
/// Rows that survive the batch must keep their identity; rows announced by
/// inserts are read from the view afterwards. Panics on any disagreement.
pub fn replay<V>(mirror: &mut Vec<String>, changes: &[ViewChange], view: &V)
where
    V: FlatProjection,
    V::Item: ToString,
{
    let mut open: Option<ViewChange> = None;
    for change in changes {
        if change.is_begin() {
            assert!(open.is_none(), "nested begin {:?} inside {:?}", change, open);
            open = Some(*change);
            continue;
        }
        match *change {
            ViewChange::ResetEnd => {
                assert_eq!(open, Some(ViewChange::ResetBegin));
                *mirror = vec![PENDING.to_string(); view.len()];
            }
            ViewChange::InsertEnd { first, last } => {
                assert_eq!(open, Some(ViewChange::InsertBegin { first, last }));
                assert!(first <= mirror.len(), "insert at {} beyond {}", first, mirror.len());
                let placeholders = std::iter::repeat(PENDING.to_string()).take(last - first + 1);
                mirror.splice(first..first, placeholders);
            }
            ViewChange::RemoveEnd { first, last } => {
                assert_eq!(open, Some(ViewChange::RemoveBegin { first, last }));
                assert!(last < mirror.len(), "remove {}..={} beyond {}", first, last, mirror.len());
                mirror.drain(first..=last);
            }
            ViewChange::MoveEnd { first, last, dest } => {
                assert_eq!(open, Some(ViewChange::MoveBegin { first, last, dest }));
                assert!(dest < first || dest > last + 1, "degenerate move {:?}", change);
                assert!(last < mirror.len() && dest <= mirror.len());
                if dest < first {
                    mirror[dest..=last].rotate_right(last - first + 1);
                } else {
                    mirror[first..dest].rotate_left(last - first + 1);
                }
            }
            ViewChange::DataChanged { first, last } => {
                assert!(open.is_none());
                assert!(first <= last && last < mirror.len());
                continue;
            }
            ViewChange::CurrentChanged { row } => {
                assert!(open.is_none());
                if let Some(row) = row {
                    assert!(row < mirror.len());
                }
                continue;
            }
            _ => unreachable!("begin events handled above"),
        }
        open = None;
    }
    assert!(open.is_none(), "unbalanced {:?}", open);

    let actual = render(view);
    assert_eq!(mirror.len(), actual.len(), "row count mismatch after {:?}", changes);
    for (row, (seen, expected)) in mirror.iter_mut().zip(actual.iter()).enumerate() {
        if seen == PENDING {
            *seen = expected.clone();
        } else {
            assert_eq!(seen, expected, "row {} lost its identity after {:?}", row, changes);
        }
    }
}

/// One random step for the property tests
#[derive(Debug, Clone)]
pub enum Op {
    InsertGroups { at: usize, n: usize, container: bool },
    RemoveGroups { first: usize, len: usize },
    InsertItems { group: usize, at: usize, n: usize },
    RemoveItems { group: usize, first: usize, len: usize },
    Move { parent: Option<usize>, first: usize, len: usize, dest_parent: Option<usize>, dest_row: usize },
    Toggle(usize),
    Current { parent: Option<usize>, row: usize },
}

impl Op {
    /// Whether the step mutates the tree's structure
    pub fn is_structural(&self) -> bool {
        !matches!(self, Op::Toggle(_) | Op::Current { .. })
    }
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..6usize, 1..3usize, any::<bool>()).prop_map(|(at, n, container)| Op::InsertGroups { at, n, container }),
        (0..6usize, 1..3usize).prop_map(|(first, len)| Op::RemoveGroups { first, len }),
        (0..6usize, 0..4usize, 1..3usize).prop_map(|(group, at, n)| Op::InsertItems { group, at, n }),
        (0..6usize, 0..4usize, 1..3usize).prop_map(|(group, first, len)| Op::RemoveItems { group, first, len }),
        (
            proptest::option::of(0..6usize),
            0..4usize,
            1..3usize,
            proptest::option::of(0..6usize),
            0..6usize
        )
            .prop_map(|(parent, first, len, dest_parent, dest_row)| Op::Move {
                parent,
                first,
                len,
                dest_parent,
                dest_row
            }),
        (0..10usize).prop_map(Op::Toggle),
        (proptest::option::of(0..6usize), 0..4usize).prop_map(|(parent, row)| Op::Current { parent, row }),
    ]
}

/// Starting tree for the property tests; it has a leaf and an empty container
pub fn sample_groups() -> Vec<Group<String>> {
    vec![
        Group::container("c0".to_string(), vec!["i0".to_string(), "i1".to_string()]),
        Group::Leaf("g1".to_string()),
        Group::container("c2".to_string(), vec!["i2".to_string()]),
        Group::container("c3".to_string(), Vec::new()),
    ]
}

/// Run `op` against the model. Requests the model rejects are skipped, and
/// `Toggle` is left to the caller. `next` numbers fresh records.
pub fn apply_op(model: &mut TreeModel<String>, op: &Op, next: &mut usize) {
    let mut fresh = |prefix: &str| {
        *next += 1;
        format!("{}{}", prefix, next)
    };
    let _ = match *op {
        Op::InsertGroups { at, n, container } => {
            let groups = (0..n)
                .map(|_| {
                    if container {
                        let record = fresh("c");
                        Group::container(record, vec![fresh("i")])
                    } else {
                        Group::Leaf(fresh("g"))
                    }
                })
                .collect();
            model.insert_groups(at, groups)
        }
        Op::RemoveGroups { first, len } => model.remove_groups(first, first + len - 1),
        Op::InsertItems { group, at, n } => {
            let items = (0..n).map(|_| fresh("i")).collect();
            model.insert_items(group, at, items)
        }
        Op::RemoveItems { group, first, len } => model.remove_items(group, first, first + len - 1),
        Op::Move {
            parent,
            first,
            len,
            dest_parent,
            dest_row,
        } => model.move_rows(parent, first, first + len - 1, dest_parent, dest_row),
        Op::Toggle(_) => Ok(()),
        Op::Current { parent, row } => model.set_current(Some(SourcePosition { parent, row })),
    };
}
