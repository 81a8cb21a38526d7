/// LiveList - Incremental Flat Projections of a Two-Level Tree
///
/// A source holds groups oldest-first, some of them containers of items.
/// List views want a single flat, newest-first sequence of rows. The
/// projections in this crate maintain that sequence incrementally: every
/// source mutation is translated into flat row notifications, without
/// rebuilding and with O(groups) shadow state at most.

pub mod rows;
pub mod changeset;
pub mod offsets;
pub mod source;
pub mod tree;
pub mod expandable;
pub mod flatten;
pub mod config;
pub mod error;

#[cfg(test)]
mod test_helpers;

pub use rows::{invert, invert_range, IndexRange};
pub use changeset::{Changeset, FlatProjection, IndexAdjuster, ViewChange};
pub use offsets::OffsetTable;
pub use source::{HierarchicalSource, SourceChange, SourceObserver, SourcePosition};
pub use tree::{Group, GroupTree, TreeModel};
pub use expandable::{ExpandableProjection, Field, FieldValue};
pub use flatten::FullFlattenProjection;
pub use config::ViewConfig;
pub use error::{Error, Result};
