/// Error types for LiveList
///
/// Mapping and lookup functions return these. Contract violations raised
/// from inside notification handlers are logged instead, because a source
/// notification has nobody to return an error to.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("row {row} out of range [0, {len})")]
    RowOutOfRange { row: usize, len: usize },

    #[error("group {group} out of range [0, {len})")]
    GroupOutOfRange { group: usize, len: usize },

    #[error("group {0} is not a container")]
    NotAContainer(usize),

    #[error("group {group} is not expanded")]
    NotExpanded { group: usize },

    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
