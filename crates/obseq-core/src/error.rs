use thiserror::Error;

/// Usage errors surfaced by the collection API.
///
/// Every variant is a fail-fast contract violation: the offending operation
/// validates before it splices, so an `Err` means nothing was applied and
/// nothing was notified. Expected runtime conditions (a change that has no
/// flat projection, a parent that has been dropped) are never errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeqError {
    #[error("path is empty")]
    EmptyPath,
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("range {start}..{end} out of bounds for length {len}")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
    #[error("element at index {index} is not a nested collection")]
    NotANode { index: usize },
    #[error("a collection cannot contain itself")]
    SelfInsertion,
    #[error("end_transaction without a matching begin_transaction")]
    UnbalancedTransaction,
    #[error("collection is already closed")]
    AlreadyClosed,
}
