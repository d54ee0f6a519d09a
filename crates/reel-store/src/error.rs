//! Store-specific error types.

/// Errors from [`BlockStore`](crate::BlockStore) operations that take
/// externally supplied indices.
///
/// All of these indicate a corrupt or out-of-sync checkpoint stream when
/// they surface during decode.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// `insert_exact` was asked for an index other than the next free slot.
    #[error("index mismatch: expected next index {expected}, got {found}")]
    IndexMismatch {
        /// The next free index.
        expected: u32,
        /// The index supplied by the caller.
        found: u32,
    },
    /// `insert_exact` was given content the store already holds.
    #[error("content for index {index} already stored at index {existing}")]
    DuplicateContent {
        /// The index the caller tried to insert at.
        index: u32,
        /// Where the identical content already lives.
        existing: u32,
    },
    /// An object's length differs from the store's object size.
    #[error("object has {found} elements, store holds {expected}-element objects")]
    SizeMismatch {
        /// The store's fixed object size.
        expected: usize,
        /// The supplied object's length.
        found: usize,
    },
}
