//! Content-addressable block store for Reel checkpoints.
//!
//! Maps fixed-size objects to stable integer indices, deduplicating by a
//! 32-bit content hash confirmed with exact comparison. Two stores are
//! used per session: one of `u8` blocks and one of `u32` superblocks
//! (arrays of block indices).
//!
//! # Architecture
//!
//! ```text
//! BlockStore<T>
//! ├── entries: Vec<Entry>            (arena, index = position, append-only)
//! ├── buckets: hash → [index; ≤3 inline]
//! └── additions: [(frame, first index)]  (monotonic undo stack)
//! ```
//!
//! Index 0 is the all-zero object and is never removed. Rolling back to a
//! frame truncates the arena to the first index recorded for the oldest
//! newer frame.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod hash;
pub mod store;

pub use error::StoreError;
pub use hash::{content_hash, Element};
pub use store::{AdditionRecord, BlockStore, Inserted};

/// Index of the reserved all-zero object in every store.
pub const ZERO_INDEX: u32 = 0;
