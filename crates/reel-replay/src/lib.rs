//! Replay recording and playback for deterministic emulation.
//!
//! Records per-frame key and input events into an append-only log, with
//! periodic checkpoints of the full emulator state. Checkpoints are
//! deduplicated against a content-addressable block store so that long
//! replays and frame-by-frame rewind stay cheap.
//!
//! # Architecture
//!
//! - [`ReplaySession`] is the host-facing state machine: begin, advance,
//!   rewind, snapshot save/load
//! - [`StateStream`] encodes and decodes checkpoints as token streams over
//!   a pair of [`BlockStore`](reel_store::BlockStore)s
//! - [`codec`] holds the binary layout of headers, frames and checkpoints
//! - [`LogWriter`] and [`LogReader`] stream frames for tooling, in any
//!   layout version
//! - [`same_timeline`] checks whether one log is a structural prefix of
//!   another
//!
//! # Format
//!
//! ```text
//! [Header: 10 × u32] [Initial checkpoint]
//! [Frame 1] [Frame 2] ... [Frame N]
//!
//! Frame (v2) = backref u32 · key count u8 · keys · input count u16 ·
//!              inputs · tag u8 · [checkpoint]
//! ```
//!
//! All integers are little-endian.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod compression;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reader;
pub mod session;
pub mod statestream;
pub mod timeline;
pub mod types;
pub mod writer;

pub use compression::{Compression, Encoding};
pub use config::{ConfigError, ReplayConfig};
pub use error::{Incompatibility, ReplayError, SchemeKind};
pub use metrics::{CheckpointStats, CodecMetrics, CodecStats, NoopMetrics};
pub use reader::{FrameIter, LogReader};
pub use session::{Advance, Mode, ReplaySession, SnapshotLoad};
pub use statestream::StateStream;
pub use timeline::same_timeline;
pub use types::{Checkpoint, EncodedCheckpoint, Frame, LogHeader};
pub use writer::LogWriter;

/// Magic bytes at the start of every replay log.
pub const MAGIC: [u8; 4] = *b"REEL";

/// Current layout version.
///
/// History:
/// - v0: frames carry key events only; short header; raw initial state
/// - v1: adds the per-frame input-event section
/// - v2: adds the per-frame backref, the long header (frame counter and
///   block geometry) and an encoded initial checkpoint
pub const FORMAT_VERSION: u32 = 2;
