//! Reel: deterministic replay recording for emulators.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Reel sub-crates. For most users, adding `reel` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::io::Cursor;
//! use reel::prelude::*;
//!
//! struct Core(Vec<u8>);
//! impl StateCore for Core {
//!     fn serialize_size(&self) -> usize { self.0.len() }
//!     fn serialize(&mut self, buf: &mut [u8]) -> Option<usize> {
//!         buf[..self.0.len()].copy_from_slice(&self.0);
//!         Some(self.0.len())
//!     }
//!     fn deserialize(&mut self, buf: &[u8]) -> bool {
//!         self.0 = buf.to_vec();
//!         true
//!     }
//! }
//!
//! let config = ReplayConfig::new(60);
//! let mut session = ReplaySession::begin_recording(
//!     Cursor::new(Vec::new()), Core(vec![0; 4096]), config, 1, 0,
//! ).unwrap();
//! for frame in 0..120u16 {
//!     session.push_input_event(InputEvent { id: 8, value: frame as i16, ..Default::default() });
//!     session.advance_frame().unwrap();
//! }
//! session.rewind_one_frame().unwrap();
//! assert_eq!(session.frame_count(), 119);
//!
//! let snapshot = session.serialize_session_to_bytes().unwrap();
//! assert_eq!(session.load_external_snapshot(&snapshot).unwrap(), SnapshotLoad::Resumed);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `reel-core` | Event records, `StateCore` and `ReplayStream` traits |
//! | [`store`] | `reel-store` | Content-addressable block store with rollback |
//! | [`replay`] | `reel-replay` | Sessions, log codec, checkpoint encoding, timeline checks |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Event records and collaborator traits (`reel-core`).
pub use reel_core as types;

/// Content-addressable block store (`reel-store`).
///
/// Used internally by [`replay::StateStream`]; exposed for inspection and
/// for tooling that works on checkpoints directly.
pub use reel_store as store;

/// Replay sessions, log codec and checkpoint encoding (`reel-replay`).
///
/// Record and play back with [`replay::ReplaySession`]; read and write logs
/// without a core with [`replay::LogReader`] and [`replay::LogWriter`].
pub use reel_replay as replay;

/// Common imports for typical Reel usage.
///
/// ```rust
/// use reel::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use reel_core::{InputEvent, KeyEvent, ReplayStream, StateCore};

    // Session
    pub use reel_replay::{
        Advance, Compression, Encoding, Mode, ReplayConfig, ReplaySession, SnapshotLoad,
    };

    // Errors
    pub use reel_replay::{ConfigError, Incompatibility, ReplayError};

    // Metrics
    pub use reel_replay::{CodecMetrics, CodecStats};
}
