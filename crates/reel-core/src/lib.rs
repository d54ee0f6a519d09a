//! Core types and traits for the Reel replay recorder.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the value types recorded once per frame (key and input events) and
//! the two collaborator seams the recorder is written against:
//!
//! - [`StateCore`]: the emulated core, treated as an opaque full-state
//!   serializer/deserializer.
//! - [`ReplayStream`]: the seekable, truncatable byte stream holding the
//!   replay log.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod event;
pub mod stream;
pub mod traits;

pub use event::{InputEvent, KeyEvent};
pub use stream::ReplayStream;
pub use traits::StateCore;
