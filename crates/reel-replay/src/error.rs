//! Error types for the replay system.

use std::fmt;
use std::io;

use crate::config::ConfigError;

/// Which per-checkpoint scheme byte was not understood.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemeKind {
    /// The compression id.
    Compression,
    /// The encoding id.
    Encoding,
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compression => f.write_str("compression"),
            Self::Encoding => f.write_str("encoding"),
        }
    }
}

/// Why an externally supplied snapshot cannot be loaded into the current
/// replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Incompatibility {
    /// The snapshot belongs to a different recording.
    #[error("snapshot belongs to a different replay")]
    IdentifierMismatch,
    /// Same recording, but the frames diverge from this log.
    #[error("snapshot is from a different timeline of this replay")]
    WrongTimeline,
    /// Same recording, but the snapshot is further along than this log.
    #[error("snapshot is from later in the replay than the current position")]
    FutureState,
    /// The snapshot's replay section could not be parsed.
    #[error("snapshot replay data is unreadable")]
    Unreadable,
}

/// Errors that can occur during replay recording, playback, or snapshot
/// exchange.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// An I/O error occurred during read, write, seek or truncate.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The log does not start with the expected `b"REEL"` magic bytes.
    #[error("invalid magic bytes (expected b\"REEL\")")]
    InvalidMagic,
    /// The layout version is newer than this build understands.
    #[error("unsupported layout version {found}")]
    UnsupportedVersion {
        /// The version found in the log.
        found: u32,
    },
    /// The log ended in the middle of a structure.
    #[error("truncated read: {context}")]
    TruncatedRead {
        /// What was being read.
        context: &'static str,
    },
    /// A checkpoint names a compression or encoding this build cannot handle.
    #[error("unsupported {kind} scheme {id}")]
    UnsupportedScheme {
        /// Which scheme byte.
        kind: SchemeKind,
        /// The unrecognized id.
        id: u8,
    },
    /// A checkpoint's token stream disagrees with the block store.
    #[error("corrupt checkpoint: {detail}")]
    CorruptCheckpoint {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// An external snapshot cannot be applied to this replay.
    #[error("incompatible external state: {0}")]
    Incompatible(Incompatibility),
    /// A frame is structurally invalid (bad tag, oversized section).
    #[error("malformed frame: {detail}")]
    MalformedFrame {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A compressor or decompressor failed.
    #[error("compression error: {detail}")]
    Compression {
        /// Message from the compressor.
        detail: String,
    },
    /// The emulated core refused to serialize or deserialize its state.
    #[error("core rejected state {operation}")]
    CoreRejected {
        /// `"serialize"` or `"deserialize"`.
        operation: &'static str,
    },
    /// The session is not recording or playing back.
    #[error("no replay is active")]
    NotActive,
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ReplayError {
    /// Whether this error means the log cannot be read any further.
    ///
    /// Playback treats these as the end of the replay rather than as a
    /// hard failure.
    pub fn ends_log(&self) -> bool {
        matches!(
            self,
            Self::TruncatedRead { .. }
                | Self::CorruptCheckpoint { .. }
                | Self::MalformedFrame { .. }
        )
    }

    pub(crate) fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptCheckpoint {
            detail: detail.into(),
        }
    }

    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedFrame {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_scheme() {
        let err = ReplayError::UnsupportedScheme {
            kind: SchemeKind::Compression,
            id: 9,
        };
        assert_eq!(err.to_string(), "unsupported compression scheme 9");
    }

    #[test]
    fn io_errors_convert() {
        let err: ReplayError = io::Error::other("boom").into();
        assert!(matches!(err, ReplayError::Io(_)));
        assert!(!err.ends_log());
    }

    #[test]
    fn truncation_and_corruption_end_the_log() {
        assert!(ReplayError::TruncatedRead { context: "frame" }.ends_log());
        assert!(ReplayError::corrupt("bad index").ends_log());
        assert!(!ReplayError::Incompatible(Incompatibility::WrongTimeline).ends_log());
    }
}
