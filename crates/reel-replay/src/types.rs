//! Data types for replay recording and playback.

use reel_core::{InputEvent, KeyEvent};

/// Frame tag: never written; reading it means the log is corrupt.
pub const TAG_INVALID: u8 = 0;
/// Frame tag: events only.
pub const TAG_REGULAR: u8 = 1;
/// Frame tag: events followed by a raw state copy.
pub const TAG_CHECKPOINT_V1: u8 = 2;
/// Frame tag: events followed by an encoded, possibly compressed checkpoint.
pub const TAG_CHECKPOINT_V2: u8 = 3;

/// Header slot holding the frame counter (long header only).
pub const FRAME_COUNT_SLOT: usize = 6;

/// The fixed-size header at the start of every log.
///
/// Versions 0 and 1 store only the first six 32-bit slots; the frame
/// counter and block geometry fields read back as zero for them.
///
/// # Examples
///
/// ```
/// use reel_replay::LogHeader;
///
/// let header = LogHeader::new(0xDEAD_BEEF_0000_0001, 7, 256, 16, 60);
/// assert_eq!(header.encoded_len(), LogHeader::LONG_LEN);
/// assert_eq!(header.min_offset(), 40);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogHeader {
    /// Layout version.
    pub version: u32,
    /// Content checksum supplied by the host (e.g. a ROM checksum).
    pub checksum: u32,
    /// Length in bytes of the initial-state section after the header.
    pub initial_len: u32,
    /// Identifier shared by every log and snapshot of one recording.
    pub identifier: u64,
    /// Frames recorded, as of the last time the header was written.
    pub frame_count: u32,
    /// Checkpoint block size in bytes.
    pub block_size: u32,
    /// Blocks per superblock.
    pub superblock_size: u32,
    /// Frames between periodic checkpoints, 0 for none.
    pub checkpoint_interval: u32,
}

impl LogHeader {
    /// Encoded length of the version 0 and 1 header.
    pub const SHORT_LEN: usize = 24;
    /// Encoded length of the version 2 header.
    pub const LONG_LEN: usize = 40;

    /// A current-version header with an empty initial section.
    pub fn new(
        identifier: u64,
        checksum: u32,
        block_size: u32,
        superblock_size: u32,
        checkpoint_interval: u32,
    ) -> Self {
        Self {
            version: crate::FORMAT_VERSION,
            checksum,
            initial_len: 0,
            identifier,
            frame_count: 0,
            block_size,
            superblock_size,
            checkpoint_interval,
        }
    }

    /// Header length for a layout version.
    pub fn len_for(version: u32) -> usize {
        if version >= 2 {
            Self::LONG_LEN
        } else {
            Self::SHORT_LEN
        }
    }

    /// Length of this header on the wire.
    pub fn encoded_len(&self) -> usize {
        Self::len_for(self.version)
    }

    /// Offset of the first frame: header plus initial-state section.
    pub fn min_offset(&self) -> u64 {
        self.encoded_len() as u64 + u64::from(self.initial_len)
    }

    /// Whether frames carry a backref.
    pub fn has_backrefs(&self) -> bool {
        self.version >= 2
    }
}

/// An encoded checkpoint body, as stored after a `CHECKPOINT_V2` tag and
/// as the initial-state section of a version 2 log.
///
/// Scheme ids are kept as raw bytes so a reader can carry a checkpoint it
/// does not know how to decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedCheckpoint {
    /// Compression id (see [`Compression`](crate::Compression)).
    pub compression: u8,
    /// Encoding id (see [`Encoding`](crate::Encoding)).
    pub encoding: u8,
    /// Size of the state before encoding.
    pub state_size: u32,
    /// Size of the encoded stream before compression.
    pub encoded_size: u32,
    /// Compressed, encoded bytes.
    pub payload: Vec<u8>,
}

impl EncodedCheckpoint {
    /// Bytes occupied by the scheme ids and size fields.
    pub const HEADER_LEN: usize = 14;

    /// Total encoded length including the payload.
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_LEN + self.payload.len()
    }
}

/// State captured alongside a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Checkpoint {
    /// A verbatim copy of the state (`CHECKPOINT_V1`).
    Raw(Vec<u8>),
    /// An encoded checkpoint (`CHECKPOINT_V2`).
    Encoded(EncodedCheckpoint),
}

impl Checkpoint {
    /// The frame tag that introduces this checkpoint.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Raw(_) => TAG_CHECKPOINT_V1,
            Self::Encoded(_) => TAG_CHECKPOINT_V2,
        }
    }
}

/// One frame of the log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    /// Byte distance from this frame's start back to the previous frame's
    /// start; 0 for the first frame. Only stored from version 2.
    pub backref: u32,
    /// Key events delivered during the frame.
    pub key_events: Vec<KeyEvent>,
    /// Input values polled during the frame. Only stored from version 1.
    pub input_events: Vec<InputEvent>,
    /// Checkpoint taken at the end of the frame, if any.
    pub checkpoint: Option<Checkpoint>,
}

impl Frame {
    /// The frame tag for this frame.
    pub fn tag(&self) -> u8 {
        self.checkpoint.as_ref().map_or(TAG_REGULAR, Checkpoint::tag)
    }
}
