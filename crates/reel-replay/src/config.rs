//! Replay session configuration.

use crate::compression::{Compression, Encoding};

/// Errors from [`ReplayConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `block_size` was zero.
    #[error("block size must be > 0")]
    ZeroBlockSize,
    /// `superblock_size` was zero.
    #[error("superblock size must be > 0")]
    ZeroSuperblockSize,
    /// `frame_history` was not a power of two of at least 2.
    #[error("frame history must be a power of two >= 2, got {value}")]
    FrameHistory {
        /// The rejected value.
        value: usize,
    },
    /// The requested compressor is not compiled into this build.
    #[error("compression {0:?} is not available in this build")]
    CompressionUnavailable(Compression),
}

/// Configuration for a replay session.
///
/// The block geometry and checkpoint interval are written into the log
/// header when recording starts; playback takes them from the header and
/// ignores the values here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Checkpoint block size in bytes.
    ///
    /// Default: 256. Smaller blocks deduplicate better but cost more
    /// hashing and more index entries.
    pub block_size: u32,

    /// Number of blocks grouped into one superblock.
    ///
    /// Default: 16.
    pub superblock_size: u32,

    /// Write a checkpoint every this many frames. 0 disables periodic
    /// checkpoints; the initial state is always captured.
    pub checkpoint_interval: u32,

    /// Compressor for new checkpoints.
    ///
    /// Default: [`Compression::preferred`].
    pub compression: Compression,

    /// Encoding for new checkpoints.
    pub encoding: Encoding,

    /// Write legacy raw checkpoint frames instead of encoded ones.
    pub raw_checkpoints: bool,

    /// Number of recent frame offsets kept for rewind. Older offsets are
    /// recovered by walking frame backrefs.
    ///
    /// Must be a power of two and at least 2.
    pub frame_history: usize,

    /// During playback, load checkpoints into the core. When false only
    /// the block store bookkeeping is advanced.
    pub apply_checkpoints: bool,

    /// When recording, replace the log with an external snapshot of the
    /// same replay that diverges from it or runs ahead of it, instead of
    /// refusing the load.
    pub overwrite_on_divergence: bool,
}

impl ReplayConfig {
    /// Default block size in bytes.
    pub const DEFAULT_BLOCK_SIZE: u32 = 256;

    /// Default blocks per superblock.
    pub const DEFAULT_SUPERBLOCK_SIZE: u32 = 16;

    /// Default frame-offset history length.
    pub const DEFAULT_FRAME_HISTORY: usize = 256;

    /// Create a config with the given checkpoint interval and defaults for
    /// everything else.
    pub fn new(checkpoint_interval: u32) -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            superblock_size: Self::DEFAULT_SUPERBLOCK_SIZE,
            checkpoint_interval,
            compression: Compression::preferred(),
            encoding: Encoding::Statestream,
            raw_checkpoints: false,
            frame_history: Self::DEFAULT_FRAME_HISTORY,
            apply_checkpoints: true,
            overwrite_on_divergence: false,
        }
    }

    /// Bytes covered by one superblock.
    pub fn superblock_bytes(&self) -> usize {
        self.block_size as usize * self.superblock_size as usize
    }

    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.superblock_size == 0 {
            return Err(ConfigError::ZeroSuperblockSize);
        }
        if self.frame_history < 2 || !self.frame_history.is_power_of_two() {
            return Err(ConfigError::FrameHistory {
                value: self.frame_history,
            });
        }
        if !self.compression.is_available() {
            return Err(ConfigError::CompressionUnavailable(self.compression));
        }
        Ok(())
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
