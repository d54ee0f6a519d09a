//! Checkpoint codec statistics.
//!
//! The codec reports one [`CheckpointStats`] per encoded or decoded
//! checkpoint to a [`CodecMetrics`] sink owned by the session. Use
//! [`NoopMetrics`] to discard them or [`CodecStats`] to keep running
//! totals.

/// Counters for a single checkpoint encode or decode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckpointStats {
    /// Frame the checkpoint belongs to.
    pub frame: u64,
    /// Blocks covering the state.
    pub blocks: u32,
    /// Blocks found unchanged by direct comparison with the previous
    /// state, without hashing.
    pub blocks_skipped: u32,
    /// Blocks hashed and found already stored.
    pub blocks_reused: u32,
    /// Blocks added to the store.
    pub blocks_new: u32,
    /// Superblocks covering the state.
    pub superblocks: u32,
    /// Superblocks already stored.
    pub superblocks_reused: u32,
    /// Superblocks added to the store.
    pub superblocks_new: u32,
    /// Size of the state in bytes.
    pub state_bytes: usize,
    /// Size of the token stream in bytes, before compression.
    pub encoded_bytes: usize,
    /// Size on the wire after compression.
    pub compressed_bytes: usize,
    /// Wall-clock time in microseconds, including compression.
    pub micros: u64,
}

/// Sink for checkpoint codec statistics.
pub trait CodecMetrics {
    /// Called after each checkpoint is encoded.
    fn on_encode(&mut self, stats: &CheckpointStats);

    /// Called after each checkpoint is decoded.
    fn on_decode(&mut self, stats: &CheckpointStats);
}

/// Discards all statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl CodecMetrics for NoopMetrics {
    fn on_encode(&mut self, _stats: &CheckpointStats) {}

    fn on_decode(&mut self, _stats: &CheckpointStats) {}
}

/// Running totals across every checkpoint a session has handled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodecStats {
    /// Checkpoints encoded.
    pub encodes: u64,
    /// Checkpoints decoded.
    pub decodes: u64,
    /// Blocks visited.
    pub blocks: u64,
    /// Blocks skipped by the unchanged-since-last-time fast path.
    pub blocks_skipped: u64,
    /// Blocks deduplicated by hash.
    pub blocks_reused: u64,
    /// Blocks added.
    pub blocks_new: u64,
    /// Superblocks visited.
    pub superblocks: u64,
    /// Superblocks deduplicated.
    pub superblocks_reused: u64,
    /// Superblocks added.
    pub superblocks_new: u64,
    /// State bytes fed to the encoder.
    pub bytes_in: u64,
    /// Compressed bytes written.
    pub bytes_out: u64,
    /// Time spent encoding, in microseconds.
    pub encode_micros: u64,
    /// Time spent decoding, in microseconds.
    pub decode_micros: u64,
}

impl CodecStats {
    fn accumulate(&mut self, stats: &CheckpointStats) {
        self.blocks += u64::from(stats.blocks);
        self.blocks_skipped += u64::from(stats.blocks_skipped);
        self.blocks_reused += u64::from(stats.blocks_reused);
        self.blocks_new += u64::from(stats.blocks_new);
        self.superblocks += u64::from(stats.superblocks);
        self.superblocks_reused += u64::from(stats.superblocks_reused);
        self.superblocks_new += u64::from(stats.superblocks_new);
    }

    /// Blocks that were hashed (reused plus new).
    pub fn hashes(&self) -> u64 {
        self.blocks_reused + self.blocks_new
    }

    /// Ratio of written bytes to input bytes, or `None` before any encode.
    pub fn compression_ratio(&self) -> Option<f64> {
        (self.bytes_in > 0).then(|| self.bytes_out as f64 / self.bytes_in as f64)
    }
}

impl CodecMetrics for CodecStats {
    fn on_encode(&mut self, stats: &CheckpointStats) {
        self.encodes += 1;
        self.accumulate(stats);
        self.bytes_in += stats.state_bytes as u64;
        self.bytes_out += stats.compressed_bytes as u64;
        self.encode_micros += stats.micros;
    }

    fn on_decode(&mut self, stats: &CheckpointStats) {
        self.decodes += 1;
        self.accumulate(stats);
        self.decode_micros += stats.micros;
    }
}

impl<M: CodecMetrics + ?Sized> CodecMetrics for &mut M {
    fn on_encode(&mut self, stats: &CheckpointStats) {
        (**self).on_encode(stats)
    }

    fn on_decode(&mut self, stats: &CheckpointStats) {
        (**self).on_decode(stats)
    }
}
