//! Deduplicated checkpoint encoding.
//!
//! A state is cut into blocks of `block_size` bytes, and blocks are grouped
//! into superblocks of `superblock_size` block indices. Both levels are
//! interned in a [`BlockStore`]. A checkpoint is then a token stream that
//! introduces only the blocks and superblocks the store has not seen yet,
//! followed by the superblock sequence that rebuilds the whole state:
//!
//! ```text
//! START frame
//! (NEW_BLOCK index bytes | NEW_SUPERBLOCK index count indices)*
//! SUPERBLOCK_SEQ count indices
//! ```
//!
//! The decoder replays the `NEW_*` tokens with
//! [`insert_exact`](BlockStore::insert_exact), so encoder and decoder stores
//! stay index-for-index identical as long as both see the same checkpoints
//! and roll back to the same frames.

use reel_store::{BlockStore, StoreError, ZERO_INDEX};

use crate::error::ReplayError;
use crate::metrics::CheckpointStats;

/// Token: start of stream, followed by a u32 frame number.
pub const TOKEN_START: u8 = 0x00;
/// Token: a new block, u32 index then `block_size` bytes.
pub const TOKEN_NEW_BLOCK: u8 = 0x01;
/// Token: a new superblock, u32 index, u32 count, then the block indices.
pub const TOKEN_NEW_SUPERBLOCK: u8 = 0x02;
/// Token: the final superblock sequence, u32 count then the indices.
pub const TOKEN_SUPERBLOCK_SEQ: u8 = 0x03;

/// Encoder/decoder state for the statestream checkpoint encoding.
///
/// # Examples
///
/// ```
/// use reel_replay::StateStream;
///
/// let mut enc = StateStream::new(4, 2);
/// let mut dec = StateStream::new(4, 2);
///
/// let state: Vec<u8> = (0..21).collect();
/// let (tokens, _) = enc.encode(&state, None, 0);
///
/// let mut out = vec![0u8; state.len()];
/// dec.decode(&tokens, 0, &mut out, true).unwrap();
/// assert_eq!(out, state);
/// ```
#[derive(Debug)]
pub struct StateStream {
    block_size: usize,
    superblock_size: usize,
    blocks: BlockStore<u8>,
    superblocks: BlockStore<u32>,
    /// Superblock sequence of the last encode or applied decode.
    seq: Vec<u32>,
    seq_valid: bool,
    scratch_block: Vec<u8>,
    scratch_super: Vec<u32>,
}

impl StateStream {
    /// Create a codec with empty stores.
    ///
    /// # Panics
    ///
    /// Panics if either size is zero.
    pub fn new(block_size: u32, superblock_size: u32) -> Self {
        let block_size = block_size as usize;
        let superblock_size = superblock_size as usize;
        Self {
            block_size,
            superblock_size,
            blocks: BlockStore::new(block_size),
            superblocks: BlockStore::new(superblock_size),
            seq: Vec::new(),
            seq_valid: false,
            scratch_block: vec![0; block_size],
            scratch_super: Vec::with_capacity(superblock_size),
        }
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Blocks per superblock.
    pub fn superblock_size(&self) -> usize {
        self.superblock_size
    }

    /// The block store.
    pub fn blocks(&self) -> &BlockStore<u8> {
        &self.blocks
    }

    /// The superblock store.
    pub fn superblocks(&self) -> &BlockStore<u32> {
        &self.superblocks
    }

    /// Number of superblocks needed to cover `state_len` bytes.
    pub fn superblock_count(&self, state_len: usize) -> usize {
        state_len.div_ceil(self.block_size * self.superblock_size)
    }

    /// Forget the last superblock sequence, disabling the unchanged-data
    /// fast paths until the next full encode or applied decode.
    pub fn invalidate(&mut self) {
        self.seq_valid = false;
    }

    /// Drop every block and superblock first added after `frame`.
    pub fn remove_after(&mut self, frame: u64) {
        self.superblocks.remove_after(frame);
        self.blocks.remove_after(frame);
        self.invalidate();
    }

    /// Drop everything except the zero entries.
    pub fn clear(&mut self) {
        self.superblocks.clear();
        self.blocks.clear();
        self.seq.clear();
        self.invalidate();
    }

    /// Encode `state` as a token stream, adding new content to the stores
    /// under `frame`.
    ///
    /// `previous` is the state passed to the last call. When given and of
    /// the same length, blocks whose bytes did not change are reused
    /// straight from the last superblock sequence without hashing.
    pub fn encode(
        &mut self,
        state: &[u8],
        previous: Option<&[u8]>,
        frame: u64,
    ) -> (Vec<u8>, CheckpointStats) {
        let bs = self.block_size;
        let sbs = self.superblock_size;
        let sb_bytes = bs * sbs;
        let n_super = self.superblock_count(state.len());
        let previous = previous
            .filter(|p| self.seq_valid && p.len() == state.len() && self.seq.len() == n_super);

        let mut stats = CheckpointStats {
            frame,
            state_bytes: state.len(),
            ..CheckpointStats::default()
        };
        let mut out = Vec::with_capacity(16 + n_super * (sbs + 1) * 4);
        out.push(TOKEN_START);
        // Wire field is 32-bit; later frames saturate.
        let start_frame = u32::try_from(frame).unwrap_or(u32::MAX);
        out.extend_from_slice(&start_frame.to_le_bytes());

        let mut new_seq = Vec::with_capacity(n_super);
        for sb in 0..n_super {
            self.scratch_super.clear();
            for b in 0..sbs {
                stats.blocks += 1;
                let start = sb * sb_bytes + b * bs;
                if start >= state.len() {
                    stats.blocks_skipped += 1;
                    self.scratch_super.push(ZERO_INDEX);
                    continue;
                }
                let end = (start + bs).min(state.len());
                let chunk = &state[start..end];

                if let Some(prev) = previous {
                    if prev[start..end] == *chunk {
                        let reused = self.superblocks.peek(self.seq[sb]).map(|s| s[b]);
                        if let Some(index) = reused {
                            self.blocks.bump(index);
                            self.scratch_super.push(index);
                            stats.blocks_skipped += 1;
                            continue;
                        }
                    }
                }

                let object: &[u8] = if chunk.len() == bs {
                    chunk
                } else {
                    self.scratch_block[..chunk.len()].copy_from_slice(chunk);
                    self.scratch_block[chunk.len()..].fill(0);
                    &self.scratch_block
                };
                let inserted = self.blocks.insert(object, frame);
                if inserted.is_new {
                    stats.blocks_new += 1;
                    out.push(TOKEN_NEW_BLOCK);
                    out.extend_from_slice(&inserted.index.to_le_bytes());
                    out.extend_from_slice(object);
                } else {
                    stats.blocks_reused += 1;
                }
                self.scratch_super.push(inserted.index);
            }

            stats.superblocks += 1;
            let inserted = self.superblocks.insert(&self.scratch_super, frame);
            if inserted.is_new {
                stats.superblocks_new += 1;
                out.push(TOKEN_NEW_SUPERBLOCK);
                out.extend_from_slice(&inserted.index.to_le_bytes());
                out.extend_from_slice(&(sbs as u32).to_le_bytes());
                for index in &self.scratch_super {
                    out.extend_from_slice(&index.to_le_bytes());
                }
            } else {
                stats.superblocks_reused += 1;
            }
            new_seq.push(inserted.index);
        }

        out.push(TOKEN_SUPERBLOCK_SEQ);
        out.extend_from_slice(&(n_super as u32).to_le_bytes());
        for index in &new_seq {
            out.extend_from_slice(&index.to_le_bytes());
        }

        self.seq = new_seq;
        self.seq_valid = true;
        stats.encoded_bytes = out.len();
        (out, stats)
    }

    /// Decode a token stream produced by [`encode`](Self::encode).
    ///
    /// New blocks and superblocks are always added to the stores under
    /// `frame`. When `apply` is true the state is also rebuilt into `into`,
    /// whose length must be the state size; superblocks identical to the
    /// last applied decode at the same position are not recopied.
    ///
    /// Any disagreement between the stream and the stores is a
    /// [`CorruptCheckpoint`](ReplayError::CorruptCheckpoint); the stores
    /// may then hold part of the stream's additions and should be rolled
    /// back by the caller.
    pub fn decode(
        &mut self,
        tokens: &[u8],
        frame: u64,
        into: &mut [u8],
        apply: bool,
    ) -> Result<CheckpointStats, ReplayError> {
        let bs = self.block_size;
        let sbs = self.superblock_size;
        let sb_bytes = bs * sbs;
        let n_super = self.superblock_count(into.len());
        let mut stats = CheckpointStats {
            frame,
            state_bytes: into.len(),
            encoded_bytes: tokens.len(),
            ..CheckpointStats::default()
        };

        let mut r = TokenReader { buf: tokens, pos: 0 };
        if r.u8()? != TOKEN_START {
            return Err(ReplayError::corrupt("token stream does not begin with START"));
        }
        r.u32()?;

        let seq = loop {
            match r.u8()? {
                TOKEN_NEW_BLOCK => {
                    let index = r.u32()?;
                    let data = r.bytes(bs)?;
                    self.blocks
                        .insert_exact(index, data, frame)
                        .map_err(|e| store_corrupt("block", e))?;
                    stats.blocks_new += 1;
                }
                TOKEN_NEW_SUPERBLOCK => {
                    let index = r.u32()?;
                    let count = r.u32()? as usize;
                    if count != sbs {
                        return Err(ReplayError::corrupt(format!(
                            "superblock {index} has {count} entries, expected {sbs}"
                        )));
                    }
                    self.scratch_super.clear();
                    for _ in 0..count {
                        let block = r.u32()?;
                        if block as usize >= self.blocks.len() {
                            return Err(ReplayError::corrupt(format!(
                                "superblock {index} references unknown block {block}"
                            )));
                        }
                        self.scratch_super.push(block);
                    }
                    self.superblocks
                        .insert_exact(index, &self.scratch_super, frame)
                        .map_err(|e| store_corrupt("superblock", e))?;
                    stats.superblocks_new += 1;
                }
                TOKEN_SUPERBLOCK_SEQ => {
                    let count = r.u32()? as usize;
                    if count != n_super {
                        return Err(ReplayError::corrupt(format!(
                            "superblock sequence has {count} entries, state needs {n_super}"
                        )));
                    }
                    let mut seq = Vec::with_capacity(count);
                    for _ in 0..count {
                        seq.push(r.u32()?);
                    }
                    break seq;
                }
                token => {
                    return Err(ReplayError::corrupt(format!(
                        "unexpected token {token:#04x} at offset {}",
                        r.pos - 1
                    )));
                }
            }
        };
        if r.pos != tokens.len() {
            return Err(ReplayError::corrupt(format!(
                "{} trailing bytes after superblock sequence",
                tokens.len() - r.pos
            )));
        }

        let fast = apply && self.seq_valid && self.seq.len() == n_super;
        for (sb, &super_index) in seq.iter().enumerate() {
            stats.superblocks += 1;
            stats.blocks += sbs as u32;
            if !self.superblocks.bump(super_index) {
                return Err(ReplayError::corrupt(format!(
                    "sequence references unknown superblock {super_index}"
                )));
            }
            let Some(entries) = self.superblocks.peek(super_index) else {
                return Err(ReplayError::corrupt("superblock vanished during decode"));
            };
            let unchanged = fast && self.seq[sb] == super_index;
            for (b, &block_index) in entries.iter().enumerate() {
                let Some(block) = self.blocks.get(block_index) else {
                    return Err(ReplayError::corrupt(format!(
                        "superblock {super_index} references unknown block {block_index}"
                    )));
                };
                if unchanged {
                    stats.blocks_skipped += 1;
                    continue;
                }
                if !apply {
                    continue;
                }
                let start = sb * sb_bytes + b * bs;
                if start >= into.len() {
                    continue;
                }
                let end = (start + bs).min(into.len());
                into[start..end].copy_from_slice(&block[..end - start]);
            }
        }
        stats.blocks_reused = stats
            .blocks
            .saturating_sub(stats.blocks_new)
            .saturating_sub(stats.blocks_skipped);
        stats.superblocks_reused = stats.superblocks.saturating_sub(stats.superblocks_new);

        self.seq = seq;
        self.seq_valid = apply;
        Ok(stats)
    }
}

fn store_corrupt(what: &str, e: StoreError) -> ReplayError {
    ReplayError::corrupt(format!("{what}: {e}"))
}

/// Bounds-checked reader over a token buffer.
struct TokenReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TokenReader<'a> {
    fn bytes(&mut self, len: usize) -> Result<&'a [u8], ReplayError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| ReplayError::corrupt("token stream ended early"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ReplayError> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ReplayError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
