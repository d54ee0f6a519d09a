//! Host-facing replay session.
//!
//! [`ReplaySession`] owns one log stream, one emulated core and the
//! checkpoint codec, and moves between four modes:
//!
//! ```text
//! Idle ──begin_recording──▶ Recording
//! Idle ──begin_playback───▶ Playback ──end of log──▶ Ended
//! Playback/Ended ──incompatible snapshot──▶ Idle
//! ```
//!
//! The host calls [`advance_frame`](ReplaySession::advance_frame) once per
//! emulated tick. While recording, events pushed during the tick are
//! written as one frame, with a checkpoint every `checkpoint_interval`
//! frames. While playing back, the next frame is read and its events are
//! handed back through [`take_key_events`](ReplaySession::take_key_events)
//! and [`input_state`](ReplaySession::input_state).
//!
//! # Frame offsets
//!
//! The session remembers where the last `frame_history` frames end in a
//! ring indexed by `frame & mask`. Rewinding further back than the ring
//! reaches walks the per-frame backrefs instead.

use std::io::SeekFrom;
use std::time::Instant;

use reel_core::{InputEvent, KeyEvent, ReplayStream, StateCore};

use crate::codec::{
    decode_checkpoint_body, decode_frame, decode_header, encode_checkpoint_body, encode_frame,
    encode_header, read_bytes, read_u32_le, write_u32_le, MAX_INPUT_EVENTS, MAX_KEY_EVENTS,
};
use crate::compression::{Compression, Encoding};
use crate::config::{ConfigError, ReplayConfig};
use crate::error::{Incompatibility, ReplayError};
use crate::metrics::{CheckpointStats, CodecMetrics, NoopMetrics};
use crate::statestream::StateStream;
use crate::timeline;
use crate::types::{Checkpoint, EncodedCheckpoint, Frame, LogHeader, FRAME_COUNT_SLOT};

// ── Public enums ────────────────────────────────────────────────

/// What a session is currently doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Not recording or playing back; most operations are refused.
    Idle,
    /// Appending frames to the log.
    Recording,
    /// Reading frames from the log.
    Playback,
    /// Playback reached the end of the log. Rewinding resumes playback.
    Ended,
}

/// Outcome of one [`ReplaySession::advance_frame`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// A frame was appended to the log.
    Recorded {
        /// Whether the frame carries a checkpoint.
        checkpoint: bool,
    },
    /// A frame was read from the log.
    Played {
        /// Whether the frame carried a checkpoint.
        checkpoint: bool,
    },
    /// Playback has run out of frames.
    Ended,
}

/// Outcome of [`ReplaySession::load_external_snapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotLoad {
    /// The snapshot is on this replay's timeline; the session continues
    /// from the snapshot's frame.
    Resumed,
    /// Recording only: the log was replaced by the snapshot's log.
    Overwrote,
    /// Playback only: the snapshot does not fit this replay, so playback
    /// stopped and the session is now [`Mode::Idle`]. The host should load
    /// the state as an ordinary snapshot.
    Halted(Incompatibility),
    /// No replay is active; the snapshot has nothing to do with replay.
    Ignored,
}

// ── ReplaySession ───────────────────────────────────────────────

/// A recording or playback session over one log stream.
///
/// Generic over the stream `S` (a `Cursor<Vec<u8>>` or a `File`), the core
/// `C`, and the checkpoint metrics sink `M`.
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
/// use reel_core::{KeyEvent, StateCore};
/// use reel_replay::{Advance, ReplayConfig, ReplaySession};
///
/// struct Core(Vec<u8>);
/// impl StateCore for Core {
///     fn serialize_size(&self) -> usize { self.0.len() }
///     fn serialize(&mut self, buf: &mut [u8]) -> Option<usize> {
///         buf[..self.0.len()].copy_from_slice(&self.0);
///         Some(self.0.len())
///     }
///     fn deserialize(&mut self, buf: &[u8]) -> bool {
///         self.0 = buf.to_vec();
///         true
///     }
/// }
///
/// let config = ReplayConfig::new(2);
/// let mut rec = ReplaySession::begin_recording(
///     Cursor::new(Vec::new()), Core(vec![1; 64]), config.clone(), 0xC0FFEE, 0,
/// ).unwrap();
/// rec.push_key_event(KeyEvent { down: true, modifiers: 0, code: 32, character: 32 });
/// rec.advance_frame().unwrap();
/// assert_eq!(rec.advance_frame().unwrap(), Advance::Recorded { checkpoint: true });
/// let (stream, _, _) = rec.finish().unwrap();
///
/// let mut play = ReplaySession::begin_playback(stream, Core(vec![]), config).unwrap();
/// assert_eq!(play.core().0, vec![1; 64]);
/// play.advance_frame().unwrap();
/// assert_eq!(play.take_key_events()[0].code, 32);
/// ```
pub struct ReplaySession<S: ReplayStream, C: StateCore, M: CodecMetrics = NoopMetrics> {
    stream: S,
    core: C,
    metrics: M,
    config: ReplayConfig,
    header: LogHeader,
    mode: Mode,
    frame_counter: u64,
    /// `frame_pos[k & mask]` is the offset where frame k ends.
    frame_pos: Vec<u64>,
    /// Oldest frame whose entry in `frame_pos` is still valid.
    ring_low: u64,
    /// Offset of the first frame.
    min_pos: u64,
    key_events: Vec<KeyEvent>,
    input_events: Vec<InputEvent>,
    codec: StateStream,
    current: Vec<u8>,
    previous: Vec<u8>,
    previous_valid: bool,
    rewound_last_tick: bool,
    skip_checkpoint: bool,
}

impl<S: ReplayStream, C: StateCore> ReplaySession<S, C, NoopMetrics> {
    /// Start recording into `stream`, which is truncated first.
    ///
    /// The core's current state becomes the log's initial checkpoint.
    /// `identifier` ties snapshots to this recording; `checksum` is any
    /// content checksum the host wants stored (e.g. of the loaded ROM).
    pub fn begin_recording(
        stream: S,
        core: C,
        config: ReplayConfig,
        identifier: u64,
        checksum: u32,
    ) -> Result<Self, ReplayError> {
        Self::begin_recording_with_metrics(stream, core, config, identifier, checksum, NoopMetrics)
    }

    /// Start playing back the log in `stream`, loading its initial state
    /// into `core`.
    pub fn begin_playback(stream: S, core: C, config: ReplayConfig) -> Result<Self, ReplayError> {
        Self::begin_playback_with_metrics(stream, core, config, NoopMetrics)
    }
}

impl<S: ReplayStream, C: StateCore, M: CodecMetrics> ReplaySession<S, C, M> {
    /// [`begin_recording`](ReplaySession::begin_recording) with a metrics
    /// sink for checkpoint statistics.
    pub fn begin_recording_with_metrics(
        stream: S,
        core: C,
        config: ReplayConfig,
        identifier: u64,
        checksum: u32,
        metrics: M,
    ) -> Result<Self, ReplayError> {
        config.validate()?;
        let header = LogHeader::new(
            identifier,
            checksum,
            config.block_size,
            config.superblock_size,
            config.checkpoint_interval,
        );
        let mut session = Self::assemble(stream, core, metrics, config, header, Mode::Recording)?;
        session.write_log_start()?;
        log::info!(
            "recording replay {identifier:#018x} (checkpoint every {} frames, initial state {} bytes)",
            session.header.checkpoint_interval,
            session.core.serialize_size()
        );
        Ok(session)
    }

    /// [`begin_playback`](ReplaySession::begin_playback) with a metrics
    /// sink for checkpoint statistics.
    ///
    /// Block geometry comes from the log header; logs older than layout
    /// version 2 use the geometry in `config`.
    pub fn begin_playback_with_metrics(
        mut stream: S,
        core: C,
        config: ReplayConfig,
        metrics: M,
    ) -> Result<Self, ReplayError> {
        config.validate()?;
        stream.seek(SeekFrom::Start(0))?;
        let header = decode_header(&mut stream)?;
        let section = read_bytes(&mut stream, u64::from(header.initial_len), "initial state")?;

        let mut session = Self::assemble(stream, core, metrics, config, header, Mode::Playback)?;
        session.min_pos = session.header.min_offset();
        session.reset_positions();
        if session.header.version >= 2 {
            let cp = decode_checkpoint_body(&mut section.as_slice())?;
            session.load_checkpoint(&Checkpoint::Encoded(cp), 0, true)?;
        } else if !session.core.deserialize(&section) {
            return Err(ReplayError::CoreRejected {
                operation: "deserialize",
            });
        }
        log::info!(
            "playing back replay {:#018x} (layout v{}, {} frames recorded)",
            session.header.identifier,
            session.header.version,
            session.header.frame_count
        );
        Ok(session)
    }

    fn assemble(
        stream: S,
        core: C,
        metrics: M,
        config: ReplayConfig,
        header: LogHeader,
        mode: Mode,
    ) -> Result<Self, ReplayError> {
        let (block_size, superblock_size) = if header.version >= 2 {
            (header.block_size, header.superblock_size)
        } else {
            (config.block_size, config.superblock_size)
        };
        if block_size == 0 {
            return Err(ConfigError::ZeroBlockSize.into());
        }
        if superblock_size == 0 {
            return Err(ConfigError::ZeroSuperblockSize.into());
        }
        let min_pos = header.min_offset();
        Ok(Self {
            stream,
            core,
            metrics,
            frame_pos: vec![min_pos; config.frame_history],
            config,
            header,
            mode,
            frame_counter: 0,
            ring_low: 0,
            min_pos,
            key_events: Vec::new(),
            input_events: Vec::new(),
            codec: StateStream::new(block_size, superblock_size),
            current: Vec::new(),
            previous: Vec::new(),
            previous_valid: false,
            rewound_last_tick: false,
            skip_checkpoint: false,
        })
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Frames recorded or played so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// The log header. `frame_count` in it is only updated by
    /// [`finish`](Self::finish).
    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    /// The session configuration.
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// The emulated core.
    pub fn core(&self) -> &C {
        &self.core
    }

    /// Mutable access to the emulated core.
    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    /// The checkpoint metrics sink.
    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// Mutable access to the checkpoint metrics sink.
    pub fn metrics_mut(&mut self) -> &mut M {
        &mut self.metrics
    }

    /// The checkpoint codec and its block stores.
    pub fn state_stream(&self) -> &StateStream {
        &self.codec
    }

    /// Offset of the first frame in the log.
    pub fn min_offset(&self) -> u64 {
        self.min_pos
    }

    // ── Host events ─────────────────────────────────────────────

    /// Queue a key event for the frame being recorded.
    ///
    /// Returns `false` if not recording or the frame is full.
    pub fn push_key_event(&mut self, event: KeyEvent) -> bool {
        if self.mode != Mode::Recording || self.key_events.len() >= MAX_KEY_EVENTS {
            return false;
        }
        self.key_events.push(event);
        true
    }

    /// Record a polled input value for the frame being recorded.
    ///
    /// Polling the same control twice in one frame keeps the last value.
    /// Returns `false` if not recording or the frame is full.
    pub fn push_input_event(&mut self, event: InputEvent) -> bool {
        if self.mode != Mode::Recording {
            return false;
        }
        if let Some(existing) = self
            .input_events
            .iter_mut()
            .find(|e| e.matches(event.port, event.device, event.index, event.id))
        {
            existing.value = event.value;
            return true;
        }
        if self.input_events.len() >= MAX_INPUT_EVENTS {
            return false;
        }
        self.input_events.push(event);
        true
    }

    /// Take the key events of the frame just played back.
    pub fn take_key_events(&mut self) -> Vec<KeyEvent> {
        std::mem::take(&mut self.key_events)
    }

    /// Input events of the frame just played back, or queued for the
    /// frame being recorded.
    pub fn input_events(&self) -> &[InputEvent] {
        &self.input_events
    }

    /// The value a control had in the frame just played back.
    pub fn input_state(&self, port: u8, device: u8, index: u8, id: u16) -> Option<i16> {
        self.input_events
            .iter()
            .find(|e| e.matches(port, device, index, id))
            .map(|e| e.value)
    }

    // ── Frame advance ───────────────────────────────────────────

    /// Run one tick: write the pending frame when recording, read the next
    /// frame when playing back.
    ///
    /// # Errors
    ///
    /// [`ReplayError::NotActive`] when idle. While recording, a failed
    /// checkpoint capture or write is returned and nothing is appended;
    /// the pending events are kept. Retry, or call
    /// [`skip_pending_checkpoint`](Self::skip_pending_checkpoint) to record
    /// the frame without its checkpoint. Truncated or corrupt logs never fail
    /// playback: they end it with [`Advance::Ended`].
    pub fn advance_frame(&mut self) -> Result<Advance, ReplayError> {
        self.rewound_last_tick = false;
        match self.mode {
            Mode::Idle => Err(ReplayError::NotActive),
            Mode::Ended => Ok(Advance::Ended),
            Mode::Recording => self.record_frame(),
            Mode::Playback => self.replay_next_frame(),
        }
    }

    /// Record the next frame without the checkpoint its cadence calls for.
    ///
    /// Lets a host keep recording when the core cannot produce a state,
    /// instead of retrying the same capture every tick. Applies to the next
    /// frame written only. Returns `false` if not recording.
    pub fn skip_pending_checkpoint(&mut self) -> bool {
        if self.mode != Mode::Recording {
            return false;
        }
        self.skip_checkpoint = true;
        true
    }

    fn record_frame(&mut self) -> Result<Advance, ReplayError> {
        let next = self.frame_counter + 1;
        let backref = self.previous_frame_len()?;
        let interval = u64::from(self.header.checkpoint_interval);
        let due = interval != 0 && next % interval == 0;
        if due && self.skip_checkpoint {
            log::warn!("recording frame {next} without its checkpoint");
        }

        let checkpoint = if due && !self.skip_checkpoint {
            match self.capture_checkpoint(next) {
                Ok(cp) => Some(cp),
                Err(e) => {
                    self.discard_capture(next);
                    log::warn!("checkpoint capture for frame {next} failed: {e}");
                    return Err(e);
                }
            }
        } else {
            None
        };
        let has_checkpoint = checkpoint.is_some();

        let frame = Frame {
            backref,
            key_events: std::mem::take(&mut self.key_events),
            input_events: std::mem::take(&mut self.input_events),
            checkpoint,
        };
        let start = self.frame_pos[self.slot(self.frame_counter)];
        let mut buf = Vec::new();
        let written = encode_frame(&mut buf, &frame, self.header.version)
            .and_then(|()| Ok(self.stream.write_all(&buf)?));
        if let Err(e) = written {
            if has_checkpoint {
                self.discard_capture(next);
            }
            if let Err(cleanup) = self.cut_stream_at(start) {
                log::warn!("could not remove partial frame {next}: {cleanup}");
            }
            self.key_events = frame.key_events;
            self.input_events = frame.input_events;
            return Err(e);
        }

        self.skip_checkpoint = false;
        self.frame_counter = next;
        self.record_position(start + buf.len() as u64);
        Ok(Advance::Recorded {
            checkpoint: has_checkpoint,
        })
    }

    fn replay_next_frame(&mut self) -> Result<Advance, ReplayError> {
        let next = self.frame_counter + 1;
        let frame = match decode_frame(&mut self.stream, self.header.version) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("replay ended after {} frames", self.frame_counter);
                self.end_playback();
                return Ok(Advance::Ended);
            }
            Err(e) if e.ends_log() => {
                log::warn!("replay ended at frame {next}: {e}");
                self.end_playback();
                return Ok(Advance::Ended);
            }
            Err(e) => return Err(e),
        };

        if let Some(cp) = &frame.checkpoint {
            match self.load_checkpoint(cp, next, self.config.apply_checkpoints) {
                Ok(()) => {}
                Err(
                    e @ (ReplayError::UnsupportedScheme { .. } | ReplayError::CoreRejected { .. }),
                ) => {
                    log::warn!("skipping checkpoint at frame {next}: {e}");
                }
                Err(e) if e.ends_log() || matches!(e, ReplayError::Compression { .. }) => {
                    log::warn!("replay ended at frame {next}: {e}");
                    self.end_playback();
                    return Ok(Advance::Ended);
                }
                Err(e) => return Err(e),
            }
        }

        let pos = self.stream.tell()?;
        self.key_events = frame.key_events;
        self.input_events = frame.input_events;
        self.frame_counter = next;
        self.record_position(pos);
        Ok(Advance::Played {
            checkpoint: frame.checkpoint.is_some(),
        })
    }

    fn end_playback(&mut self) {
        self.mode = Mode::Ended;
        self.key_events.clear();
        self.input_events.clear();
    }

    // ── Checkpoints ─────────────────────────────────────────────

    /// Serialize the core into `current`.
    fn capture_state(&mut self) -> Result<(), ReplayError> {
        let size = self.core.serialize_size();
        if self.current.len() != size {
            self.current.resize(size, 0);
        }
        match self.core.serialize(&mut self.current) {
            Some(n) if n <= size => {
                self.current.truncate(n);
                Ok(())
            }
            _ => Err(ReplayError::CoreRejected {
                operation: "serialize",
            }),
        }
    }

    fn capture_checkpoint(&mut self, frame: u64) -> Result<Checkpoint, ReplayError> {
        self.capture_state()?;
        if self.config.raw_checkpoints {
            Ok(Checkpoint::Raw(self.current.clone()))
        } else {
            Ok(Checkpoint::Encoded(self.encode_current(frame)?))
        }
    }

    /// Encode and compress `current` as a checkpoint of `frame`.
    fn encode_current(&mut self, frame: u64) -> Result<EncodedCheckpoint, ReplayError> {
        let started = Instant::now();
        let compression = self.config.compression;
        let encoding = self.config.encoding;
        let (encoded, mut stats) = match encoding {
            Encoding::Raw => {
                let stats = CheckpointStats {
                    frame,
                    state_bytes: self.current.len(),
                    encoded_bytes: self.current.len(),
                    ..CheckpointStats::default()
                };
                (self.current.clone(), stats)
            }
            Encoding::Statestream => {
                let previous = self.previous_valid.then_some(self.previous.as_slice());
                self.codec.encode(&self.current, previous, frame)
            }
        };
        let payload = compression.compress(&encoded)?;

        stats.compressed_bytes = payload.len();
        stats.micros = elapsed_micros(started);
        self.metrics.on_encode(&stats);
        log::debug!(
            "checkpoint {frame}: {} blocks ({} new, {} reused, {} skipped), {} -> {} -> {} bytes in {}us",
            stats.blocks,
            stats.blocks_new,
            stats.blocks_reused,
            stats.blocks_skipped,
            stats.state_bytes,
            stats.encoded_bytes,
            stats.compressed_bytes,
            stats.micros
        );

        let checkpoint = EncodedCheckpoint {
            compression: compression.id(),
            encoding: encoding.id(),
            state_size: size_u32(self.current.len(), "state")?,
            encoded_size: size_u32(encoded.len(), "encoded checkpoint")?,
            payload,
        };
        if encoding == Encoding::Statestream {
            std::mem::swap(&mut self.current, &mut self.previous);
            self.previous_valid = true;
        }
        Ok(checkpoint)
    }

    /// Forget whatever a failed capture of `frame` added to the stores.
    fn discard_capture(&mut self, frame: u64) {
        match frame.checked_sub(1) {
            Some(earlier) => self.codec.remove_after(earlier),
            None => self.codec.clear(),
        }
        self.codec.invalidate();
        self.previous_valid = false;
    }

    /// Load a checkpoint belonging to `frame`. With `apply` false only the
    /// block stores are advanced and the core is left alone.
    fn load_checkpoint(
        &mut self,
        checkpoint: &Checkpoint,
        frame: u64,
        apply: bool,
    ) -> Result<(), ReplayError> {
        let cp = match checkpoint {
            Checkpoint::Raw(state) => return self.apply_state(state, apply),
            Checkpoint::Encoded(cp) => cp,
        };
        let compression = Compression::from_u8(cp.compression)?;
        let encoding = Encoding::from_u8(cp.encoding)?;
        let started = Instant::now();
        let encoded = compression.decompress(&cp.payload, cp.encoded_size as usize)?;

        match encoding {
            Encoding::Raw => {
                if encoded.len() != cp.state_size as usize {
                    return Err(ReplayError::corrupt(format!(
                        "raw checkpoint holds {} bytes, header says {}",
                        encoded.len(),
                        cp.state_size
                    )));
                }
                self.apply_state(&encoded, apply)
            }
            Encoding::Statestream => {
                let size = cp.state_size as usize;
                if self.current.len() != size {
                    self.current.resize(size, 0);
                    self.codec.invalidate();
                }
                let mut stats = self.codec.decode(&encoded, frame, &mut self.current, apply)?;
                stats.compressed_bytes = cp.payload.len();
                stats.micros = elapsed_micros(started);
                self.metrics.on_decode(&stats);
                log::debug!(
                    "checkpoint {frame} decoded: {} new blocks, {} new superblocks in {}us",
                    stats.blocks_new,
                    stats.superblocks_new,
                    stats.micros
                );
                if apply && !self.core.deserialize(&self.current) {
                    return Err(ReplayError::CoreRejected {
                        operation: "deserialize",
                    });
                }
                Ok(())
            }
        }
    }

    fn apply_state(&mut self, state: &[u8], apply: bool) -> Result<(), ReplayError> {
        if apply && !self.core.deserialize(state) {
            return Err(ReplayError::CoreRejected {
                operation: "deserialize",
            });
        }
        Ok(())
    }

    // ── Log start ───────────────────────────────────────────────

    /// Truncate the stream and write the header plus initial checkpoint.
    fn write_log_start(&mut self) -> Result<(), ReplayError> {
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.truncate(0)?;
        self.codec.clear();
        self.previous_valid = false;

        self.capture_state()?;
        let initial = self.encode_current(0)?;
        let mut section = Vec::with_capacity(initial.encoded_len());
        encode_checkpoint_body(&mut section, &initial)?;
        self.header.initial_len = size_u32(section.len(), "initial checkpoint")?;
        self.header.frame_count = 0;

        let mut bytes = Vec::with_capacity(self.header.encoded_len() + section.len());
        encode_header(&mut bytes, &self.header)?;
        bytes.extend_from_slice(&section);
        self.stream.write_all(&bytes)?;

        self.min_pos = self.header.min_offset();
        self.reset_positions();
        self.key_events.clear();
        self.input_events.clear();
        self.rewound_last_tick = false;
        self.skip_checkpoint = false;
        Ok(())
    }

    /// Throw away everything recorded and start over from the core's
    /// current state.
    pub fn reset_recording(&mut self) -> Result<(), ReplayError> {
        if self.mode != Mode::Recording {
            return Err(ReplayError::NotActive);
        }
        self.write_log_start()?;
        log::info!("replay recording restarted");
        Ok(())
    }

    // ── Positions and rewind ────────────────────────────────────

    fn slot(&self, frame: u64) -> usize {
        (frame & (self.frame_pos.len() as u64 - 1)) as usize
    }

    fn reset_positions(&mut self) {
        self.frame_counter = 0;
        self.ring_low = 0;
        self.frame_pos[0] = self.min_pos;
    }

    /// Remember that the current frame ends at `pos`.
    fn record_position(&mut self, pos: u64) {
        let slot = self.slot(self.frame_counter);
        self.frame_pos[slot] = pos;
        let history = self.frame_pos.len() as u64;
        if self.frame_counter >= history {
            self.ring_low = self.ring_low.max(self.frame_counter + 1 - history);
        }
    }

    fn previous_frame_len(&self) -> Result<u32, ReplayError> {
        let Some(before) = self.frame_counter.checked_sub(1) else {
            return Ok(0);
        };
        let end = self.frame_pos[self.slot(self.frame_counter)];
        let start = self.frame_pos[self.slot(before)];
        end.checked_sub(start)
            .and_then(|len| u32::try_from(len).ok())
            .ok_or_else(|| ReplayError::malformed("previous frame offset out of order"))
    }

    fn cut_stream_at(&mut self, pos: u64) -> Result<(), ReplayError> {
        self.stream.truncate(pos)?;
        self.stream.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Offset where `target` ends. With `with_previous` the entry for
    /// `target - 1` is recovered too, so the next recorded frame can
    /// compute its backref. `None` if the offset cannot be recovered.
    fn locate_frame(
        &mut self,
        target: u64,
        with_previous: bool,
    ) -> Result<Option<u64>, ReplayError> {
        if target == 0 {
            self.ring_low = 0;
            self.frame_pos[0] = self.min_pos;
            return Ok(Some(self.min_pos));
        }
        let oldest = if with_previous { target - 1 } else { target };
        while self.ring_low > oldest {
            if !self.step_back()? {
                return Ok(None);
            }
        }
        Ok(Some(self.frame_pos[self.slot(target)]))
    }

    /// Extend the ring one frame into the past using the backref of the
    /// frame following `ring_low`.
    fn step_back(&mut self) -> Result<bool, ReplayError> {
        let low = self.ring_low;
        if low == 0 || !self.header.has_backrefs() {
            return Ok(false);
        }
        let end = self.frame_pos[self.slot(low)];
        self.stream.seek(SeekFrom::Start(end))?;
        let back = match read_u32_le(&mut self.stream, "frame backref") {
            Ok(back) => u64::from(back),
            Err(e) if e.ends_log() => return Ok(false),
            Err(e) => return Err(e),
        };
        if back == 0 || back > end.saturating_sub(self.min_pos) {
            return Ok(false);
        }
        let start = end - back;
        if low == 1 && start != self.min_pos {
            return Ok(false);
        }
        let slot = self.slot(low - 1);
        self.frame_pos[slot] = start;
        self.ring_low = low - 1;
        Ok(true)
    }

    /// Step back one frame.
    ///
    /// While recording, the log is truncated so the next
    /// [`advance_frame`](Self::advance_frame) overwrites the frame that was
    /// rewound over. While playing back, the frame before the current one
    /// is read again so its events are available; consecutive rewinds
    /// therefore step back two frames and replay one.
    ///
    /// Checkpoints added after the new position are dropped from the
    /// block stores.
    pub fn rewind_one_frame(&mut self) -> Result<(), ReplayError> {
        let recording = match self.mode {
            Mode::Idle => return Err(ReplayError::NotActive),
            Mode::Recording => true,
            Mode::Playback | Mode::Ended => false,
        };
        let delta = if !recording && self.rewound_last_tick { 2 } else { 1 };
        self.rewound_last_tick = true;
        self.skip_checkpoint = false;
        self.codec.invalidate();
        self.previous_valid = false;
        self.key_events.clear();
        self.input_events.clear();

        if self.frame_counter == 0 {
            return self.restart_from_beginning();
        }
        let target = self.frame_counter.saturating_sub(delta);
        let Some(pos) = self.locate_frame(target, recording)? else {
            log::info!("rewound past the beginning of the replay at frame {target}");
            return if recording {
                self.reset_recording()
            } else {
                self.restart_from_beginning()
            };
        };

        self.codec.remove_after(target);
        self.frame_counter = target;
        self.stream.seek(SeekFrom::Start(pos))?;
        log::debug!("rewound to frame {target}");
        if recording {
            self.stream.truncate(pos)?;
            Ok(())
        } else {
            self.mode = Mode::Playback;
            self.replay_next_frame().map(|_| ())
        }
    }

    fn restart_from_beginning(&mut self) -> Result<(), ReplayError> {
        self.codec.remove_after(0);
        self.codec.invalidate();
        self.reset_positions();
        self.stream.seek(SeekFrom::Start(self.min_pos))?;
        if self.mode == Mode::Recording {
            self.stream.truncate(self.min_pos)?;
            Ok(())
        } else {
            log::info!("replay restarted from the beginning");
            self.mode = Mode::Playback;
            self.replay_next_frame().map(|_| ())
        }
    }

    /// Rebuild frame bookkeeping by reading frames from the start of the
    /// log up to byte offset `up_to`.
    ///
    /// Checkpoints on the way only advance the block stores; the core is
    /// not touched. Afterwards the stream is positioned after the last
    /// frame read.
    pub fn scan_from_start(&mut self, up_to: u64) -> Result<(), ReplayError> {
        if self.mode == Mode::Idle {
            return Err(ReplayError::NotActive);
        }
        self.codec.remove_after(0);
        self.codec.invalidate();
        self.previous_valid = false;
        self.stream.seek(SeekFrom::Start(self.min_pos))?;
        self.reset_positions();

        let mut pos = self.min_pos;
        while pos < up_to {
            let next = self.frame_counter + 1;
            let frame = match decode_frame(&mut self.stream, self.header.version) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) if e.ends_log() => {
                    log::warn!("scan stopped at frame {next}: {e}");
                    break;
                }
                Err(e) => return Err(e),
            };
            if let Some(cp) = &frame.checkpoint {
                match self.load_checkpoint(cp, next, false) {
                    Ok(()) => {}
                    Err(e @ ReplayError::UnsupportedScheme { .. }) => {
                        log::warn!("skipping checkpoint at frame {next}: {e}");
                    }
                    Err(e) if e.ends_log() || matches!(e, ReplayError::Compression { .. }) => {
                        log::warn!("scan stopped at frame {next}: {e}");
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
            pos = self.stream.tell()?;
            self.frame_counter = next;
            self.record_position(pos);
        }

        let end = self.frame_pos[self.slot(self.frame_counter)];
        self.stream.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    /// Re-read the header and initial checkpoint from the stream, then
    /// scan frames up to `up_to`.
    fn rebuild_index(&mut self, up_to: u64) -> Result<(), ReplayError> {
        self.stream.seek(SeekFrom::Start(0))?;
        let header = decode_header(&mut self.stream)?;
        let section = read_bytes(&mut self.stream, u64::from(header.initial_len), "initial state")?;
        if header.version >= 2
            && (header.block_size as usize != self.codec.block_size()
                || header.superblock_size as usize != self.codec.superblock_size())
        {
            if header.block_size == 0 || header.superblock_size == 0 {
                return Err(ReplayError::corrupt("log header has zero block geometry"));
            }
            self.codec = StateStream::new(header.block_size, header.superblock_size);
        }
        self.header = header;
        self.min_pos = self.header.min_offset();
        self.codec.clear();
        self.previous_valid = false;

        if self.header.version >= 2 {
            let cp = decode_checkpoint_body(&mut section.as_slice())?;
            match self.load_checkpoint(&Checkpoint::Encoded(cp), 0, false) {
                Ok(()) => {}
                Err(e @ ReplayError::UnsupportedScheme { .. }) => {
                    log::warn!("initial checkpoint not indexed: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        self.scan_from_start(up_to)
    }

    // ── Snapshots ───────────────────────────────────────────────

    /// The log from its start up to the end of the current frame.
    pub fn log_bytes(&mut self) -> Result<Vec<u8>, ReplayError> {
        let here = self.stream.tell()?;
        let end = self.frame_pos[self.slot(self.frame_counter)];
        self.stream.seek(SeekFrom::Start(0))?;
        let bytes = read_bytes(&mut self.stream, end, "log");
        self.stream.seek(SeekFrom::Start(here))?;
        bytes
    }

    /// The replay section of a save state: a u32 length followed by the
    /// log up to the current frame, with the header frame counter set to
    /// the current frame.
    pub fn serialize_session_to_bytes(&mut self) -> Result<Vec<u8>, ReplayError> {
        if self.mode == Mode::Idle {
            return Err(ReplayError::NotActive);
        }
        let mut log = self.log_bytes()?;
        if log.len() >= LogHeader::LONG_LEN && self.header.encoded_len() == LogHeader::LONG_LEN {
            let count = u32::try_from(self.frame_counter).unwrap_or(u32::MAX);
            let at = FRAME_COUNT_SLOT * 4;
            log[at..at + 4].copy_from_slice(&count.to_le_bytes());
        }
        let len = size_u32(log.len(), "log")?;
        let mut out = Vec::with_capacity(4 + log.len());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&log);
        Ok(out)
    }

    /// Whether `other`, a complete log image, is on this session's
    /// timeline up to the shorter of the two.
    pub fn same_timeline(&mut self, other: &[u8]) -> Result<bool, ReplayError> {
        let ours = self.log_bytes()?;
        Ok(timeline::same_timeline(&ours, other))
    }

    /// Bring the replay in line with a save state's replay section, as
    /// produced by [`serialize_session_to_bytes`](Self::serialize_session_to_bytes).
    ///
    /// A snapshot on this replay's timeline, no later than the current
    /// frame, moves the session to the snapshot's frame. Anything else is
    /// incompatible: recording refuses it with
    /// [`ReplayError::Incompatible`] (or replaces the log when
    /// `overwrite_on_divergence` is set and the identifiers match), and
    /// playback stops with [`SnapshotLoad::Halted`].
    pub fn load_external_snapshot(&mut self, bytes: &[u8]) -> Result<SnapshotLoad, ReplayError> {
        if self.mode == Mode::Idle {
            return Ok(SnapshotLoad::Ignored);
        }
        let recording = self.mode == Mode::Recording;
        let Some(theirs) = split_snapshot(bytes) else {
            return self.reject(Incompatibility::Unreadable);
        };
        let Ok(their_header) = decode_header(&mut &theirs[..]) else {
            return self.reject(Incompatibility::Unreadable);
        };
        if their_header.identifier != self.header.identifier {
            return self.reject(Incompatibility::IdentifierMismatch);
        }

        let ours = self.log_bytes()?;
        let same = timeline::same_timeline(&ours, theirs);
        let future = theirs.len() > ours.len();
        if !same || future {
            let reason = if same {
                Incompatibility::FutureState
            } else {
                Incompatibility::WrongTimeline
            };
            if recording && self.config.overwrite_on_divergence {
                log::warn!("overwriting replay with external snapshot: {reason}");
                self.stream.seek(SeekFrom::Start(0))?;
                self.stream.truncate(0)?;
                self.stream.write_all(theirs)?;
                self.rebuild_index(theirs.len() as u64)?;
                return Ok(SnapshotLoad::Overwrote);
            }
            return self.reject(reason);
        }

        self.rebuild_index(theirs.len() as u64)?;
        if recording {
            let end = self.frame_pos[self.slot(self.frame_counter)];
            self.stream.truncate(end)?;
        } else {
            self.mode = Mode::Playback;
        }
        self.key_events.clear();
        self.input_events.clear();
        log::info!("replay resumed from snapshot at frame {}", self.frame_counter);
        Ok(SnapshotLoad::Resumed)
    }

    fn reject(&mut self, reason: Incompatibility) -> Result<SnapshotLoad, ReplayError> {
        log::warn!("external snapshot rejected: {reason}");
        if self.mode == Mode::Recording {
            return Err(ReplayError::Incompatible(reason));
        }
        self.mode = Mode::Idle;
        self.key_events.clear();
        self.input_events.clear();
        Ok(SnapshotLoad::Halted(reason))
    }

    // ── Shutdown ────────────────────────────────────────────────

    /// End the session, updating the header frame counter of a recording,
    /// and hand back the stream, core and metrics.
    pub fn finish(mut self) -> Result<(S, C, M), ReplayError> {
        if self.mode == Mode::Recording && self.header.encoded_len() == LogHeader::LONG_LEN {
            let count = u32::try_from(self.frame_counter).unwrap_or(u32::MAX);
            let here = self.stream.tell()?;
            self.stream
                .seek(SeekFrom::Start((FRAME_COUNT_SLOT * 4) as u64))?;
            write_u32_le(&mut self.stream, count)?;
            self.stream.seek(SeekFrom::Start(here))?;
            self.header.frame_count = count;
        }
        self.stream.flush()?;
        log::info!("replay session finished after {} frames", self.frame_counter);
        Ok((self.stream, self.core, self.metrics))
    }
}

fn split_snapshot(bytes: &[u8]) -> Option<&[u8]> {
    let len = u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?) as usize;
    bytes.get(4..4usize.checked_add(len)?)
}

fn size_u32(len: usize, what: &str) -> Result<u32, ReplayError> {
    u32::try_from(len).map_err(|_| ReplayError::malformed(format!("{what} exceeds u32::MAX bytes")))
}

fn elapsed_micros(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::LogReader;
    use reel_test_utils::{key, pad_input, patterned_state, MockCore};
    use std::io::Cursor;

    type Session = ReplaySession<Cursor<Vec<u8>>, MockCore>;

    fn config(interval: u32) -> ReplayConfig {
        ReplayConfig {
            block_size: 16,
            superblock_size: 4,
            ..ReplayConfig::new(interval)
        }
    }

    fn record(core: MockCore, interval: u32) -> Session {
        ReplaySession::begin_recording(Cursor::new(Vec::new()), core, config(interval), 77, 5)
            .unwrap()
    }

    fn play(log: Vec<u8>, interval: u32) -> Session {
        ReplaySession::begin_playback(Cursor::new(log), MockCore::new(vec![]), config(interval))
            .unwrap()
    }

    fn stream_bytes(session: Session) -> Vec<u8> {
        session.finish().unwrap().0.into_inner()
    }

    /// Record `frames` frames, each with one key event and one input event.
    fn record_frames(frames: u32, interval: u32) -> Vec<u8> {
        let mut s = record(MockCore::new(patterned_state(100, 1)), interval);
        for i in 1..=frames {
            assert!(s.push_key_event(key(i)));
            assert!(s.push_input_event(pad_input(0, i as i16)));
            s.advance_frame().unwrap();
        }
        stream_bytes(s)
    }

    #[test]
    fn recording_writes_header_and_initial_state() {
        let log = record_frames(3, 0);
        let reader = LogReader::open(log.as_slice()).unwrap();
        let header = reader.header();
        assert_eq!(header.identifier, 77);
        assert_eq!(header.checksum, 5);
        assert_eq!(header.frame_count, 3);
        assert_eq!(header.block_size, 16);
        assert_eq!(header.superblock_size, 4);
        assert!(matches!(reader.initial(), Checkpoint::Encoded(_)));
        assert_eq!(reader.frames().count(), 3);
    }

    #[test]
    fn playback_returns_recorded_events() {
        let log = record_frames(5, 0);
        let mut s = play(log, 0);
        assert_eq!(s.core().state, patterned_state(100, 1));
        for i in 1..=5u32 {
            assert_eq!(s.advance_frame().unwrap(), Advance::Played { checkpoint: false });
            assert_eq!(s.take_key_events(), vec![key(i)]);
            assert_eq!(s.input_state(0, 1, 0, 0), Some(i as i16));
            assert_eq!(s.input_state(1, 1, 0, 0), None);
        }
        assert_eq!(s.advance_frame().unwrap(), Advance::Ended);
        assert_eq!(s.mode(), Mode::Ended);
        assert_eq!(s.advance_frame().unwrap(), Advance::Ended);
        assert_eq!(s.frame_count(), 5);
    }

    #[test]
    fn repeated_poll_keeps_last_value() {
        let mut s = record(MockCore::new(vec![0; 8]), 0);
        assert!(s.push_input_event(pad_input(3, 1)));
        assert!(s.push_input_event(pad_input(3, -7)));
        assert_eq!(s.input_events().len(), 1);
        assert_eq!(s.input_events()[0].value, -7);
    }

    #[test]
    fn checkpoints_restore_core_state_on_playback() {
        let mut s = record(MockCore::new(patterned_state(64, 9)), 2);
        let mut expected = vec![Vec::new()];
        for i in 1..=4u32 {
            s.core_mut().state[i as usize * 10] ^= 0xFF;
            let advance = s.advance_frame().unwrap();
            assert_eq!(advance, Advance::Recorded { checkpoint: i % 2 == 0 });
            expected.push(s.core().state.clone());
        }
        let log = stream_bytes(s);

        let mut p = play(log, 2);
        let initial = p.core().state.clone();
        assert_eq!(initial, patterned_state(64, 9));
        p.advance_frame().unwrap();
        assert_eq!(p.core().state, initial);
        assert_eq!(p.advance_frame().unwrap(), Advance::Played { checkpoint: true });
        assert_eq!(p.core().state, expected[2]);
        p.advance_frame().unwrap();
        p.advance_frame().unwrap();
        assert_eq!(p.core().state, expected[4]);
        assert_eq!(p.core().deserialize_calls, 3);
    }

    #[test]
    fn checkpoints_not_applied_when_disabled() {
        let mut s = record(MockCore::new(patterned_state(64, 2)), 1);
        s.core_mut().state[0] ^= 1;
        s.advance_frame().unwrap();
        let log = stream_bytes(s);

        let mut cfg = config(1);
        cfg.apply_checkpoints = false;
        let mut p =
            ReplaySession::begin_playback(Cursor::new(log), MockCore::new(vec![]), cfg).unwrap();
        p.advance_frame().unwrap();
        assert_eq!(p.core().state, patterned_state(64, 2));
        assert_eq!(p.core().deserialize_calls, 1);
        assert!(p.state_stream().blocks().len() > 1);
    }

    #[test]
    fn raw_checkpoints_round_trip() {
        let mut cfg = config(1);
        cfg.raw_checkpoints = true;
        let mut s = ReplaySession::begin_recording(
            Cursor::new(Vec::new()),
            MockCore::new(vec![4; 20]),
            cfg.clone(),
            1,
            0,
        )
        .unwrap();
        s.core_mut().state = vec![8; 20];
        s.advance_frame().unwrap();
        let log = stream_bytes(s);

        let mut frames = LogReader::open(log.as_slice()).unwrap().frames();
        let frame = frames.next().unwrap().unwrap();
        assert_eq!(frame.checkpoint, Some(Checkpoint::Raw(vec![8; 20])));

        let mut p =
            ReplaySession::begin_playback(Cursor::new(log), MockCore::new(vec![]), cfg).unwrap();
        assert_eq!(p.core().state, vec![4; 20]);
        p.advance_frame().unwrap();
        assert_eq!(p.core().state, vec![8; 20]);
    }

    #[test]
    fn failed_capture_writes_nothing_and_keeps_events() {
        let mut s = record(MockCore::new(vec![1; 32]), 2);
        s.advance_frame().unwrap();
        let before = s.log_bytes().unwrap();

        s.core_mut().reject_serialize = true;
        assert!(s.push_key_event(key(9)));
        let err = s.advance_frame().unwrap_err();
        assert!(matches!(err, ReplayError::CoreRejected { .. }));
        assert_eq!(s.frame_count(), 1);
        assert_eq!(s.log_bytes().unwrap(), before);

        s.core_mut().reject_serialize = false;
        assert_eq!(s.advance_frame().unwrap(), Advance::Recorded { checkpoint: true });
        let log = stream_bytes(s);
        let frames: Vec<_> = LogReader::open(log.as_slice())
            .unwrap()
            .frames()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].key_events, vec![key(9)]);
        assert!(frames[1].checkpoint.is_some());
    }

    #[test]
    fn recording_continues_past_rejected_capture() {
        let mut s = record(MockCore::new(vec![1; 32]), 2);
        s.advance_frame().unwrap();
        s.core_mut().reject_serialize = true;

        assert!(s.push_key_event(key(2)));
        for _ in 0..3 {
            let err = s.advance_frame().unwrap_err();
            assert!(matches!(err, ReplayError::CoreRejected { .. }));
            assert_eq!(s.frame_count(), 1);
        }
        assert!(s.skip_pending_checkpoint());
        assert_eq!(s.advance_frame().unwrap(), Advance::Recorded { checkpoint: false });
        assert_eq!(s.frame_count(), 2);
        assert_eq!(s.advance_frame().unwrap(), Advance::Recorded { checkpoint: false });

        // The skip covered one frame only; the next due capture runs again.
        assert!(s.advance_frame().is_err());
        s.core_mut().reject_serialize = false;
        s.core_mut().state = vec![6; 32];
        assert_eq!(s.advance_frame().unwrap(), Advance::Recorded { checkpoint: true });
        let log = stream_bytes(s);

        let frames: Vec<_> = LogReader::open(log.as_slice())
            .unwrap()
            .frames()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[1].key_events, vec![key(2)]);
        assert!(frames[1].checkpoint.is_none());
        assert!(frames[3].checkpoint.is_some());

        let mut p = play(log, 2);
        while p.advance_frame().unwrap() != Advance::Ended {}
        assert_eq!(p.frame_count(), 4);
        assert_eq!(p.core().state, vec![6; 32]);
    }

    #[test]
    fn skip_is_refused_outside_recording() {
        let mut p = play(record_frames(1, 0), 0);
        assert!(!p.skip_pending_checkpoint());
    }

    #[test]
    fn rejected_initial_state_fails_to_begin() {
        let mut core = MockCore::new(vec![1; 8]);
        core.reject_serialize = true;
        let result =
            ReplaySession::begin_recording(Cursor::new(Vec::new()), core, config(0), 1, 0);
        assert!(matches!(result, Err(ReplayError::CoreRejected { .. })));
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut cfg = config(0);
        cfg.frame_history = 3;
        let result = ReplaySession::begin_recording(
            Cursor::new(Vec::new()),
            MockCore::new(vec![]),
            cfg,
            1,
            0,
        );
        assert!(matches!(
            result,
            Err(ReplayError::Config(ConfigError::FrameHistory { value: 3 }))
        ));
    }

    #[test]
    fn truncated_log_ends_playback() {
        let mut log = record_frames(3, 0);
        log.pop();
        let mut p = play(log, 0);
        assert!(matches!(p.advance_frame().unwrap(), Advance::Played { .. }));
        assert!(matches!(p.advance_frame().unwrap(), Advance::Played { .. }));
        assert_eq!(p.advance_frame().unwrap(), Advance::Ended);
        assert_eq!(p.frame_count(), 2);
    }

    #[test]
    fn serialized_session_patches_frame_counter() {
        let mut s = record(MockCore::new(vec![3; 40]), 0);
        for _ in 0..3 {
            s.advance_frame().unwrap();
        }
        let bytes = s.serialize_session_to_bytes().unwrap();
        let len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
        assert_eq!(len, bytes.len() - 4);
        assert_eq!(&bytes[4 + 24..4 + 28], &3u32.to_le_bytes());
        assert_eq!(&bytes[4..], stream_bytes(s).as_slice());
    }

    #[test]
    fn rewind_at_start_keeps_initial_state() {
        let mut s = record(MockCore::new(vec![3; 40]), 0);
        let blocks = s.state_stream().blocks().len();
        s.rewind_one_frame().unwrap();
        assert_eq!(s.frame_count(), 0);
        assert_eq!(s.log_bytes().unwrap().len() as u64, s.min_offset());
        assert_eq!(s.state_stream().blocks().len(), blocks);
    }

    #[test]
    fn playback_rewind_replays_previous_frames() {
        let log = record_frames(6, 0);
        let mut p = play(log, 0);
        for _ in 0..4 {
            p.advance_frame().unwrap();
        }
        p.take_key_events();

        p.rewind_one_frame().unwrap();
        assert_eq!(p.frame_count(), 4);
        assert_eq!(p.take_key_events(), vec![key(4)]);
        p.rewind_one_frame().unwrap();
        assert_eq!(p.frame_count(), 3);
        assert_eq!(p.take_key_events(), vec![key(3)]);
        p.rewind_one_frame().unwrap();
        assert_eq!(p.frame_count(), 2);
        assert_eq!(p.take_key_events(), vec![key(2)]);

        p.advance_frame().unwrap();
        assert_eq!(p.frame_count(), 3);
        assert_eq!(p.take_key_events(), vec![key(3)]);
    }

    #[test]
    fn rewind_after_end_resumes_playback() {
        let log = record_frames(2, 0);
        let mut p = play(log, 0);
        while p.advance_frame().unwrap() != Advance::Ended {}
        p.rewind_one_frame().unwrap();
        assert_eq!(p.mode(), Mode::Playback);
        assert_eq!(p.frame_count(), 2);
    }

    #[test]
    fn incompatible_snapshot_halts_playback() {
        let other = {
            let mut s = ReplaySession::begin_recording(
                Cursor::new(Vec::new()),
                MockCore::new(vec![1; 8]),
                config(0),
                999,
                5,
            )
            .unwrap();
            s.serialize_session_to_bytes().unwrap()
        };
        let mut p = play(record_frames(2, 0), 0);
        assert_eq!(
            p.load_external_snapshot(&other).unwrap(),
            SnapshotLoad::Halted(Incompatibility::IdentifierMismatch)
        );
        assert_eq!(p.mode(), Mode::Idle);
        assert!(matches!(p.advance_frame(), Err(ReplayError::NotActive)));
        assert!(matches!(p.rewind_one_frame(), Err(ReplayError::NotActive)));
        assert!(matches!(
            p.serialize_session_to_bytes(),
            Err(ReplayError::NotActive)
        ));
        assert_eq!(p.load_external_snapshot(&other).unwrap(), SnapshotLoad::Ignored);
        assert!(!p.push_key_event(key(1)));
    }

    #[test]
    fn unreadable_snapshot_refused_while_recording() {
        let mut s = record(MockCore::new(vec![1; 8]), 0);
        let err = s.load_external_snapshot(b"\x04\0\0\0junk").unwrap_err();
        assert!(matches!(
            err,
            ReplayError::Incompatible(Incompatibility::Unreadable)
        ));
        let err = s.load_external_snapshot(b"\xff").unwrap_err();
        assert!(matches!(
            err,
            ReplayError::Incompatible(Incompatibility::Unreadable)
        ));
        assert_eq!(s.mode(), Mode::Recording);
    }

    #[test]
    fn reset_recording_starts_over() {
        let mut s = record(MockCore::new(vec![1; 8]), 0);
        s.advance_frame().unwrap();
        s.advance_frame().unwrap();
        s.core_mut().state = vec![2; 8];
        s.reset_recording().unwrap();
        assert_eq!(s.frame_count(), 0);
        let log = stream_bytes(s);

        let p = play(log, 0);
        assert_eq!(p.core().state, vec![2; 8]);
    }
}
