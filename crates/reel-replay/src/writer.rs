//! Stream-oriented log writer.
//!
//! [`LogWriter`] writes a complete log to any `Write` sink: the header and
//! initial state immediately on construction, then one frame per call.
//! It works in any layout version and is what tooling and tests use to
//! produce logs without a live core; [`ReplaySession`](crate::ReplaySession)
//! writes through the same codec.

use std::io::Write;

use reel_core::{InputEvent, KeyEvent};

use crate::codec::{encode_checkpoint_body, encode_frame, encode_header};
use crate::error::ReplayError;
use crate::types::{Checkpoint, Frame, LogHeader};

/// Writes a replay log to a byte stream.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code can use `BufWriter<File>`.
///
/// # Examples
///
/// ```
/// use reel_core::KeyEvent;
/// use reel_replay::{Checkpoint, LogHeader, LogReader, LogWriter};
///
/// let mut header = LogHeader::new(7, 0, 256, 16, 0);
/// header.version = 1;
/// let initial = Checkpoint::Raw(vec![0u8; 8]);
///
/// let mut writer = LogWriter::new(Vec::new(), &header, &initial).unwrap();
/// let key = KeyEvent { down: true, modifiers: 0, code: 13, character: 13 };
/// writer.write_frame(&[key], &[], None).unwrap();
/// writer.write_frame(&[], &[], None).unwrap();
/// assert_eq!(writer.frames_written(), 2);
/// let log = writer.into_inner();
///
/// let mut reader = LogReader::open(log.as_slice()).unwrap();
/// assert_eq!(reader.header().identifier, 7);
/// assert_eq!(reader.next_frame().unwrap().unwrap().key_events, vec![key]);
/// assert!(reader.next_frame().unwrap().unwrap().key_events.is_empty());
/// assert!(reader.next_frame().unwrap().is_none());
/// ```
pub struct LogWriter<W: Write> {
    writer: W,
    version: u32,
    frames_written: u64,
    bytes_written: u64,
    last_frame_len: u32,
}

impl<W: Write> LogWriter<W> {
    /// Create a writer, immediately writing the header and initial state.
    ///
    /// Version 2 logs need an [`Checkpoint::Encoded`] initial state, older
    /// versions a [`Checkpoint::Raw`] one. `header.initial_len` is filled
    /// in from `initial`.
    pub fn new(
        mut writer: W,
        header: &LogHeader,
        initial: &Checkpoint,
    ) -> Result<Self, ReplayError> {
        let mut section = Vec::new();
        match (header.version >= 2, initial) {
            (true, Checkpoint::Encoded(cp)) => encode_checkpoint_body(&mut section, cp)?,
            (false, Checkpoint::Raw(state)) => section.extend_from_slice(state),
            _ => {
                return Err(ReplayError::malformed(format!(
                    "initial state kind does not match layout version {}",
                    header.version
                )));
            }
        }
        let mut header = header.clone();
        header.initial_len = u32::try_from(section.len())
            .map_err(|_| ReplayError::malformed("initial state exceeds u32::MAX bytes"))?;

        let mut bytes = Vec::with_capacity(header.encoded_len() + section.len());
        encode_header(&mut bytes, &header)?;
        bytes.extend_from_slice(&section);
        writer.write_all(&bytes)?;

        Ok(Self {
            writer,
            version: header.version,
            frames_written: 0,
            bytes_written: bytes.len() as u64,
            last_frame_len: 0,
        })
    }

    /// Record a frame, computing its backref from the previous frame.
    pub fn write_frame(
        &mut self,
        key_events: &[KeyEvent],
        input_events: &[InputEvent],
        checkpoint: Option<Checkpoint>,
    ) -> Result<(), ReplayError> {
        let frame = Frame {
            backref: self.last_frame_len,
            key_events: key_events.to_vec(),
            input_events: input_events.to_vec(),
            checkpoint,
        };
        self.write_raw_frame(&frame)
    }

    /// Write a pre-built frame as-is, including its backref.
    pub fn write_raw_frame(&mut self, frame: &Frame) -> Result<(), ReplayError> {
        let mut buf = Vec::new();
        encode_frame(&mut buf, frame, self.version)?;
        self.writer.write_all(&buf)?;
        self.last_frame_len = u32::try_from(buf.len())
            .map_err(|_| ReplayError::malformed("frame exceeds u32::MAX bytes"))?;
        self.bytes_written += buf.len() as u64;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), ReplayError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Total bytes written, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Consume the writer and return the underlying `Write` sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
