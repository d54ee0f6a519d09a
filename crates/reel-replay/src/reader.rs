//! Log reader.
//!
//! [`LogReader`] reads frames from any `Read` source. The header and the
//! initial-state section are read and validated on construction.

use std::io::Read;

use crate::codec::{decode_checkpoint_body, decode_frame, decode_header, read_bytes};
use crate::error::ReplayError;
use crate::types::{Checkpoint, Frame, LogHeader};

/// Reads a replay log from a byte stream.
///
/// Generic over `R: Read` so tests can use `&[u8]` and production
/// code can use `BufReader<File>`.
pub struct LogReader<R: Read> {
    reader: R,
    header: LogHeader,
    initial: Checkpoint,
    frames_read: u64,
}

impl<R: Read> LogReader<R> {
    /// Open a log, reading the header and the initial-state section.
    pub fn open(mut reader: R) -> Result<Self, ReplayError> {
        let header = decode_header(&mut reader)?;
        let section = read_bytes(&mut reader, u64::from(header.initial_len), "initial state")?;
        let initial = if header.version >= 2 {
            let mut body = section.as_slice();
            let cp = decode_checkpoint_body(&mut body)?;
            if !body.is_empty() {
                return Err(ReplayError::corrupt(format!(
                    "{} trailing bytes after initial checkpoint",
                    body.len()
                )));
            }
            Checkpoint::Encoded(cp)
        } else {
            Checkpoint::Raw(section)
        };
        Ok(Self {
            reader,
            header,
            initial,
            frames_read: 0,
        })
    }

    /// The log header.
    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    /// The initial state: encoded for version 2 logs, raw before that.
    pub fn initial(&self) -> &Checkpoint {
        &self.initial
    }

    /// Read the next frame, or `None` if the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ReplayError> {
        let frame = decode_frame(&mut self.reader, self.header.version)?;
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    /// Number of frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Convert into a frame iterator.
    pub fn frames(self) -> FrameIter<R> {
        FrameIter {
            reader: self.reader,
            version: self.header.version,
            frames_read: self.frames_read,
            done: false,
        }
    }
}

/// Iterator adapter over log frames.
///
/// Yields one `Err` and then stops if a frame fails to decode.
pub struct FrameIter<R: Read> {
    reader: R,
    version: u32,
    frames_read: u64,
    done: bool,
}

impl<R: Read> FrameIter<R> {
    /// Number of frames yielded so far, counting frames read before the
    /// conversion.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl<R: Read> Iterator for FrameIter<R> {
    type Item = Result<Frame, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match decode_frame(&mut self.reader, self.version) {
            Ok(Some(frame)) => {
                self.frames_read += 1;
                Some(Ok(frame))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
