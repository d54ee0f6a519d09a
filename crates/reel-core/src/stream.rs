//! The byte stream a replay log lives in.
//!
//! [`ReplayStream`] is `Read + Write + Seek` plus truncation, which is the
//! one primitive rewind needs that `std::io` does not model. Implemented
//! for in-memory cursors (tests, snapshots) and files.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};

/// A seekable, truncatable byte stream.
pub trait ReplayStream: Read + Write + Seek {
    /// Cut the stream to `len` bytes. The stream position is left where it
    /// was unless it pointed past the new end, in which case it is clamped.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Current stream position.
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }
}

impl ReplayStream for Cursor<Vec<u8>> {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let len_usize = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds usize"))?;
        self.get_mut().truncate(len_usize);
        if self.position() > len {
            self.set_position(len);
        }
        Ok(())
    }
}

impl ReplayStream for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        if self.stream_position()? > len {
            self.seek(io::SeekFrom::Start(len))?;
        }
        Ok(())
    }
}

impl<S: ReplayStream + ?Sized> ReplayStream for &mut S {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        (**self).truncate(len)
    }
}
