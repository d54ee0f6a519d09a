//! Structural comparison of two replay logs.
//!
//! Two logs are on the same timeline when their headers agree (ignoring
//! the frame counter) and every frame present in both carries the same
//! events and the same kind of checkpoint. Checkpoint payloads are not
//! compared: equal sizes at the same position are taken as equal state.

use crate::codec::decode_header;
use crate::types::{
    EncodedCheckpoint, LogHeader, FRAME_COUNT_SLOT, TAG_CHECKPOINT_V1, TAG_CHECKPOINT_V2,
    TAG_REGULAR,
};
use reel_core::{InputEvent, KeyEvent};

/// Whether `theirs` and `ours` are the same timeline up to the shorter of
/// the two.
///
/// Both arguments are complete log images starting at the header. Any
/// parse failure, including one log ending inside a frame the other
/// completes, counts as a mismatch.
///
/// # Examples
///
/// ```
/// use reel_replay::{same_timeline, LogHeader, LogWriter, Checkpoint, EncodedCheckpoint};
///
/// let initial = Checkpoint::Encoded(EncodedCheckpoint {
///     compression: 0, encoding: 0, state_size: 0, encoded_size: 0, payload: vec![],
/// });
/// let mut w = LogWriter::new(Vec::new(), &LogHeader::new(1, 0, 4, 4, 0), &initial).unwrap();
/// w.write_frame(&[], &[], None).unwrap();
/// let prefix_len = w.bytes_written() as usize;
/// w.write_frame(&[], &[], None).unwrap();
/// let log = w.into_inner();
///
/// assert!(same_timeline(&log, &log[..prefix_len]));
/// ```
pub fn same_timeline(ours: &[u8], theirs: &[u8]) -> bool {
    let (Ok(header), Ok(other)) = (
        decode_header(&mut &ours[..]),
        decode_header(&mut &theirs[..]),
    ) else {
        log::debug!("timeline check: unreadable header");
        return false;
    };
    let header_len = header.encoded_len();
    if other.encoded_len() != header_len
        || !headers_match(&ours[..header_len], &theirs[..header_len])
    {
        log::debug!("timeline check: headers differ");
        return false;
    }

    let start = header.min_offset().min(usize::MAX as u64) as usize;
    let limit = ours.len().min(theirs.len());
    if start >= limit {
        return true;
    }
    if header.version == 0 {
        return ours[start..limit] == theirs[start..limit];
    }

    let mut a = Cursor { buf: ours, pos: start };
    let mut b = Cursor { buf: theirs, pos: start };
    let mut frame = 0u64;
    while a.pos < limit && b.pos < limit {
        frame += 1;
        if frames_match(&mut a, &mut b, &header) != Some(true) {
            log::debug!("timeline check: logs diverge at frame {frame}");
            return false;
        }
    }
    true
}

fn headers_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() < LogHeader::LONG_LEN {
        return a == b;
    }
    let skip = FRAME_COUNT_SLOT * 4..FRAME_COUNT_SLOT * 4 + 4;
    a[..skip.start] == b[..skip.start] && a[skip.end..] == b[skip.end..]
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.buf.len())?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Some(out)
    }

    fn skip(&mut self, len: u64) -> Option<()> {
        self.take(usize::try_from(len).ok()?).map(|_| ())
    }
}

/// Compare one frame from each log. `None` means one of them ran out.
fn frames_match(a: &mut Cursor<'_>, b: &mut Cursor<'_>, header: &LogHeader) -> Option<bool> {
    if header.has_backrefs() {
        a.take(4)?;
        b.take(4)?;
    }

    let keys = a.take(1)?[0];
    if keys != b.take(1)?[0] {
        return Some(false);
    }
    let len = keys as usize * KeyEvent::WIRE_SIZE;
    if a.take(len)? != b.take(len)? {
        return Some(false);
    }

    if header.version >= 1 {
        let count = a.take(2)?;
        if count != b.take(2)? {
            return Some(false);
        }
        let len = u16::from_le_bytes([count[0], count[1]]) as usize * InputEvent::WIRE_SIZE;
        if a.take(len)? != b.take(len)? {
            return Some(false);
        }
    }

    let tag = a.take(1)?[0];
    if tag != b.take(1)?[0] {
        return Some(false);
    }
    match tag {
        TAG_REGULAR => {}
        TAG_CHECKPOINT_V1 => {
            let size = a.take(8)?;
            if size != b.take(8)? {
                return Some(false);
            }
            let size = u64::from_le_bytes(size.try_into().ok()?);
            a.skip(size)?;
            b.skip(size)?;
        }
        TAG_CHECKPOINT_V2 => {
            let head = a.take(EncodedCheckpoint::HEADER_LEN)?;
            if head != b.take(EncodedCheckpoint::HEADER_LEN)? {
                return Some(false);
            }
            let size = u32::from_le_bytes(head[10..14].try_into().ok()?);
            a.skip(u64::from(size))?;
            b.skip(u64::from(size))?;
        }
        _ => return Some(false),
    }
    Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Checkpoint, Frame};
    use crate::writer::LogWriter;

    fn raw_initial() -> Checkpoint {
        Checkpoint::Encoded(EncodedCheckpoint {
            compression: 0,
            encoding: 0,
            state_size: 4,
            encoded_size: 4,
            payload: vec![1, 2, 3, 4],
        })
    }

    fn input(id: u16, value: i16) -> InputEvent {
        InputEvent {
            port: 0,
            device: 1,
            index: 0,
            id,
            value,
        }
    }

    fn build(values: &[i16]) -> (Vec<u8>, Vec<usize>) {
        let header = LogHeader::new(42, 7, 4, 4, 0);
        let mut w = LogWriter::new(Vec::new(), &header, &raw_initial()).unwrap();
        let mut ends = vec![w.bytes_written() as usize];
        for (i, &v) in values.iter().enumerate() {
            let cp = (i % 3 == 2).then(|| Checkpoint::Raw(vec![v as u8; 4]));
            w.write_frame(&[], &[input(0, v)], cp).unwrap();
            ends.push(w.bytes_written() as usize);
        }
        (w.into_inner(), ends)
    }

    #[test]
    fn reflexive_on_every_frame_prefix() {
        let (log, ends) = build(&[1, 2, 3, 4, 5, 6, 7]);
        for &end in &ends {
            assert!(same_timeline(&log, &log[..end]), "prefix ending at {end}");
            assert!(same_timeline(&log[..end], &log));
        }
    }

    #[test]
    fn ignores_frame_counter() {
        let (log, _) = build(&[1, 2]);
        let mut other = log.clone();
        other[FRAME_COUNT_SLOT * 4] = 99;
        assert!(same_timeline(&log, &other));
    }

    #[test]
    fn different_identifier_is_different_timeline() {
        let (log, _) = build(&[1]);
        let mut other = log.clone();
        other[16] ^= 1;
        assert!(!same_timeline(&log, &other));
    }

    #[test]
    fn flipped_input_detected_at_that_frame() {
        let (log, ends) = build(&[1, 2, 3, 4, 5]);
        let k = 2;
        let mut other = log[..ends[k]].to_vec();
        // Last byte of frame k's input value, before the tag.
        let at = ends[k] - 2;
        other[at] ^= 0x40;
        assert!(!same_timeline(&log, &other));
        // Frames before k still agree.
        assert!(same_timeline(&log, &other[..ends[k - 1]]));
    }

    #[test]
    fn checkpoint_payloads_are_not_compared() {
        let (log, ends) = build(&[1, 2, 3]);
        let mut other = log.clone();
        // Last byte of frame 3's raw checkpoint payload.
        other[ends[3] - 1] ^= 0xFF;
        assert!(same_timeline(&log, &other));
    }

    #[test]
    fn different_frame_kind_detected() {
        let header = LogHeader::new(1, 0, 4, 4, 0);
        let mut a = LogWriter::new(Vec::new(), &header, &raw_initial()).unwrap();
        let mut b = LogWriter::new(Vec::new(), &header, &raw_initial()).unwrap();
        a.write_frame(&[], &[], None).unwrap();
        b.write_raw_frame(&Frame {
            checkpoint: Some(Checkpoint::Raw(vec![])),
            ..Frame::default()
        })
        .unwrap();
        assert!(!same_timeline(&a.into_inner(), &b.into_inner()));
    }

    #[test]
    fn version_zero_compares_bytes() {
        let mut header = LogHeader::new(5, 0, 0, 0, 0);
        header.version = 0;
        let initial = Checkpoint::Raw(vec![9; 3]);
        let key = KeyEvent {
            down: true,
            ..KeyEvent::default()
        };
        let mut w = LogWriter::new(Vec::new(), &header, &initial).unwrap();
        w.write_frame(&[key], &[], None).unwrap();
        w.write_frame(&[], &[], None).unwrap();
        let log = w.into_inner();
        assert!(same_timeline(&log, &log[..log.len() - 1]));
        let mut other = log.clone();
        let last = other.len() - 1;
        other[last] = 0;
        assert!(!same_timeline(&log, &other));
    }

    #[test]
    fn garbage_is_not_a_timeline() {
        let (log, _) = build(&[1]);
        assert!(!same_timeline(&log, b"nope"));
        assert!(!same_timeline(&[], &log));
    }
}
