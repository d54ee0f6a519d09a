//! Binary encode/decode for the replay log.
//!
//! All integers are little-endian. A short read anywhere maps to
//! [`ReplayError::TruncatedRead`] naming the structure being read, so
//! playback can tell "the log ran out" apart from real I/O failures.

use std::io::{self, Read, Write};

use reel_core::{InputEvent, KeyEvent};

use crate::error::ReplayError;
use crate::types::*;
use crate::{FORMAT_VERSION, MAGIC};

/// Largest key-event count a frame can hold (the count is one byte).
pub const MAX_KEY_EVENTS: usize = u8::MAX as usize;

/// Largest input-event count a frame can hold (the count is two bytes).
pub const MAX_INPUT_EVENTS: usize = u16::MAX as usize;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), ReplayError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u16.
pub fn write_u16_le(w: &mut dyn Write, v: u16) -> Result<(), ReplayError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), ReplayError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), ReplayError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

fn short_read(e: io::Error, context: &'static str) -> ReplayError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ReplayError::TruncatedRead { context }
    } else {
        ReplayError::Io(e)
    }
}

/// Fill `buf` exactly.
pub fn read_exact(
    r: &mut dyn Read,
    buf: &mut [u8],
    context: &'static str,
) -> Result<(), ReplayError> {
    r.read_exact(buf).map_err(|e| short_read(e, context))
}

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read, context: &'static str) -> Result<u8, ReplayError> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf, context)?;
    Ok(buf[0])
}

/// Read a little-endian u16.
pub fn read_u16_le(r: &mut dyn Read, context: &'static str) -> Result<u16, ReplayError> {
    let mut buf = [0u8; 2];
    read_exact(r, &mut buf, context)?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read, context: &'static str) -> Result<u32, ReplayError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf, context)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read, context: &'static str) -> Result<u64, ReplayError> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf, context)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read exactly `len` bytes.
///
/// The buffer grows with the data actually read, so a corrupt length
/// field cannot force a huge allocation up front.
pub fn read_bytes(
    r: &mut dyn Read,
    len: u64,
    context: &'static str,
) -> Result<Vec<u8>, ReplayError> {
    let mut buf = Vec::with_capacity(len.min(1 << 20) as usize);
    r.take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Err(ReplayError::TruncatedRead { context });
    }
    Ok(buf)
}

// ── Header encode/decode ────────────────────────────────────────

/// Encode a log header in the layout its version calls for.
pub fn encode_header(w: &mut dyn Write, header: &LogHeader) -> Result<(), ReplayError> {
    w.write_all(&MAGIC)?;
    write_u32_le(w, header.version)?;
    write_u32_le(w, header.checksum)?;
    write_u32_le(w, header.initial_len)?;
    write_u64_le(w, header.identifier)?;
    if header.version >= 2 {
        write_u32_le(w, header.frame_count)?;
        write_u32_le(w, header.block_size)?;
        write_u32_le(w, header.superblock_size)?;
        write_u32_le(w, header.checkpoint_interval)?;
    }
    Ok(())
}

/// Decode and validate a log header.
pub fn decode_header(r: &mut dyn Read) -> Result<LogHeader, ReplayError> {
    let mut magic = [0u8; 4];
    read_exact(r, &mut magic, "header magic")?;
    if magic != MAGIC {
        return Err(ReplayError::InvalidMagic);
    }

    let version = read_u32_le(r, "header version")?;
    if version > FORMAT_VERSION {
        return Err(ReplayError::UnsupportedVersion { found: version });
    }

    let mut header = LogHeader {
        version,
        checksum: read_u32_le(r, "header")?,
        initial_len: read_u32_le(r, "header")?,
        identifier: read_u64_le(r, "header")?,
        ..LogHeader::default()
    };
    if version >= 2 {
        header.frame_count = read_u32_le(r, "header")?;
        header.block_size = read_u32_le(r, "header")?;
        header.superblock_size = read_u32_le(r, "header")?;
        header.checkpoint_interval = read_u32_le(r, "header")?;
    }
    Ok(header)
}

// ── Checkpoint encode/decode ────────────────────────────────────

/// Encode an encoded-checkpoint body (no frame tag).
pub fn encode_checkpoint_body(
    w: &mut dyn Write,
    cp: &EncodedCheckpoint,
) -> Result<(), ReplayError> {
    let compressed = u32::try_from(cp.payload.len())
        .map_err(|_| ReplayError::malformed("checkpoint payload exceeds u32::MAX bytes"))?;
    write_u8(w, cp.compression)?;
    write_u8(w, cp.encoding)?;
    write_u32_le(w, cp.state_size)?;
    write_u32_le(w, cp.encoded_size)?;
    write_u32_le(w, compressed)?;
    w.write_all(&cp.payload)?;
    Ok(())
}

/// Decode an encoded-checkpoint body.
pub fn decode_checkpoint_body(r: &mut dyn Read) -> Result<EncodedCheckpoint, ReplayError> {
    let compression = read_u8(r, "checkpoint header")?;
    let encoding = read_u8(r, "checkpoint header")?;
    let state_size = read_u32_le(r, "checkpoint header")?;
    let encoded_size = read_u32_le(r, "checkpoint header")?;
    let compressed = read_u32_le(r, "checkpoint header")?;
    let payload = read_bytes(r, u64::from(compressed), "checkpoint payload")?;
    Ok(EncodedCheckpoint {
        compression,
        encoding,
        state_size,
        encoded_size,
        payload,
    })
}

// ── Frame encode/decode ─────────────────────────────────────────

/// Encode a single frame in the layout of `version`.
///
/// Fails without writing anything if the frame has more events than the
/// count fields can express, or input events in a version 0 log.
pub fn encode_frame(w: &mut dyn Write, frame: &Frame, version: u32) -> Result<(), ReplayError> {
    if frame.key_events.len() > MAX_KEY_EVENTS {
        return Err(ReplayError::malformed(format!(
            "{} key events exceed the per-frame limit of {MAX_KEY_EVENTS}",
            frame.key_events.len()
        )));
    }
    if frame.input_events.len() > MAX_INPUT_EVENTS {
        return Err(ReplayError::malformed(format!(
            "{} input events exceed the per-frame limit of {MAX_INPUT_EVENTS}",
            frame.input_events.len()
        )));
    }
    if version == 0 && !frame.input_events.is_empty() {
        return Err(ReplayError::malformed(
            "layout version 0 cannot store input events",
        ));
    }

    if version >= 2 {
        write_u32_le(w, frame.backref)?;
    }
    write_u8(w, frame.key_events.len() as u8)?;
    for ev in &frame.key_events {
        w.write_all(&ev.to_bytes())?;
    }
    if version >= 1 {
        write_u16_le(w, frame.input_events.len() as u16)?;
        for ev in &frame.input_events {
            w.write_all(&ev.to_bytes())?;
        }
    }
    write_u8(w, frame.tag())?;
    match &frame.checkpoint {
        None => {}
        Some(Checkpoint::Raw(state)) => {
            write_u64_le(w, state.len() as u64)?;
            w.write_all(state)?;
        }
        Some(Checkpoint::Encoded(cp)) => encode_checkpoint_body(w, cp)?,
    }
    Ok(())
}

/// Fill `buf` from `r`, returning `Ok(false)` if the stream was already at
/// EOF and an error if it ended part-way.
fn read_leading(r: &mut dyn Read, buf: &mut [u8]) -> Result<bool, ReplayError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(ReplayError::TruncatedRead {
                    context: "frame start",
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReplayError::Io(e)),
        }
    }
    Ok(true)
}

/// Decode a single frame in the layout of `version`.
///
/// Returns `Ok(None)` on clean EOF (no bytes available), `Ok(Some(frame))`
/// on success, or an error on truncated or corrupt data.
///
/// Version 0 frames are read as key events and a tag only. Logs that
/// store raw 2-byte input values inline in version 0 frames are not
/// supported and will misparse.
pub fn decode_frame(r: &mut dyn Read, version: u32) -> Result<Option<Frame>, ReplayError> {
    let mut frame = Frame::default();

    let key_count = if version >= 2 {
        let mut backref = [0u8; 4];
        if !read_leading(r, &mut backref)? {
            return Ok(None);
        }
        frame.backref = u32::from_le_bytes(backref);
        read_u8(r, "key event count")?
    } else {
        let mut count = [0u8; 1];
        if !read_leading(r, &mut count)? {
            return Ok(None);
        }
        count[0]
    };

    frame.key_events.reserve(key_count as usize);
    for _ in 0..key_count {
        let mut buf = [0u8; KeyEvent::WIRE_SIZE];
        read_exact(r, &mut buf, "key event")?;
        frame.key_events.push(KeyEvent::from_bytes(&buf));
    }

    if version >= 1 {
        let input_count = read_u16_le(r, "input event count")?;
        frame.input_events.reserve(input_count as usize);
        for _ in 0..input_count {
            let mut buf = [0u8; InputEvent::WIRE_SIZE];
            read_exact(r, &mut buf, "input event")?;
            frame.input_events.push(InputEvent::from_bytes(&buf));
        }
    }

    frame.checkpoint = match read_u8(r, "frame tag")? {
        TAG_REGULAR => None,
        TAG_CHECKPOINT_V1 => {
            let size = read_u64_le(r, "raw checkpoint size")?;
            Some(Checkpoint::Raw(read_bytes(r, size, "raw checkpoint")?))
        }
        TAG_CHECKPOINT_V2 => Some(Checkpoint::Encoded(decode_checkpoint_body(r)?)),
        tag => {
            return Err(ReplayError::malformed(format!("unknown frame tag {tag}")));
        }
    };

    Ok(Some(frame))
}
