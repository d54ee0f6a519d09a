//! Checkpoint compression and encoding schemes.
//!
//! Both are identified on the wire by a single byte. Compression is an
//! opaque transform over the whole encoded payload; which compressors are
//! available depends on the `zlib` and `zstd` cargo features.

use crate::error::{ReplayError, SchemeKind};

/// zlib level used for new checkpoints.
#[cfg(feature = "zlib")]
const ZLIB_LEVEL: u32 = 6;

/// zstd level used for new checkpoints.
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 3;

/// Compressor applied to an encoded checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Compression {
    /// Stored as-is.
    None = 0,
    /// zlib (deflate) stream.
    Zlib = 1,
    /// zstd frame.
    Zstd = 2,
}

impl Compression {
    /// Look up a compression id. Unknown ids are an
    /// [`UnsupportedScheme`](ReplayError::UnsupportedScheme).
    pub fn from_u8(id: u8) -> Result<Self, ReplayError> {
        match id {
            0 => Ok(Self::None),
            1 => Ok(Self::Zlib),
            2 => Ok(Self::Zstd),
            id => Err(ReplayError::UnsupportedScheme {
                kind: SchemeKind::Compression,
                id,
            }),
        }
    }

    /// Wire id.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Whether this build can compress and decompress with this scheme.
    pub fn is_available(self) -> bool {
        match self {
            Self::None => true,
            Self::Zlib => cfg!(feature = "zlib"),
            Self::Zstd => cfg!(feature = "zstd"),
        }
    }

    /// The best scheme compiled into this build: zstd, then zlib, then none.
    pub fn preferred() -> Self {
        if Self::Zstd.is_available() {
            Self::Zstd
        } else if Self::Zlib.is_available() {
            Self::Zlib
        } else {
            Self::None
        }
    }

    fn unsupported(self) -> ReplayError {
        ReplayError::UnsupportedScheme {
            kind: SchemeKind::Compression,
            id: self.id(),
        }
    }

    /// Compress `data`.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, ReplayError> {
        match self {
            Self::None => Ok(data.to_vec()),
            #[cfg(feature = "zlib")]
            Self::Zlib => {
                use std::io::Write;
                let mut enc = flate2::write::ZlibEncoder::new(
                    Vec::with_capacity(data.len() / 2),
                    flate2::Compression::new(ZLIB_LEVEL),
                );
                enc.write_all(data).map_err(compression_error)?;
                enc.finish().map_err(compression_error)
            }
            #[cfg(feature = "zstd")]
            Self::Zstd => zstd::encode_all(data, ZSTD_LEVEL).map_err(compression_error),
            #[allow(unreachable_patterns)]
            other => Err(other.unsupported()),
        }
    }

    /// Decompress `data`, which must expand to exactly `expected_len` bytes.
    ///
    /// Output is capped at `expected_len`: a payload that would expand
    /// further is rejected without being inflated in full.
    pub fn decompress(self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, ReplayError> {
        let out = match self {
            Self::None => {
                if data.len() != expected_len {
                    return Err(length_mismatch(data.len(), expected_len));
                }
                data.to_vec()
            }
            #[cfg(feature = "zlib")]
            Self::Zlib => {
                use std::io::Read;
                let mut out = Vec::with_capacity(expected_len);
                // One byte past the limit tells an over-long stream apart.
                flate2::read::ZlibDecoder::new(data)
                    .take(expected_len as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(compression_error)?;
                if out.len() > expected_len {
                    return Err(ReplayError::corrupt(format!(
                        "decompressed payload exceeds the promised {expected_len} bytes"
                    )));
                }
                out
            }
            #[cfg(feature = "zstd")]
            Self::Zstd => zstd::bulk::decompress(data, expected_len).map_err(compression_error)?,
            #[allow(unreachable_patterns)]
            other => return Err(other.unsupported()),
        };
        if out.len() != expected_len {
            return Err(length_mismatch(out.len(), expected_len));
        }
        Ok(out)
    }
}

fn length_mismatch(found: usize, expected_len: usize) -> ReplayError {
    ReplayError::corrupt(format!(
        "decompressed {found} bytes, header promised {expected_len}"
    ))
}

#[cfg(any(feature = "zlib", feature = "zstd"))]
fn compression_error(e: std::io::Error) -> ReplayError {
    ReplayError::Compression {
        detail: e.to_string(),
    }
}

/// How a checkpoint's state bytes are represented before compression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Encoding {
    /// The full state, verbatim.
    Raw = 0,
    /// A [`StateStream`](crate::StateStream) token stream.
    Statestream = 1,
}

impl Encoding {
    /// Look up an encoding id.
    pub fn from_u8(id: u8) -> Result<Self, ReplayError> {
        match id {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Statestream),
            id => Err(ReplayError::UnsupportedScheme {
                kind: SchemeKind::Encoding,
                id,
            }),
        }
    }

    /// Wire id.
    pub fn id(self) -> u8 {
        self as u8
    }
}
