//! On-disk encoding of one chunk buffer.
//!
//! ## Binary Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic bytes `"SCVK"` |
//! | 4 | 1 | Format version (`u8`, currently 1) |
//! | 5 | 2 | Chunk size (`u16`, little-endian) |
//! | 7 | 4 | Run count (`u32`, little-endian) |
//! | 11 | N×8 | Runs: `count: u32 LE`, `word: u32 LE` |

use crate::rle::{RUN_BYTES, RleError, rle_decode_into, rle_encode, rle_from_bytes, rle_to_bytes};

/// Magic bytes identifying a chunk file.
const MAGIC: [u8; 4] = *b"SCVK";

/// Current format version.
const FORMAT_VERSION: u8 = 1;

/// Header length in bytes.
const HEADER_LEN: usize = 11;

/// Errors that can occur while decoding a chunk file.
#[derive(Debug, thiserror::Error)]
pub enum ChunkFileError {
    /// The data does not start with the expected magic bytes.
    #[error("invalid magic bytes")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),
    /// The data is shorter than its header claims.
    #[error("data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
    /// The file was written for a different chunk size.
    #[error("chunk size mismatch: file has {found}, storage uses {expected}")]
    ChunkSizeMismatch {
        /// Chunk size of the reading storage.
        expected: usize,
        /// Chunk size recorded in the file.
        found: usize,
    },
    /// The runs do not cover the chunk exactly.
    #[error(transparent)]
    Rle(#[from] RleError),
}

/// Encodes a chunk buffer.
pub fn encode_chunk(chunk_size: usize, words: &[u32]) -> Vec<u8> {
    let runs = rle_encode(words);
    let mut buf = Vec::with_capacity(HEADER_LEN + runs.len() * RUN_BYTES);
    buf.extend_from_slice(&MAGIC);
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&(chunk_size as u16).to_le_bytes());
    buf.extend_from_slice(&(runs.len() as u32).to_le_bytes());
    buf.extend_from_slice(&rle_to_bytes(&runs));
    buf
}

/// Decodes a chunk file into `out`, which holds `chunk_size³` words.
pub fn decode_chunk(data: &[u8], chunk_size: usize, out: &mut [u32]) -> Result<(), ChunkFileError> {
    if data.len() < 4 || data[0..4] != MAGIC {
        return Err(ChunkFileError::InvalidMagic);
    }
    if data.len() < HEADER_LEN {
        return Err(ChunkFileError::Truncated {
            expected: HEADER_LEN,
            actual: data.len(),
        });
    }
    let version = data[4];
    if version != FORMAT_VERSION {
        return Err(ChunkFileError::UnsupportedVersion(version));
    }
    let found = u16::from_le_bytes([data[5], data[6]]) as usize;
    if found != chunk_size {
        return Err(ChunkFileError::ChunkSizeMismatch {
            expected: chunk_size,
            found,
        });
    }
    let run_count = u32::from_le_bytes([data[7], data[8], data[9], data[10]]) as usize;
    let expected = HEADER_LEN + run_count * RUN_BYTES;
    if data.len() < expected {
        return Err(ChunkFileError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    let runs = rle_from_bytes(&data[HEADER_LEN..], run_count);
    rle_decode_into(&runs, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_sparse_chunk() {
        let mut words = vec![0u32; 64];
        words[0] = 0x0000_FFC8;
        words[63] = 0x0101_0101;
        let bytes = encode_chunk(4, &words);
        assert_eq!(&bytes[0..4], b"SCVK");
        assert_eq!(bytes[4], 1);

        let mut out = vec![0u32; 64];
        decode_chunk(&bytes, 4, &mut out).expect("decode failed");
        assert_eq!(out, words);
    }

    #[test]
    fn test_empty_chunk_is_small() {
        let bytes = encode_chunk(32, &vec![0u32; 32 * 32 * 32]);
        assert_eq!(bytes.len(), HEADER_LEN + RUN_BYTES);
    }

    #[test]
    fn test_corrupted_data_returns_error() {
        let mut out = vec![0u32; 8];

        let result = decode_chunk(&[0xFF, 0xFF], 2, &mut out);
        assert!(matches!(result, Err(ChunkFileError::InvalidMagic)), "{result:?}");

        let result = decode_chunk(b"SCVK\x01\x02", 2, &mut out);
        assert!(matches!(result, Err(ChunkFileError::Truncated { .. })), "{result:?}");

        let result = decode_chunk(b"SCVK\x09\x02\x00\x00\x00\x00\x00", 2, &mut out);
        assert!(
            matches!(result, Err(ChunkFileError::UnsupportedVersion(9))),
            "{result:?}"
        );

        let result = decode_chunk(b"SCVK\x01\x04\x00\x00\x00\x00\x00", 2, &mut out);
        assert!(
            matches!(
                result,
                Err(ChunkFileError::ChunkSizeMismatch {
                    expected: 2,
                    found: 4
                })
            ),
            "{result:?}"
        );

        let result = decode_chunk(b"SCVK\x01\x02\x00\x03\x00\x00\x00", 2, &mut out);
        assert!(matches!(result, Err(ChunkFileError::Truncated { .. })), "{result:?}");
    }

    #[test]
    fn test_short_runs_rejected() {
        let bytes = encode_chunk(2, &[1u32; 4]);
        let mut out = vec![0u32; 8];
        let result = decode_chunk(&bytes, 2, &mut out);
        assert!(matches!(result, Err(ChunkFileError::Rle(_))), "{result:?}");
    }
}
