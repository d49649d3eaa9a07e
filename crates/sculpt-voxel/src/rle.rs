//! Run-length encoding over packed voxel words.
//!
//! Sculpted chunks are dominated by long runs of empty space and solid
//! fill, so `(count, word)` pairs shrink them well before they hit disk.

/// A single run: `count` consecutive copies of `word`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleRun {
    /// Number of consecutive identical words (at least 1).
    pub count: u32,
    /// The packed voxel word.
    pub word: u32,
}

/// Byte length of one encoded run.
pub const RUN_BYTES: usize = 8;

/// Errors that can occur during RLE decoding.
#[derive(Debug, thiserror::Error)]
pub enum RleError {
    /// Decoded length does not match expected length.
    #[error("RLE length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected number of words.
        expected: usize,
        /// Number of words the runs expand to.
        actual: usize,
    },
}

/// Encodes a word slice into runs. An empty input produces no runs.
pub fn rle_encode(words: &[u32]) -> Vec<RleRun> {
    let mut runs: Vec<RleRun> = Vec::new();
    for &word in words {
        match runs.last_mut() {
            Some(run) if run.word == word && run.count < u32::MAX => run.count += 1,
            _ => runs.push(RleRun { count: 1, word }),
        }
    }
    runs
}

/// Expands runs into `out`, which must be exactly as long as the runs.
pub fn rle_decode_into(runs: &[RleRun], out: &mut [u32]) -> Result<(), RleError> {
    let actual: usize = runs.iter().map(|run| run.count as usize).sum();
    if actual != out.len() {
        return Err(RleError::LengthMismatch {
            expected: out.len(),
            actual,
        });
    }
    let mut cursor = 0;
    for run in runs {
        let end = cursor + run.count as usize;
        out[cursor..end].fill(run.word);
        cursor = end;
    }
    Ok(())
}

/// Serializes runs: each is `count: u32 LE` followed by `word: u32 LE`.
pub fn rle_to_bytes(runs: &[RleRun]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(runs.len() * RUN_BYTES);
    for run in runs {
        buf.extend_from_slice(&run.count.to_le_bytes());
        buf.extend_from_slice(&run.word.to_le_bytes());
    }
    buf
}

/// Parses `run_count` runs from `data`. The caller checks the length first.
pub fn rle_from_bytes(data: &[u8], run_count: usize) -> Vec<RleRun> {
    data[..run_count * RUN_BYTES]
        .chunks_exact(RUN_BYTES)
        .map(|bytes| RleRun {
            count: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            word: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
        .collect()
}
