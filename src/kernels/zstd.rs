//! This module contains the pure, stateless kernels for performing
//! Zstandard compression and decompression.
//!
//! This is the final entropy stage of every engine job. It takes a byte buffer
//! already reduced by prediction/XOR and packing, and applies a modern entropy
//! coder. This module is a safe, panic-free wrapper around the `zstd` crate.

use crate::error::PcmpackError;

/// Size of the uncompressed-length prefix written ahead of each frame.
const LEN_PREFIX: usize = 8;

/// Compresses `input_bytes`, prepending the uncompressed size.
pub fn encode(input_bytes: &[u8], level: i32) -> Result<Vec<u8>, PcmpackError> {
    if input_bytes.is_empty() {
        return Ok(Vec::new());
    }

    let mut output_buf = Vec::with_capacity(input_bytes.len() / 2 + LEN_PREFIX);
    output_buf.extend_from_slice(&(input_bytes.len() as u64).to_le_bytes());

    // We use the streaming Encoder, which writes directly to the output buffer.
    let mut encoder = zstd::stream::Encoder::new(&mut output_buf, level)
        .map_err(|e| PcmpackError::ZstdError(e.to_string()))?;
    std::io::Write::write_all(&mut encoder, input_bytes)
        .map_err(|e| PcmpackError::ZstdError(e.to_string()))?;
    // `finish` is essential to finalize the Zstd frame.
    encoder
        .finish()
        .map_err(|e| PcmpackError::ZstdError(e.to_string()))?;

    Ok(output_buf)
}

/// Decompresses a buffer produced by [`encode`], checking the recorded size.
pub fn decode(input_bytes: &[u8]) -> Result<Vec<u8>, PcmpackError> {
    if input_bytes.is_empty() {
        return Ok(Vec::new());
    }

    if input_bytes.len() < LEN_PREFIX {
        return Err(PcmpackError::ZstdError(
            "Input stream too short to contain size header.".to_string(),
        ));
    }
    let (len_bytes, compressed_data) = input_bytes.split_at(LEN_PREFIX);
    let mut len_word = [0u8; LEN_PREFIX];
    len_word.copy_from_slice(len_bytes);
    let uncompressed_len = u64::from_le_bytes(len_word) as usize;

    // Cap the reservation; a corrupt prefix must not trigger a huge allocation.
    let mut decompressed_data =
        Vec::with_capacity(uncompressed_len.min(compressed_data.len().saturating_mul(64)));
    zstd::stream::copy_decode(compressed_data, &mut decompressed_data)
        .map_err(|e| PcmpackError::ZstdError(e.to_string()))?;

    if decompressed_data.len() != uncompressed_len {
        return Err(PcmpackError::ZstdError(format!(
            "Decompressed size does not match header. Expected {}, got {}.",
            uncompressed_len,
            decompressed_data.len()
        )));
    }

    Ok(decompressed_data)
}

//==================================================================================
// Unit Tests
//==================================================================================
