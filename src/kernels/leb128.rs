//! This module contains the pure, stateless kernels for performing
//! LEB128 (Little-Endian Base 128) variable-length integer encoding and decoding.
//!
//! It packs zig-zag mapped residuals, where most values are small, into one or
//! two bytes each. It is fully panic-free.

use num_traits::{PrimInt, Unsigned};
use std::io::Cursor;

use crate::error::PcmpackError;

//==================================================================================
// 1. Public API for Single-Value Operations
//==================================================================================

/// Encodes a single unsigned integer into a LEB128 byte sequence, writing to a buffer.
pub fn encode_one<T>(value: T, buffer: &mut Vec<u8>) -> Result<(), PcmpackError>
where
    T: PrimInt + Unsigned,
{
    let zero = T::zero();
    let seven_bit_mask = T::from(0x7F).ok_or_else(|| {
        PcmpackError::Leb128DecodeError("Failed to create 7-bit mask for type".to_string())
    })?;

    let mut current_value = value;
    loop {
        let byte = (current_value & seven_bit_mask).to_u8().ok_or_else(|| {
            PcmpackError::Leb128DecodeError("Failed to convert generic integer to u8".to_string())
        })?;
        current_value = current_value >> 7;

        if current_value == zero {
            buffer.push(byte);
            break;
        }
        buffer.push(byte | 0x80);
    }
    Ok(())
}

/// Decodes a single unsigned integer from a LEB128 byte stream cursor.
pub fn decode_one<T>(cursor: &mut Cursor<&[u8]>) -> Result<T, PcmpackError>
where
    T: PrimInt + Unsigned,
{
    let mut result = T::zero();
    let mut shift = 0;
    let total_bits = std::mem::size_of::<T>() * 8;

    loop {
        let pos = cursor.position() as usize;
        let byte = *cursor.get_ref().get(pos).ok_or_else(|| {
            PcmpackError::Leb128DecodeError("Unexpected end of buffer".to_string())
        })?;
        cursor.set_position((pos + 1) as u64);

        if shift >= total_bits {
            return Err(PcmpackError::Leb128DecodeError(
                "Integer overflow during decoding".to_string(),
            ));
        }

        let seven_bit_payload = T::from(byte & 0x7F).ok_or_else(|| {
            PcmpackError::Leb128DecodeError("Failed to create 7-bit payload from byte".to_string())
        })?;
        result = result | (seven_bit_payload << shift);

        if byte & 0x80 == 0 {
            // The last group may not set bits beyond the type's width.
            if shift + 7 > total_bits && (byte >> (total_bits - shift)) > 0 {
                return Err(PcmpackError::Leb128DecodeError(
                    "Integer overflow during decoding".to_string(),
                ));
            }
            return Ok(result);
        }

        shift += 7;
    }
}

//==================================================================================
// 2. Public API for Slice Operations
//==================================================================================

/// Encodes an entire slice, appending to `output_buf`.
pub fn encode<T>(input_slice: &[T], output_buf: &mut Vec<u8>) -> Result<(), PcmpackError>
where
    T: PrimInt + Unsigned,
{
    output_buf.reserve(input_slice.len());
    for &val in input_slice {
        encode_one(val, output_buf)?;
    }
    Ok(())
}

/// Decodes exactly `num_values` integers. Trailing bytes are an error.
pub fn decode<T>(input_bytes: &[u8], num_values: usize) -> Result<Vec<T>, PcmpackError>
where
    T: PrimInt + Unsigned,
{
    let mut values = Vec::with_capacity(num_values.min(input_bytes.len()));
    let mut cursor = Cursor::new(input_bytes);

    for _ in 0..num_values {
        values.push(decode_one::<T>(&mut cursor)?);
    }

    if (cursor.position() as usize) != input_bytes.len() {
        return Err(PcmpackError::Leb128DecodeError(
            "Did not consume entire input buffer. Trailing bytes detected.".to_string(),
        ));
    }

    Ok(values)
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leb128_roundtrip_u32() {
        let original: Vec<u32> = vec![0, 127, 128, 1000, u32::MAX];
        let mut encoded_bytes = Vec::new();
        encode(&original, &mut encoded_bytes).unwrap();
        assert_eq!(&encoded_bytes[..3], &[0x00, 0x7F, 0x80]);
        let decoded = decode::<u32>(&encoded_bytes, original.len()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_truncated_buffer() {
        let mut encoded_bytes = Vec::new();
        encode_one(624485u64, &mut encoded_bytes).unwrap();
        assert_eq!(encoded_bytes, vec![0xE5, 0x8E, 0x26]);

        let result = decode::<u64>(&encoded_bytes[..2], 1);
        assert!(result.unwrap_err().to_string().contains("Unexpected end of buffer"));
    }

    #[test]
    fn test_decode_overflow_error() {
        // This represents a value larger than u64::MAX
        let encoded_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        let result = decode::<u64>(&encoded_bytes, 1);
        if let Err(PcmpackError::Leb128DecodeError(msg)) = result {
            assert!(msg.contains("overflow"));
        } else {
            panic!("Expected Leb128DecodeError for overflow");
        }
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let result = decode::<u32>(&[0x01, 0x02], 1);
        assert!(matches!(result, Err(PcmpackError::Leb128DecodeError(_))));
    }
}
