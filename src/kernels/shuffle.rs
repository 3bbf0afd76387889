//! This module contains the pure, stateless kernel for performing
//! byte-shuffling on streams of fixed-width primitive types.
//!
//! It reorganizes a row-oriented byte stream into a "byte-plane" layout so the
//! entropy stage sees the (mostly constant) high bytes of float words next to
//! each other. This module is PURE RUST, panic-free, and uses `bytemuck`.

use crate::error::PcmpackError;

//==================================================================================
// 1. Generic Core Logic
//==================================================================================

/// Performs byte-shuffling on a slice of plain-old-data values.
pub fn encode<T>(input_slice: &[T]) -> Vec<u8>
where
    T: bytemuck::Pod,
{
    let bytes: &[u8] = bytemuck::cast_slice(input_slice);
    let element_size = std::mem::size_of::<T>();
    if element_size <= 1 {
        return bytes.to_vec();
    }

    let num_elements = input_slice.len();
    let mut output_buf = vec![0u8; bytes.len()];
    for (j, element) in bytes.chunks_exact(element_size).enumerate() {
        for (i, &byte) in element.iter().enumerate() {
            output_buf[i * num_elements + j] = byte;
        }
    }
    output_buf
}

/// Reverses [`encode`], producing typed values.
pub fn decode<T>(input_bytes: &[u8]) -> Result<Vec<T>, PcmpackError>
where
    T: bytemuck::Pod,
{
    let element_size = std::mem::size_of::<T>();
    if input_bytes.len() % element_size != 0 {
        return Err(PcmpackError::BufferMismatch(input_bytes.len(), element_size));
    }

    let num_elements = input_bytes.len() / element_size;
    let mut values = vec![T::zeroed(); num_elements];
    let out: &mut [u8] = bytemuck::cast_slice_mut(&mut values);

    for i in 0..element_size {
        for j in 0..num_elements {
            out[j * element_size + i] = input_bytes[i * num_elements + j];
        }
    }

    Ok(values)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_layout_u32() {
        let original: Vec<u32> = vec![0x0403_0201, 0x0807_0605];
        let shuffled = encode(&original);
        assert_eq!(shuffled, vec![0x01, 0x05, 0x02, 0x06, 0x03, 0x07, 0x04, 0x08]);
        assert_eq!(decode::<u32>(&shuffled).unwrap(), original);
    }

    #[test]
    fn test_unshuffle_rejects_partial_elements() {
        let result = decode::<u32>(&[1, 2, 3, 4, 5]);
        assert!(matches!(result, Err(PcmpackError::BufferMismatch(5, 4))));
    }
}
