//! This module contains the pure, stateless kernels for performing
//! XOR delta encoding and decoding.
//!
//! It is the first stage of the engine's floating-point path: applied to the
//! bit patterns of slowly varying floats it leaves mostly-zero high bytes.

use std::ops::BitXor;

/// Performs XOR delta encoding **in-place** on a mutable slice.
pub fn encode_inplace<T>(data: &mut [T])
where
    T: Copy + BitXor<Output = T>,
{
    if data.len() <= 1 {
        return;
    }
    // Iterate backwards for encoding to use original values for calculation.
    for i in (1..data.len()).rev() {
        data[i] = data[i] ^ data[i - 1];
    }
}

/// Reconstructs the original data from an XOR delta stream **in-place**.
pub fn decode_inplace<T>(data: &mut [T])
where
    T: Copy + BitXor<Output = T>,
{
    if data.len() <= 1 {
        return;
    }
    // Iterate forwards to use the newly-decoded values for subsequent XORs.
    for i in 1..data.len() {
        data[i] = data[i] ^ data[i - 1];
    }
}

//==================================================================================
// Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_delta_roundtrip_u32() {
        let original: Vec<u32> = vec![0b1100, 0b1101, 0b1001, 0b1011];
        let mut data = original.clone();
        encode_inplace(&mut data);
        assert_eq!(data, vec![0b1100, 0b0001, 0b0100, 0b0010]);

        decode_inplace(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_xor_delta_empty_and_single() {
        let mut empty: Vec<u32> = vec![];
        encode_inplace(&mut empty);
        assert!(empty.is_empty());

        let mut single = vec![42u32];
        encode_inplace(&mut single);
        decode_inplace(&mut single);
        assert_eq!(single, vec![42]);
    }
}
