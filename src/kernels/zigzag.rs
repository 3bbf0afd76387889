//! This module contains the pure, stateless kernels for performing Zig-zag
//! encoding and decoding of prediction residuals.
//!
//! It is a lossless, bitwise mapping of signed integers to unsigned integers so
//! that the following LEB128 stage spends few bytes on small residuals of
//! either sign.

use crate::traits::ZigZag;

/// Maps every signed value to its zig-zag unsigned form.
pub fn encode<T>(input_slice: &[T]) -> Vec<T::Unsigned>
where
    T: ZigZag + Copy,
{
    input_slice.iter().map(|&v| v.zigzag()).collect()
}

/// Inverse of [`encode`].
pub fn decode<T>(input_slice: &[T::Unsigned]) -> Vec<T>
where
    T: ZigZag,
    T::Unsigned: Copy,
{
    input_slice.iter().map(|&v| T::unzigzag(v)).collect()
}

//==================================================================================
// Unit Tests
//==================================================================================
