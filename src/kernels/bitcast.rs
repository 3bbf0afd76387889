//! This module contains the pure, stateless kernel for bit-casting float
//! samples to and from the engine's 32-bit sample words.
//!
//! The engine's float mode carries IEEE-754 bit patterns in `i32` words; this
//! is a reinterpretation, never a numeric conversion, so every value
//! (including NaN payloads and signed zeros) survives unchanged.

/// Reinterprets `f32` samples as `i32` sample words.
pub fn f32_to_words(input: &[f32]) -> Vec<i32> {
    bytemuck::cast_slice::<f32, i32>(input).to_vec()
}

/// Reinterprets `i32` sample words as `f32` samples.
pub fn words_to_f32(input: &[i32]) -> Vec<f32> {
    bytemuck::cast_slice::<i32, f32>(input).to_vec()
}

//==================================================================================
// Unit Tests
//==================================================================================
