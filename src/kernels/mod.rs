//! Pure, stateless transform kernels used by the built-in engine.
//!
//! Integer jobs run prediction -> `zigzag` -> `leb128` -> `zstd`.
//! Float jobs run `xor_delta` -> `shuffle` -> `zstd`.
//! `bitcast` moves float samples in and out of engine sample words.

pub mod bitcast;
pub mod leb128;
pub mod shuffle;
pub mod xor_delta;
pub mod zigzag;
pub mod zstd;
