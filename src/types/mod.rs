//! This module defines the core, strongly-typed data representations used
//! throughout pcmpack.
//!
//! It includes the `SampleDtype` enum describing what a chunk carries, and the
//! `Chunk` container the storage layer hands to the codec.

pub mod chunk;
pub mod sample_dtype;

// Re-export the main type(s) for easier access.
pub use chunk::Chunk;
pub use sample_dtype::SampleDtype;
