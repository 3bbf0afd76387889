// In: src/error.rs

//! This module defines the single, unified error type for the entire pcmpack library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum PcmpackError {
    // =========================================================================
    // === High-Level, Semantic Errors (the adapter's public taxonomy)
    // =========================================================================
    /// Bad configuration or arguments. Always raised before the engine is called.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Decode input is inconsistent with its own header or with what the engine returned.
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    /// The engine reported an internal error. The engine's message is kept verbatim.
    #[error("Engine failure: {0}")]
    EngineFailure(#[from] EngineError),

    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error from the Serde JSON library, typically during codec config handling.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// A chunk's element count does not match its declared shape.
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // Manual `From` impl is needed as bytemuck::PodCastError doesn't impl Error

    // =========================================================================
    // === Low-Level Kernel Errors
    // =========================================================================
    #[error("Buffer length mismatch: expected a multiple of {1}, got {0}")]
    BufferMismatch(usize, usize),

    #[error("Zstd operation failed: {0}")]
    ZstdError(String),

    #[error("LEB128 decoding error: {0}")]
    Leb128DecodeError(String),
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for PcmpackError {
    fn from(err: bytemuck::PodCastError) -> Self {
        PcmpackError::PodCast(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<PcmpackError> for pyo3::PyErr {
    fn from(err: PcmpackError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
