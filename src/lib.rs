//! This file is the root of the `pcmpack` Rust crate.
//!
//! pcmpack adapts a lossless/lossy PCM-style compression engine to chunked
//! N-dimensional array storage. Its responsibilities here are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`bridge`, `engine`,
//!     `kernels`, ...) and re-exporting the public surface.
//! 2.  Defining the `#[pymodule]` which acts as the main entry point when the
//!     compiled library is imported into Python (feature `python`).

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod kernels;
pub mod registry;
pub mod resolver;
pub mod types;

mod ffi;
pub mod traits;
mod utils;

pub use bridge::{
    analyze_chunk, decode_chunk, encode_chunk, ChunkDescriptor, CompressionStats, EncodeReport,
    PcmCodec,
};
pub use capability::{
    engine_version, supports_dynamic_noise_shaping, supports_multithreading, Capabilities,
    CapabilityWarning, EngineVersion,
};
pub use config::{CodecConfig, ResolvedConfig, ThreadKind, ThreadSetting, CODEC_ID};
pub use engine::{BuiltinEngine, EngineError, NativeEngine};
pub use error::PcmpackError;
pub use registry::{
    get_default_threads, get_num_decoding_threads, get_num_encoding_threads,
    reset_default_threads, reset_num_decoding_threads, reset_num_encoding_threads,
    set_default_threads, set_num_decoding_threads, set_num_encoding_threads, ThreadRegistry,
};
pub use types::{Chunk, SampleDtype};

//==================================================================================
// 2. Python Module Definition
//==================================================================================
#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The `pcmpack` Python module, containing all exposed Rust functions.
#[cfg(feature = "python")]
#[pymodule]
fn pcmpack(m: &Bound<'_, PyModule>) -> PyResult<()> {
    use ffi::python;

    // --- Codec class ---
    m.add_class::<python::PyPcmPack>()?;
    m.add_function(wrap_pyfunction!(python::analyze_chunk_py, m)?)?;

    // --- Thread-count registry ---
    m.add_function(wrap_pyfunction!(python::set_num_encoding_threads, m)?)?;
    m.add_function(wrap_pyfunction!(python::get_num_encoding_threads, m)?)?;
    m.add_function(wrap_pyfunction!(python::reset_num_encoding_threads, m)?)?;
    m.add_function(wrap_pyfunction!(python::set_num_decoding_threads, m)?)?;
    m.add_function(wrap_pyfunction!(python::get_num_decoding_threads, m)?)?;
    m.add_function(wrap_pyfunction!(python::reset_num_decoding_threads, m)?)?;

    // --- Engine capabilities ---
    m.add_function(wrap_pyfunction!(python::engine_version, m)?)?;
    m.add_function(wrap_pyfunction!(python::supports_multithreading, m)?)?;
    m.add_function(wrap_pyfunction!(python::supports_dynamic_noise_shaping, m)?)?;

    // --- Expose the custom error type ---
    m.add(
        "PcmpackError",
        m.py().get_type_bound::<pyo3::exceptions::PyValueError>(),
    )?;

    // --- Expose version string as a module attribute ---
    m.add("__version__", VERSION)?;

    m.add_function(wrap_pyfunction!(python::enable_verbose_logging_py, m)?)?;

    Ok(())
}
