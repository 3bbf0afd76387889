// In: src/engine/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Engine Boundary
// ====================================================================================
//
// The adapter never compresses anything itself. It hands a flat, channel-
// interleaved `SampleStream` plus `EngineParams` to a `NativeEngine` and gets
// opaque bytes back; decode goes the other way. The trait is the whole contract:
//
//   version()                       -> self-reported "major.minor.patch" string
//   encode(&SampleStream, &Params)  -> payload bytes
//   decode(&[u8], worker_threads)   -> SampleStream (mode, channels, frames, words)
//
// `BuiltinEngine` is the pure-Rust implementation shipped with the crate. Other
// engines (e.g. a binding to a system library) plug in behind the same trait.
// ====================================================================================

mod builtin;
mod float;
mod predictor;

pub use builtin::{BuiltinEngine, BUILTIN_ENGINE_VERSION, MAX_BLOCK_FRAMES};

use std::num::NonZeroUsize;

use thiserror::Error;

use crate::config::HybridSettings;
use crate::error::PcmpackError;

/// Errors reported by an engine. The adapter passes them through unmodified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("kernel failure: {0}")]
    Kernel(String),

    #[error("worker pool failure: {0}")]
    WorkerPool(String),

    #[error("version query failed: {0}")]
    Version(String),

    /// A message from an external engine, kept as-is.
    #[error("{0}")]
    Reported(String),
}

impl From<PcmpackError> for EngineError {
    fn from(err: PcmpackError) -> Self {
        EngineError::Kernel(err.to_string())
    }
}

/// How the engine interprets the 32-bit sample words of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Signed integers of `bits` width (8, 16 or 32), sign-extended into words.
    Int { bits: u8 },
    /// IEEE-754 single-precision bit patterns (the dedicated float path).
    Float32,
}

impl SampleMode {
    pub fn bits(&self) -> u8 {
        match self {
            SampleMode::Int { bits } => *bits,
            SampleMode::Float32 => 32,
        }
    }
}

/// A flat, channel-interleaved sample stream: `frames` frames of `channels`
/// words each, frame-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleStream {
    pub mode: SampleMode,
    pub channels: usize,
    pub frames: usize,
    pub samples: Vec<i32>,
}

impl SampleStream {
    /// Checks that the word count matches `frames * channels`.
    pub fn validate(&self) -> Result<(), EngineError> {
        let expected = self.frames.checked_mul(self.channels).ok_or_else(|| {
            EngineError::Configuration(format!(
                "{} frames x {} channels overflows",
                self.frames, self.channels
            ))
        })?;
        if self.samples.len() != expected {
            return Err(EngineError::Configuration(format!(
                "stream holds {} samples, expected {} frames x {} channels",
                self.samples.len(),
                self.frames,
                self.channels
            )));
        }
        if let SampleMode::Int { bits } = self.mode {
            if !matches!(bits, 8 | 16 | 32) {
                return Err(EngineError::Configuration(format!(
                    "unsupported integer sample width {}",
                    bits
                )));
            }
        }
        Ok(())
    }
}

/// Parameters of one engine encode call, already resolved by the adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    /// Speed/size trade-off, 1..=4.
    pub level: u8,
    /// `None` is lossless.
    pub hybrid: Option<HybridSettings>,
    /// `None` runs single-threaded.
    pub worker_threads: Option<NonZeroUsize>,
}

/// The call contract every compression engine fulfils.
pub trait NativeEngine: Send + Sync {
    /// The engine's self-reported version, e.g. `"5.6.4"`.
    fn version(&self) -> String;

    fn encode(&self, stream: &SampleStream, params: &EngineParams)
        -> Result<Vec<u8>, EngineError>;

    fn decode(
        &self,
        payload: &[u8],
        worker_threads: Option<NonZeroUsize>,
    ) -> Result<SampleStream, EngineError>;
}
