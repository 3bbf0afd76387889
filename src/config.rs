// In: src/config.rs

//! The single source of truth for pcmpack codec configuration.
//!
//! `CodecConfig` is the per-instance request a caller builds once (from Rust,
//! from a numcodecs-style JSON dict, or from Python keyword arguments).
//! `ResolvedConfig` is what the resolver turns it into for one encode or decode
//! call, after consulting the thread registry and the engine's capabilities.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::PcmpackError;

//==================================================================================
// I. Constants
//==================================================================================

/// The codec identifier used in serialized configurations.
pub const CODEC_ID: &str = "pcmpack";

/// Lowest accepted compression level.
pub const MIN_LEVEL: u8 = 1;
/// Highest accepted compression level.
pub const MAX_LEVEL: u8 = 4;

//==================================================================================
// II. Per-Instance Configuration
//==================================================================================

/// Describes how one codec instance wants its chunks encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CodecConfig {
    /// Compression effort, 1 (fast) to 4 (very high).
    #[serde(default = "default_level")]
    pub level: u8,

    /// `None` is lossless. A value requests lossy (hybrid) quantization to that
    /// effective bit depth and must be below the source dtype's bit width.
    #[serde(default)]
    pub target_bits_per_sample: Option<f32>,

    /// Let the engine choose the noise-shaping filter per block.
    /// Only meaningful when `target_bits_per_sample` is set.
    #[serde(default = "default_true")]
    pub dynamic_noise_shaping: bool,

    /// Fixed noise-shaping weight in [-1, 1], used when dynamic shaping is off.
    #[serde(default)]
    pub shaping_weight: f32,

    /// Worker threads for encoding. `None` defers to the registry, then the engine.
    #[serde(default)]
    pub encoding_threads: Option<usize>,

    /// Worker threads for decoding. `None` defers to the registry, then the engine.
    #[serde(default)]
    pub decoding_threads: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            target_bits_per_sample: None,
            dynamic_noise_shaping: true,
            shaping_weight: 0.0,
            encoding_threads: None,
            decoding_threads: None,
        }
    }
}

impl CodecConfig {
    /// Lossless configuration at the given level.
    pub fn lossless(level: u8) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Lossy configuration at the given level and target bit depth.
    pub fn lossy(level: u8, target_bits_per_sample: f32) -> Self {
        Self {
            level,
            target_bits_per_sample: Some(target_bits_per_sample),
            ..Default::default()
        }
    }

    pub fn with_threads(mut self, encoding: Option<usize>, decoding: Option<usize>) -> Self {
        self.encoding_threads = encoding;
        self.decoding_threads = decoding;
        self
    }

    /// Serializes into a numcodecs-style JSON object carrying the codec `id`.
    pub fn to_json(&self) -> Result<serde_json::Value, PcmpackError> {
        let mut value = serde_json::to_value(self)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("id".to_string(), serde_json::Value::from(CODEC_ID));
        }
        Ok(value)
    }

    /// Parses a numcodecs-style JSON object. A present `id` must be ours.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, PcmpackError> {
        let mut value = value.clone();
        if let serde_json::Value::Object(map) = &mut value {
            if let Some(id) = map.remove("id") {
                if id.as_str() != Some(CODEC_ID) {
                    return Err(PcmpackError::InvalidArgument(format!(
                        "Codec id mismatch: expected '{}', got {}",
                        CODEC_ID, id
                    )));
                }
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

fn default_level() -> u8 {
    2
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

//==================================================================================
// III. Resolved Configuration
//==================================================================================

/// Which of the two registry slots a thread count belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadKind {
    Encoding,
    Decoding,
}

/// A thread count after resolution, together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadSetting {
    /// Given explicitly on the codec instance.
    Instance(NonZeroUsize),
    /// Taken from the process-wide registry default.
    Registry(NonZeroUsize),
    /// Nothing requested; the engine runs with its own default (single-threaded).
    EngineDefault,
}

impl ThreadSetting {
    /// The count handed to the engine, `None` meaning engine default.
    pub fn count(&self) -> Option<NonZeroUsize> {
        match self {
            Self::Instance(n) | Self::Registry(n) => Some(*n),
            Self::EngineDefault => None,
        }
    }

    /// True when more than one worker was requested.
    pub fn is_parallel(&self) -> bool {
        self.count().is_some_and(|n| n.get() > 1)
    }
}

/// Noise shaping applied by the engine under lossy quantization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseShaping {
    /// The engine derives the shaping weight per block.
    Dynamic,
    /// A caller-fixed shaping weight in [-1, 1].
    Fixed(f32),
}

/// Lossy parameters that will actually be applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridSettings {
    pub target_bits_per_sample: f32,
    pub noise_shaping: NoiseShaping,
}

/// The fully resolved, immutable parameter set of one encode or decode call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedConfig {
    pub level: u8,
    /// `None` is lossless.
    pub hybrid: Option<HybridSettings>,
    pub encoding_threads: ThreadSetting,
    pub decoding_threads: ThreadSetting,
}

impl ResolvedConfig {
    pub fn is_lossless(&self) -> bool {
        self.hybrid.is_none()
    }
}
