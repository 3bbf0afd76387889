// In: src/bridge/codec.rs

//! The stateful codec facade a storage layer holds on to.
//!
//! A `PcmCodec` owns its `CodecConfig`, an engine, the registry it consults for
//! default thread counts and the engine's probed capabilities. Every call
//! resolves the configuration afresh, so registry changes are picked up by
//! existing codecs on their next call.

use std::fmt;
use std::sync::Arc;

use crate::bridge::format::ChunkDescriptor;
use crate::bridge::framer;
use crate::capability::{builtin_capabilities, Capabilities, CapabilityWarning};
use crate::config::CodecConfig;
use crate::engine::{BuiltinEngine, EngineParams, NativeEngine};
use crate::error::PcmpackError;
use crate::registry::{global_registry, ThreadRegistry};
use crate::resolver::{self, Resolution};
use crate::types::{Chunk, SampleDtype};

/// Encoded bytes together with the capability warnings raised while encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeReport {
    pub bytes: Vec<u8>,
    pub warnings: Vec<CapabilityWarning>,
}

pub struct PcmCodec {
    config: CodecConfig,
    engine: Arc<dyn NativeEngine>,
    registry: Arc<ThreadRegistry>,
    capabilities: Capabilities,
}

impl fmt::Debug for PcmCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcmCodec")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl PcmCodec {
    /// A codec on the built-in engine and the process-global registry.
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            engine: Arc::new(BuiltinEngine),
            registry: global_registry(),
            capabilities: builtin_capabilities(),
        }
    }

    /// A codec on an explicit engine and registry. The engine is probed once here.
    pub fn with_engine(
        config: CodecConfig,
        engine: Arc<dyn NativeEngine>,
        registry: Arc<ThreadRegistry>,
    ) -> Result<Self, PcmpackError> {
        let capabilities = Capabilities::probe(engine.as_ref())?;
        Ok(Self {
            config,
            engine,
            registry,
            capabilities,
        })
    }

    /// Builds a codec from a numcodecs-style JSON configuration.
    pub fn from_config(value: &serde_json::Value) -> Result<Self, PcmpackError> {
        Ok(Self::new(CodecConfig::from_json(value)?))
    }

    /// The numcodecs-style JSON configuration of this codec, including its `id`.
    pub fn get_config(&self) -> Result<serde_json::Value, PcmpackError> {
        self.config.to_json()
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Resolves this codec's configuration for a chunk of `dtype`.
    pub fn resolve(&self, dtype: SampleDtype) -> Result<Resolution, PcmpackError> {
        resolver::resolve(&self.config, dtype, &self.registry, &self.capabilities)
    }

    pub fn encode(&self, chunk: &Chunk) -> Result<Vec<u8>, PcmpackError> {
        Ok(self.encode_with_report(chunk)?.bytes)
    }

    /// Encodes `chunk` as `[descriptor][engine payload]`.
    pub fn encode_with_report(&self, chunk: &Chunk) -> Result<EncodeReport, PcmpackError> {
        let Resolution { config, warnings } = self.resolve(chunk.dtype())?;
        emit_warnings(&warnings);

        let (mut descriptor, stream) = framer::frame(chunk, &config)?;
        let params = EngineParams {
            level: config.level,
            hybrid: config.hybrid,
            worker_threads: config.encoding_threads.count(),
        };
        log_metric!(
            "event" = "encode",
            "dtype" = descriptor.dtype,
            "shape" = format!("{:?}", descriptor.shape),
            "level" = config.level,
            "lossless" = config.is_lossless(),
            "threads" = format!("{:?}", config.encoding_threads)
        );

        let payload = self.engine.encode(&stream, &params)?;
        descriptor.payload_len = payload.len() as u64;

        let mut bytes = Vec::with_capacity(descriptor.encoded_len() + payload.len());
        descriptor.write_to(&mut bytes)?;
        bytes.extend_from_slice(&payload);
        Ok(EncodeReport { bytes, warnings })
    }

    /// Encodes a raw little-endian buffer of `dtype` elements with the given shape.
    pub fn encode_bytes(
        &self,
        dtype: SampleDtype,
        shape: &[usize],
        raw: &[u8],
    ) -> Result<Vec<u8>, PcmpackError> {
        let chunk = Chunk::from_bytes(dtype, shape, raw)?;
        self.encode(&chunk)
    }

    /// Decodes bytes produced by [`PcmCodec::encode`]. The descriptor is
    /// validated before the engine sees the payload.
    pub fn decode(&self, bytes: &[u8]) -> Result<Chunk, PcmpackError> {
        let (descriptor, payload) = ChunkDescriptor::parse(bytes)?;
        let (threads, warnings) =
            resolver::resolve_decoding(&self.config, &self.registry, &self.capabilities)?;
        emit_warnings(&warnings);
        log_metric!(
            "event" = "decode",
            "dtype" = descriptor.dtype,
            "payload_len" = descriptor.payload_len,
            "threads" = format!("{:?}", threads)
        );

        let stream = self.engine.decode(payload, threads.count())?;
        framer::unframe(&descriptor, stream)
    }

    /// Decodes into the raw little-endian element bytes a storage layer writes back.
    pub fn decode_to_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, PcmpackError> {
        Ok(self.decode(bytes)?.to_bytes())
    }
}

impl Default for PcmCodec {
    fn default() -> Self {
        Self::new(CodecConfig::default())
    }
}

fn emit_warnings(warnings: &[CapabilityWarning]) {
    for warning in warnings {
        log::warn!("{}", warning);
    }
}
