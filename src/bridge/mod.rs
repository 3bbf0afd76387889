// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the public-facing API of the pcmpack library. It sits between a
// chunked array store (which hands over typed N-D chunks or raw little-endian
// buffers) and a `NativeEngine` (which only understands flat interleaved streams).
//
// Data Flow (Encode):
//
//   1. [Codec Facade (PcmCodec)]      -> Receives `&Chunk`
//         |
//         `-> a. `resolver::resolve` turns CodecConfig + registry + capabilities
//         |      into a ResolvedConfig (+ warnings, logged)
//         |
//         `-> b. `framer::frame` -> (ChunkDescriptor, SampleStream)
//         |
//         `-> c. `NativeEngine::encode` -> opaque payload
//
//   2. [Output]                       -> `[ChunkDescriptor][payload]`
//
//
// Data Flow (Decode):
//
//   1. [format::ChunkDescriptor::parse] -> Validates the header; CorruptStream on any
//         |                                inconsistency, before the engine is called
//         `-> `NativeEngine::decode` with the resolved decoding threads
//
//   2. [framer::unframe]              -> Checks the stream against the descriptor and
//                                        rebuilds the typed chunk
//
// ====================================================================================
pub mod codec;
pub mod format;
pub(crate) mod framer;
pub mod stateless_api;

// --- High-Level Stateful API ---
pub use codec::{EncodeReport, PcmCodec};

// --- Low-Level Stateless API (for FFI and testing) ---
pub use stateless_api::{analyze_chunk, decode_chunk, encode_chunk};

// --- Format Constants and Structs ---
pub use format::{ChunkDescriptor, CompressionStats, CHUNK_FORMAT_VERSION, CHUNK_MAGIC};
