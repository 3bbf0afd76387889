// In: src/bridge/stateless_api.rs

use crate::bridge::codec::PcmCodec;
use crate::bridge::format::{ChunkDescriptor, CompressionStats};
use crate::config::CodecConfig;
use crate::error::PcmpackError;
use crate::types::Chunk;

/// Encodes a single chunk with a one-off codec on the built-in engine.
pub fn encode_chunk(chunk: &Chunk, config: &CodecConfig) -> Result<Vec<u8>, PcmpackError> {
    PcmCodec::new(config.clone()).encode(chunk)
}

/// Decodes a single chunk. Decoding needs nothing from the encoding config;
/// only the registry's decoding thread default applies.
pub fn decode_chunk(bytes: &[u8]) -> Result<Chunk, PcmpackError> {
    PcmCodec::default().decode(bytes)
}

/// Analyzes an encoded chunk from its descriptor alone, without running the engine.
pub fn analyze_chunk(bytes: &[u8]) -> Result<CompressionStats, PcmpackError> {
    let (descriptor, _) = ChunkDescriptor::parse(bytes)?;
    Ok(CompressionStats::from_descriptor(&descriptor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_analyze_chunk_after_encoding() {
        // 1. Arrange: a smooth two-channel signal.
        let array = Array2::from_shape_fn((512, 2), |(i, c)| {
            ((i as f64 * 0.05 + c as f64).sin() * 8000.0) as i16
        });
        let chunk = Chunk::from(array.into_dyn());

        // 2. Act: encode through the stateless API, then analyze.
        let bytes = encode_chunk(&chunk, &CodecConfig::lossless(3)).unwrap();
        let stats = analyze_chunk(&bytes).unwrap();

        // 3. Assert
        assert_eq!(stats.total_size, bytes.len());
        assert_eq!(stats.header_size + stats.payload_size, stats.total_size);
        assert_eq!(stats.original_type, "int16");
        assert_eq!(stats.shape, vec![512, 2]);
        assert_eq!(stats.original_size, 2048);
        assert_eq!(stats.level, 3);
        assert!(stats.lossless);
        assert!(stats.compression_ratio() > 1.0);

        assert_eq!(decode_chunk(&bytes).unwrap(), chunk);
    }

    #[test]
    fn test_analyze_rejects_garbage() {
        assert!(matches!(
            analyze_chunk(b"not a chunk at all, definitely not one, nope"),
            Err(PcmpackError::CorruptStream(_))
        ));
    }
}
