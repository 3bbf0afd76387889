// In: src/bridge/format.rs

//! Defines the on-disk structure of one encoded chunk.
//! This is the single source of truth for the descriptor that precedes every
//! engine payload: `[ChunkDescriptor][engine payload]`.
//!
//! Descriptor layout (little-endian):
//!
//! ```text
//! magic "PCMK"    4      version u16      2
//! dtype tag u8    1      flags u8         1   bit0 float, bit1 lossy, bit2 dynamic
//! level u8        1      sample bits u8   1
//! rank u16        2
//! target bits f32 4      shaping weight f32 4
//! dims            8 * rank (u64 each)
//! channels u64    8      frames u64       8      payload len u64   8
//! ```

use std::io::{Cursor, Read};

use crate::config::{HybridSettings, NoiseShaping, MAX_LEVEL, MIN_LEVEL};
use crate::error::PcmpackError;
use crate::types::SampleDtype;
use crate::utils::checked_product;

//==================================================================================
// I. Format Constants
//==================================================================================

/// The magic number identifying a pcmpack chunk.
pub const CHUNK_MAGIC: &[u8; 4] = b"PCMK";
/// The version of the chunk descriptor format.
pub const CHUNK_FORMAT_VERSION: u16 = 1;
/// Size of a descriptor for a rank-0 chunk.
pub const MIN_DESCRIPTOR_SIZE: usize = 44;

const FLAG_FLOAT: u8 = 0b001;
const FLAG_LOSSY: u8 = 0b010;
const FLAG_DYNAMIC: u8 = 0b100;
const KNOWN_FLAGS: u8 = FLAG_FLOAT | FLAG_LOSSY | FLAG_DYNAMIC;

//==================================================================================
// II. Chunk Descriptor
//==================================================================================

/// Everything needed to turn an engine stream back into the original chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDescriptor {
    pub dtype: SampleDtype,
    pub shape: Vec<usize>,
    pub channels: usize,
    pub frames: usize,
    pub sample_bits: u8,
    pub float_mode: bool,
    pub level: u8,
    /// Lossy parameters actually applied; `None` for lossless chunks.
    pub hybrid: Option<HybridSettings>,
    pub payload_len: u64,
}

/// `(frames, channels)` for a chunk shape. The leading axis is time; all
/// remaining axes flatten into channels. A scalar is one frame of one channel.
pub fn frame_geometry(shape: &[usize]) -> Option<(usize, usize)> {
    match shape {
        [] => Some((1, 1)),
        [frames] => Some((*frames, 1)),
        [frames, rest @ ..] => checked_product(rest).map(|channels| (*frames, channels)),
    }
}

impl ChunkDescriptor {
    /// Encoded size of this descriptor in bytes.
    pub fn encoded_len(&self) -> usize {
        MIN_DESCRIPTOR_SIZE + 8 * self.shape.len()
    }

    /// Appends the descriptor to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), PcmpackError> {
        let rank = u16::try_from(self.shape.len()).map_err(|_| {
            PcmpackError::InvalidArgument(format!(
                "Chunk rank {} exceeds the format limit",
                self.shape.len()
            ))
        })?;

        let mut flags = 0u8;
        if self.float_mode {
            flags |= FLAG_FLOAT;
        }
        let (target_bits, shaping_weight) = match self.hybrid {
            None => (0.0f32, 0.0f32),
            Some(h) => {
                flags |= FLAG_LOSSY;
                match h.noise_shaping {
                    NoiseShaping::Dynamic => {
                        flags |= FLAG_DYNAMIC;
                        (h.target_bits_per_sample, 0.0)
                    }
                    NoiseShaping::Fixed(w) => (h.target_bits_per_sample, w),
                }
            }
        };

        out.reserve(self.encoded_len());
        out.extend_from_slice(CHUNK_MAGIC);
        out.extend_from_slice(&CHUNK_FORMAT_VERSION.to_le_bytes());
        out.push(self.dtype.tag());
        out.push(flags);
        out.push(self.level);
        out.push(self.sample_bits);
        out.extend_from_slice(&rank.to_le_bytes());
        out.extend_from_slice(&target_bits.to_le_bytes());
        out.extend_from_slice(&shaping_weight.to_le_bytes());
        for &dim in &self.shape {
            out.extend_from_slice(&(dim as u64).to_le_bytes());
        }
        out.extend_from_slice(&(self.channels as u64).to_le_bytes());
        out.extend_from_slice(&(self.frames as u64).to_le_bytes());
        out.extend_from_slice(&self.payload_len.to_le_bytes());
        Ok(())
    }

    /// Parses and validates a descriptor, returning it with the payload that follows.
    /// Every inconsistency is reported as `CorruptStream`.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), PcmpackError> {
        if bytes.len() < MIN_DESCRIPTOR_SIZE {
            return Err(corrupt(format!(
                "Chunk is too small to be valid. Minimum size: {}, got: {}",
                MIN_DESCRIPTOR_SIZE,
                bytes.len()
            )));
        }
        let mut cursor = Cursor::new(bytes);

        let mut magic = [0u8; 4];
        read_exact(&mut cursor, &mut magic)?;
        if magic != *CHUNK_MAGIC {
            return Err(corrupt("Invalid chunk magic number".into()));
        }
        let version = u16::from_le_bytes(read_array(&mut cursor)?);
        if version != CHUNK_FORMAT_VERSION {
            return Err(corrupt(format!(
                "Unsupported chunk version: expected {}, got {}",
                CHUNK_FORMAT_VERSION, version
            )));
        }

        let [tag, flags, level, sample_bits] = read_array::<4>(&mut cursor)?;
        let dtype = SampleDtype::from_tag(tag)?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(corrupt(format!("Unknown descriptor flags {:#04x}", flags)));
        }
        let float_mode = flags & FLAG_FLOAT != 0;
        if float_mode != dtype.is_float() || sample_bits != dtype.bit_width() {
            return Err(corrupt(format!(
                "Sample format (float={}, bits={}) does not match dtype {}",
                float_mode, sample_bits, dtype
            )));
        }
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            return Err(corrupt(format!("Unknown compression level {}", level)));
        }

        let rank = usize::from(u16::from_le_bytes(read_array(&mut cursor)?));
        let target_bits = f32::from_le_bytes(read_array(&mut cursor)?);
        let shaping_weight = f32::from_le_bytes(read_array(&mut cursor)?);
        let hybrid = parse_hybrid(flags, target_bits, shaping_weight, dtype)?;

        if bytes.len() < MIN_DESCRIPTOR_SIZE + 8 * rank {
            return Err(corrupt(format!(
                "Descriptor declares rank {} but the chunk holds only {} bytes",
                rank,
                bytes.len()
            )));
        }
        let mut shape = Vec::with_capacity(rank);
        for _ in 0..rank {
            shape.push(read_usize(&mut cursor)?);
        }
        let channels = read_usize(&mut cursor)?;
        let frames = read_usize(&mut cursor)?;
        let payload_len = u64::from_le_bytes(read_array(&mut cursor)?);

        let (expected_frames, expected_channels) = frame_geometry(&shape)
            .ok_or_else(|| corrupt(format!("Shape {:?} overflows usize", shape)))?;
        checked_product(&shape)
            .ok_or_else(|| corrupt(format!("Shape {:?} overflows usize", shape)))?;
        if channels != expected_channels || frames != expected_frames {
            return Err(corrupt(format!(
                "Descriptor geometry ({} frames x {} channels) does not match shape {:?}",
                frames, channels, shape
            )));
        }

        let header_len = cursor.position() as usize;
        let payload = &bytes[header_len..];
        if payload.len() as u64 != payload_len {
            return Err(corrupt(format!(
                "Payload length mismatch: descriptor says {}, found {}",
                payload_len,
                payload.len()
            )));
        }

        let descriptor = Self {
            dtype,
            shape,
            channels,
            frames,
            sample_bits,
            float_mode,
            level,
            hybrid,
            payload_len,
        };
        Ok((descriptor, payload))
    }
}

fn parse_hybrid(
    flags: u8,
    target_bits: f32,
    shaping_weight: f32,
    dtype: SampleDtype,
) -> Result<Option<HybridSettings>, PcmpackError> {
    if flags & FLAG_LOSSY == 0 {
        if flags & FLAG_DYNAMIC != 0 || target_bits != 0.0 || shaping_weight != 0.0 {
            return Err(corrupt("Lossless chunk carries lossy parameters".into()));
        }
        return Ok(None);
    }
    if !target_bits.is_finite() || target_bits <= 0.0 || target_bits >= f32::from(dtype.bit_width())
    {
        return Err(corrupt(format!("Invalid target bits {} for {}", target_bits, dtype)));
    }
    if !shaping_weight.is_finite() || !(-1.0..=1.0).contains(&shaping_weight) {
        return Err(corrupt(format!("Invalid shaping weight {}", shaping_weight)));
    }
    let noise_shaping = if flags & FLAG_DYNAMIC != 0 {
        NoiseShaping::Dynamic
    } else {
        NoiseShaping::Fixed(shaping_weight)
    };
    Ok(Some(HybridSettings {
        target_bits_per_sample: target_bits,
        noise_shaping,
    }))
}

fn corrupt(msg: String) -> PcmpackError {
    PcmpackError::CorruptStream(msg)
}

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8]) -> Result<(), PcmpackError> {
    cursor.read_exact(buf).map_err(|e| corrupt(e.to_string()))
}

fn read_array<const N: usize>(cursor: &mut Cursor<&[u8]>) -> Result<[u8; N], PcmpackError> {
    let mut buf = [0u8; N];
    read_exact(cursor, &mut buf)?;
    Ok(buf)
}

fn read_usize(cursor: &mut Cursor<&[u8]>) -> Result<usize, PcmpackError> {
    let v = u64::from_le_bytes(read_array(cursor)?);
    usize::try_from(v).map_err(|_| corrupt(format!("Value {} exceeds usize", v)))
}

//==================================================================================
// III. Analysis Output
//==================================================================================

/// The public-facing struct for compression analysis results, returned by `analyze_chunk`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionStats {
    pub header_size: usize,
    pub payload_size: usize,
    pub total_size: usize,
    /// Size of the decoded elements in bytes.
    pub original_size: usize,
    pub original_type: String,
    pub shape: Vec<usize>,
    pub level: u8,
    pub lossless: bool,
}

impl CompressionStats {
    pub fn from_descriptor(descriptor: &ChunkDescriptor) -> Self {
        let header_size = descriptor.encoded_len();
        let payload_size = descriptor.payload_len as usize;
        let elements = checked_product(&descriptor.shape).unwrap_or(0);
        Self {
            header_size,
            payload_size,
            total_size: header_size + payload_size,
            original_size: elements.saturating_mul(descriptor.dtype.byte_width()),
            original_type: descriptor.dtype.to_string(),
            shape: descriptor.shape.clone(),
            level: descriptor.level,
            lossless: descriptor.hybrid.is_none(),
        }
    }

    /// `original_size / total_size`.
    pub fn compression_ratio(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.total_size as f64
    }
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(shape: Vec<usize>, hybrid: Option<HybridSettings>) -> ChunkDescriptor {
        let (frames, channels) = frame_geometry(&shape).unwrap();
        ChunkDescriptor {
            dtype: SampleDtype::Int16,
            shape,
            channels,
            frames,
            sample_bits: 16,
            float_mode: false,
            level: 3,
            hybrid,
            payload_len: 5,
        }
    }

    fn encode(d: &ChunkDescriptor) -> Vec<u8> {
        let mut out = Vec::new();
        d.write_to(&mut out).unwrap();
        out.extend_from_slice(&[9u8; 5]);
        out
    }

    #[test]
    fn test_geometry() {
        assert_eq!(frame_geometry(&[]), Some((1, 1)));
        assert_eq!(frame_geometry(&[7]), Some((7, 1)));
        assert_eq!(frame_geometry(&[7, 2, 3]), Some((7, 6)));
        assert_eq!(frame_geometry(&[0, 4]), Some((0, 4)));
        assert_eq!(frame_geometry(&[3, usize::MAX, 2]), None);
    }

    #[test]
    fn test_parse_returns_payload_and_fields() {
        let d = descriptor(
            vec![10, 2, 2],
            Some(HybridSettings {
                target_bits_per_sample: 5.5,
                noise_shaping: NoiseShaping::Fixed(-0.25),
            }),
        );
        let bytes = encode(&d);
        assert_eq!(bytes.len(), d.encoded_len() + 5);

        let (parsed, payload) = ChunkDescriptor::parse(&bytes).unwrap();
        assert_eq!(parsed, d);
        assert_eq!(payload, &[9u8; 5]);
    }

    #[test]
    fn test_corruptions_are_detected() {
        let d = descriptor(vec![4, 3], None);
        let good = encode(&d);

        let cases: Vec<(&str, Box<dyn Fn(&mut Vec<u8>)>)> = vec![
            ("magic", Box::new(|b: &mut Vec<u8>| b[0] = b'X')),
            ("version", Box::new(|b: &mut Vec<u8>| b[4] = 9)),
            ("dtype tag", Box::new(|b: &mut Vec<u8>| b[6] = 42)),
            ("unknown flag", Box::new(|b: &mut Vec<u8>| b[7] = 0x80)),
            ("float flag", Box::new(|b: &mut Vec<u8>| b[7] = FLAG_FLOAT)),
            ("level", Box::new(|b: &mut Vec<u8>| b[8] = 0)),
            ("bits", Box::new(|b: &mut Vec<u8>| b[9] = 8)),
            ("lossless with weight", Box::new(|b: &mut Vec<u8>| b[16..20].copy_from_slice(&0.5f32.to_le_bytes()))),
            ("channels", Box::new(|b: &mut Vec<u8>| b[36] = 4)),
            ("truncated payload", Box::new(|b: &mut Vec<u8>| {
                b.pop();
            })),
            ("trailing bytes", Box::new(|b: &mut Vec<u8>| b.push(0))),
            ("too short", Box::new(|b: &mut Vec<u8>| b.truncate(20))),
        ];

        for (name, mutate) in cases {
            let mut bytes = good.clone();
            mutate(&mut bytes);
            assert!(
                matches!(ChunkDescriptor::parse(&bytes), Err(PcmpackError::CorruptStream(_))),
                "case '{}' was not rejected",
                name
            );
        }
    }

    #[test]
    fn test_stats_from_descriptor() {
        let d = descriptor(vec![100, 2], None);
        let stats = CompressionStats::from_descriptor(&d);
        assert_eq!(stats.header_size, MIN_DESCRIPTOR_SIZE + 16);
        assert_eq!(stats.payload_size, 5);
        assert_eq!(stats.original_size, 400);
        assert_eq!(stats.original_type, "int16");
        assert!(stats.lossless);
        assert!(stats.compression_ratio() > 1.0);
    }
}
