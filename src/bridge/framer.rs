//! Moves chunks in and out of the engine's flat, channel-interleaved streams.
//!
//! The leading axis of a chunk is time (frames) and every remaining axis is
//! flattened into channels. Because `ndarray` iterates in logical row-major
//! order, walking the array yields exactly the frame-major interleaving the
//! engine expects, whatever the array's memory layout.

use ndarray::{ArrayD, IxDyn};

use crate::bridge::format::{frame_geometry, ChunkDescriptor};
use crate::config::ResolvedConfig;
use crate::engine::{SampleMode, SampleStream};
use crate::error::PcmpackError;
use crate::kernels::bitcast;
use crate::types::{Chunk, SampleDtype};

/// Engine sample mode for a dtype.
pub fn sample_mode(dtype: SampleDtype) -> SampleMode {
    match dtype {
        SampleDtype::Float32 => SampleMode::Float32,
        other => SampleMode::Int {
            bits: other.bit_width(),
        },
    }
}

/// Flattens `chunk` into an engine stream plus the descriptor that reverses it.
/// The descriptor's `payload_len` is left at zero for the caller to fill in.
pub fn frame(
    chunk: &Chunk,
    resolved: &ResolvedConfig,
) -> Result<(ChunkDescriptor, SampleStream), PcmpackError> {
    let dtype = chunk.dtype();
    let shape = chunk.shape().to_vec();
    let (frames, channels) = frame_geometry(&shape).ok_or_else(|| {
        PcmpackError::InvalidArgument(format!("Shape {:?} overflows usize", shape))
    })?;

    let samples: Vec<i32> = match chunk {
        Chunk::Int8(a) => a.iter().map(|&v| i32::from(v)).collect(),
        Chunk::Int16(a) => a.iter().map(|&v| i32::from(v)).collect(),
        Chunk::Int32(a) => a.iter().copied().collect(),
        Chunk::Float32(a) => {
            let values: Vec<f32> = a.iter().copied().collect();
            bitcast::f32_to_words(&values)
        }
    };

    let mode = sample_mode(dtype);
    let descriptor = ChunkDescriptor {
        dtype,
        shape,
        channels,
        frames,
        sample_bits: mode.bits(),
        float_mode: dtype.is_float(),
        level: resolved.level,
        hybrid: resolved.hybrid,
        payload_len: 0,
    };
    let stream = SampleStream {
        mode,
        channels,
        frames,
        samples,
    };
    Ok((descriptor, stream))
}

/// Rebuilds the chunk described by `descriptor` from a decoded engine stream.
pub fn unframe(descriptor: &ChunkDescriptor, stream: SampleStream) -> Result<Chunk, PcmpackError> {
    let expected_mode = sample_mode(descriptor.dtype);
    if stream.mode != expected_mode {
        return Err(PcmpackError::CorruptStream(format!(
            "Engine returned {:?} samples, descriptor expects {:?}",
            stream.mode, expected_mode
        )));
    }
    if stream.channels != descriptor.channels || stream.frames != descriptor.frames {
        return Err(PcmpackError::CorruptStream(format!(
            "Engine returned {} frames x {} channels, descriptor expects {} x {}",
            stream.frames, stream.channels, descriptor.frames, descriptor.channels
        )));
    }
    let expected_len = descriptor.channels * descriptor.frames;
    if stream.samples.len() != expected_len {
        return Err(PcmpackError::CorruptStream(format!(
            "Engine returned {} samples, descriptor expects {}",
            stream.samples.len(),
            expected_len
        )));
    }

    let dim = IxDyn(&descriptor.shape);
    let chunk = match descriptor.dtype {
        SampleDtype::Int8 => Chunk::Int8(shaped(dim, narrow::<i8>(stream.samples)?)?),
        SampleDtype::Int16 => Chunk::Int16(shaped(dim, narrow::<i16>(stream.samples)?)?),
        SampleDtype::Int32 => Chunk::Int32(shaped(dim, stream.samples)?),
        SampleDtype::Float32 => {
            Chunk::Float32(shaped(dim, bitcast::words_to_f32(&stream.samples))?)
        }
    };
    Ok(chunk)
}

fn narrow<T: TryFrom<i32>>(words: Vec<i32>) -> Result<Vec<T>, PcmpackError> {
    words
        .into_iter()
        .map(|w| {
            T::try_from(w).map_err(|_| {
                PcmpackError::CorruptStream(format!("Sample {} is out of range for the dtype", w))
            })
        })
        .collect()
}

fn shaped<T>(dim: IxDyn, values: Vec<T>) -> Result<ArrayD<T>, PcmpackError> {
    ArrayD::from_shape_vec(dim, values).map_err(|e| PcmpackError::CorruptStream(e.to_string()))
}

//==================================================================================
// Unit Tests
//==================================================================================
