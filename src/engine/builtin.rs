//! The pure-Rust engine shipped with the crate.
//!
//! A stream is cut into blocks of at most `MAX_BLOCK_FRAMES` frames. Every
//! (block, channel) pair is one independent job, so jobs can be spread over a
//! worker pool without changing the output bytes.
//!
//! Payload layout (little-endian):
//!
//! ```text
//! magic "PKEN" | format u8 | mode u8 | bits u8 | level u8 | flags u8
//! channels u32 | frames u64 | block_frames u64 | step u64
//! { order u8 | len u32 | bytes[len] }  x  blocks * channels  (block-major)
//! ```
//!
//! `step` is the integer quantization step (1 when lossless). For float
//! streams it holds the kept mantissa bits instead.

use std::io::{Cursor, Read};
use std::num::NonZeroUsize;

use rayon::prelude::*;

use crate::config::NoiseShaping;
use crate::kernels::{leb128, zigzag, zstd};

use super::float;
use super::predictor::{self, Quantizer, SampleRange};
use super::{EngineError, EngineParams, NativeEngine, SampleMode, SampleStream};

/// Version reported by the built-in engine.
pub const BUILTIN_ENGINE_VERSION: &str = "5.8.0";

/// Upper bound on the frames of one block.
pub const MAX_BLOCK_FRAMES: usize = 120_000;

const PAYLOAD_MAGIC: &[u8; 4] = b"PKEN";
const PAYLOAD_FORMAT: u8 = 1;
const PAYLOAD_HEADER_LEN: usize = 37;

const MODE_INT: u8 = 0;
const MODE_FLOAT: u8 = 1;
const FLAG_HYBRID: u8 = 0b0000_0001;

/// The built-in engine. Stateless; every call is independent.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinEngine;

impl NativeEngine for BuiltinEngine {
    fn version(&self) -> String {
        BUILTIN_ENGINE_VERSION.to_string()
    }

    fn encode(
        &self,
        stream: &SampleStream,
        params: &EngineParams,
    ) -> Result<Vec<u8>, EngineError> {
        stream.validate()?;
        let zstd_level = zstd_level_for(params.level)?;
        let channels = u32::try_from(stream.channels).map_err(|_| {
            EngineError::Configuration(format!("{} channels exceeds u32", stream.channels))
        })?;

        let block_frames = block_frames_for(stream.frames);
        let (step, shaping) = match (stream.mode, params.hybrid) {
            (_, None) => (1u64, None),
            (SampleMode::Int { bits }, Some(h)) => (
                Quantizer::step_for(bits, h.target_bits_per_sample) as u64,
                Some(h.noise_shaping),
            ),
            (SampleMode::Float32, Some(h)) => {
                (u64::from(float::keep_bits_for(h.target_bits_per_sample)), None)
            }
        };
        let hybrid = params.hybrid.is_some();

        let jobs = split_jobs(stream, block_frames);
        log_metric!(
            "event" = "engine_encode",
            "jobs" = jobs.len(),
            "block_frames" = block_frames,
            "step" = step,
            "threads" = params.worker_threads.map_or(1, NonZeroUsize::get)
        );

        let level = params.level;
        let mode = stream.mode;
        let records = run_jobs(jobs, params.worker_threads, |job| {
            encode_job(&job, mode, level, zstd_level, hybrid, step, shaping)
        })?;

        let body_len: usize = records.iter().map(|(_, b)| b.len() + 5).sum();
        let mut out = Vec::with_capacity(PAYLOAD_HEADER_LEN + body_len);
        out.extend_from_slice(PAYLOAD_MAGIC);
        out.push(PAYLOAD_FORMAT);
        out.push(match stream.mode {
            SampleMode::Int { .. } => MODE_INT,
            SampleMode::Float32 => MODE_FLOAT,
        });
        out.push(stream.mode.bits());
        out.push(params.level);
        out.push(if hybrid { FLAG_HYBRID } else { 0 });
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&(stream.frames as u64).to_le_bytes());
        out.extend_from_slice(&(block_frames as u64).to_le_bytes());
        out.extend_from_slice(&step.to_le_bytes());

        for (order, bytes) in records {
            let len = u32::try_from(bytes.len()).map_err(|_| {
                EngineError::Kernel(format!("job payload of {} bytes exceeds u32", bytes.len()))
            })?;
            out.push(order);
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    fn decode(
        &self,
        payload: &[u8],
        worker_threads: Option<NonZeroUsize>,
    ) -> Result<SampleStream, EngineError> {
        let header = PayloadHeader::parse(payload)?;
        let mut cursor = Cursor::new(payload);
        cursor.set_position(PAYLOAD_HEADER_LEN as u64);

        // A channelless stream carries no job records whatever its frame count.
        let num_blocks = if header.frames == 0 || header.channels == 0 {
            0
        } else {
            header.frames.div_ceil(header.block_frames)
        };
        let mut jobs =
            Vec::with_capacity(num_blocks.saturating_mul(header.channels).min(payload.len()));
        for block in 0..num_blocks {
            let count = frames_in_block(block, header.block_frames, header.frames);
            for _ in 0..header.channels {
                let order = read_u8(&mut cursor)?;
                let len = read_u32(&mut cursor)? as usize;
                let start = cursor.position() as usize;
                let bytes = payload.get(start..start.saturating_add(len)).ok_or_else(|| {
                    EngineError::MalformedPayload(format!(
                        "job record of {} bytes runs past the payload end",
                        len
                    ))
                })?;
                cursor.set_position((start + len) as u64);
                jobs.push(DecodeJob {
                    order,
                    bytes,
                    count,
                });
            }
        }
        if cursor.position() as usize != payload.len() {
            return Err(EngineError::MalformedPayload(format!(
                "{} trailing bytes after the last job",
                payload.len() - cursor.position() as usize
            )));
        }

        let mode = header.mode;
        let step = header.step;
        let decoded = run_jobs(jobs, worker_threads, |job| decode_job(&job, mode, step))?;

        // `frames * channels` was checked in `PayloadHeader::parse`.
        let channels = header.channels;
        let mut samples = vec![0i32; header.frames * channels];
        let mut jobs_iter = decoded.into_iter();
        for block in 0..num_blocks {
            let first_frame = block * header.block_frames;
            for channel in 0..channels {
                let values = jobs_iter.next().ok_or_else(|| {
                    EngineError::Kernel("job results ended early".to_string())
                })?;
                for (i, v) in values.into_iter().enumerate() {
                    samples[(first_frame + i) * channels + channel] = v;
                }
            }
        }

        Ok(SampleStream {
            mode,
            channels,
            frames: header.frames,
            samples,
        })
    }
}

//==================================================================================
// Payload Header
//==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PayloadHeader {
    mode: SampleMode,
    channels: usize,
    frames: usize,
    block_frames: usize,
    step: i64,
}

impl PayloadHeader {
    fn parse(payload: &[u8]) -> Result<Self, EngineError> {
        if payload.len() < PAYLOAD_HEADER_LEN {
            return Err(EngineError::MalformedPayload(format!(
                "payload is {} bytes, header needs {}",
                payload.len(),
                PAYLOAD_HEADER_LEN
            )));
        }
        let mut cursor = Cursor::new(payload);
        let mut magic = [0u8; 4];
        read_exact(&mut cursor, &mut magic)?;
        if magic != *PAYLOAD_MAGIC {
            return Err(EngineError::MalformedPayload("bad payload magic".into()));
        }
        let format = read_u8(&mut cursor)?;
        if format != PAYLOAD_FORMAT {
            return Err(EngineError::MalformedPayload(format!(
                "unsupported payload format {}",
                format
            )));
        }
        let mode_tag = read_u8(&mut cursor)?;
        let bits = read_u8(&mut cursor)?;
        let mode = match (mode_tag, bits) {
            (MODE_INT, 8 | 16 | 32) => SampleMode::Int { bits },
            (MODE_FLOAT, 32) => SampleMode::Float32,
            _ => {
                return Err(EngineError::MalformedPayload(format!(
                    "unknown sample mode {} with {} bits",
                    mode_tag, bits
                )))
            }
        };
        let level = read_u8(&mut cursor)?;
        zstd_level_for(level).map_err(|_| {
            EngineError::MalformedPayload(format!("unknown level {}", level))
        })?;
        let flags = read_u8(&mut cursor)?;
        if flags & !FLAG_HYBRID != 0 {
            return Err(EngineError::MalformedPayload(format!(
                "unknown flags {:#04x}",
                flags
            )));
        }

        let channels = read_u32(&mut cursor)? as usize;
        let frames = to_usize(read_u64(&mut cursor)?)?;
        let block_frames = to_usize(read_u64(&mut cursor)?)?;
        let step = read_u64(&mut cursor)?;

        if block_frames != block_frames_for(frames) {
            return Err(EngineError::MalformedPayload(format!(
                "block size {} does not match {} frames",
                block_frames, frames
            )));
        }
        frames.checked_mul(channels).ok_or_else(|| {
            EngineError::MalformedPayload(format!(
                "{} frames x {} channels overflows",
                frames, channels
            ))
        })?;

        let step = match mode {
            SampleMode::Int { bits } => {
                let max_step = 1u64 << bits;
                if step == 0 || step > max_step {
                    return Err(EngineError::MalformedPayload(format!(
                        "quantization step {} out of range",
                        step
                    )));
                }
                step as i64
            }
            SampleMode::Float32 => {
                if step > u64::from(float::MANTISSA_BITS) && flags & FLAG_HYBRID != 0 {
                    return Err(EngineError::MalformedPayload(format!(
                        "kept mantissa bits {} out of range",
                        step
                    )));
                }
                1
            }
        };

        Ok(Self {
            mode,
            channels,
            frames,
            block_frames,
            step,
        })
    }
}

//==================================================================================
// Jobs
//==================================================================================

struct EncodeJob {
    block: usize,
    channel: usize,
    samples: Vec<i32>,
}

struct DecodeJob<'a> {
    order: u8,
    bytes: &'a [u8],
    count: usize,
}

/// Block size for a stream: the whole stream, halved until it fits.
fn block_frames_for(frames: usize) -> usize {
    let mut block = frames.max(1);
    while block > MAX_BLOCK_FRAMES {
        block = block.div_ceil(2);
    }
    block
}

fn frames_in_block(block: usize, block_frames: usize, frames: usize) -> usize {
    let start = block * block_frames;
    (frames - start).min(block_frames)
}

/// De-interleaves the stream into per-(block, channel) jobs, block-major.
fn split_jobs(stream: &SampleStream, block_frames: usize) -> Vec<EncodeJob> {
    if stream.frames == 0 || stream.channels == 0 {
        return Vec::new();
    }
    let num_blocks = stream.frames.div_ceil(block_frames);
    let mut jobs = Vec::with_capacity(num_blocks * stream.channels);
    for block in 0..num_blocks {
        let first = block * block_frames;
        let count = frames_in_block(block, block_frames, stream.frames);
        for channel in 0..stream.channels {
            let samples = (first..first + count)
                .map(|frame| stream.samples[frame * stream.channels + channel])
                .collect();
            jobs.push(EncodeJob {
                block,
                channel,
                samples,
            });
        }
    }
    jobs
}

/// Runs `f` over every job, on a dedicated rayon pool when more than one
/// worker is requested. Results keep the job order.
fn run_jobs<J, T, F>(
    jobs: Vec<J>,
    worker_threads: Option<NonZeroUsize>,
    f: F,
) -> Result<Vec<T>, EngineError>
where
    J: Send,
    T: Send,
    F: Fn(J) -> Result<T, EngineError> + Send + Sync,
{
    match worker_threads {
        Some(n) if n.get() > 1 && jobs.len() > 1 => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n.get())
                .build()
                .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
            pool.install(|| jobs.into_par_iter().map(&f).collect())
        }
        _ => jobs.into_iter().map(f).collect(),
    }
}

fn encode_job(
    job: &EncodeJob,
    mode: SampleMode,
    level: u8,
    zstd_level: i32,
    hybrid: bool,
    step: u64,
    shaping: Option<NoiseShaping>,
) -> Result<(u8, Vec<u8>), EngineError> {
    match mode {
        SampleMode::Float32 => {
            let keep = if hybrid { Some(step as u32) } else { None };
            Ok((0, float::encode_job(&job.samples, keep, zstd_level)?))
        }
        SampleMode::Int { bits } => {
            let range = SampleRange::for_bits(bits);
            let order = match level {
                1 => 1,
                2 => 2,
                _ => predictor::choose_order(&job.samples, range),
            };
            let shaping_weight = match shaping {
                None => 0.0,
                Some(NoiseShaping::Fixed(w)) => f64::from(w),
                Some(NoiseShaping::Dynamic) => {
                    let w = predictor::dynamic_shaping_weight(&job.samples);
                    log_metric!(
                        "event" = "dynamic_shaping",
                        "block" = job.block,
                        "channel" = job.channel,
                        "weight" = format!("{:.3}", w)
                    );
                    w
                }
            };
            let quantizer = Quantizer {
                step: step as i64,
                shaping_weight,
            };
            let residuals = predictor::encode_residuals(&job.samples, order, range, quantizer);
            let mapped = zigzag::encode(&residuals);
            let mut packed = Vec::with_capacity(mapped.len());
            leb128::encode(&mapped, &mut packed)?;
            Ok((order, zstd::encode(&packed, zstd_level)?))
        }
    }
}

fn decode_job(job: &DecodeJob<'_>, mode: SampleMode, step: i64) -> Result<Vec<i32>, EngineError> {
    match mode {
        SampleMode::Float32 => float::decode_job(job.bytes, job.count),
        SampleMode::Int { bits } => {
            if job.order > predictor::MAX_ORDER {
                return Err(EngineError::MalformedPayload(format!(
                    "unknown predictor order {}",
                    job.order
                )));
            }
            let packed = zstd::decode(job.bytes)?;
            let mapped = leb128::decode::<u64>(&packed, job.count)?;
            let residuals = zigzag::decode::<i64>(&mapped);
            Ok(predictor::decode_residuals(
                &residuals,
                job.order,
                SampleRange::for_bits(bits),
                step,
            ))
        }
    }
}

/// zstd effort for each compression level.
fn zstd_level_for(level: u8) -> Result<i32, EngineError> {
    match level {
        1 => Ok(1),
        2 => Ok(3),
        3 => Ok(9),
        4 => Ok(19),
        other => Err(EngineError::Configuration(format!(
            "compression level {} is outside 1..=4",
            other
        ))),
    }
}

//==================================================================================
// Byte Reading Helpers
//==================================================================================

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8]) -> Result<(), EngineError> {
    cursor
        .read_exact(buf)
        .map_err(|e| EngineError::MalformedPayload(e.to_string()))
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, EngineError> {
    let mut buf = [0u8; 1];
    read_exact(cursor, &mut buf)?;
    Ok(buf[0])
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, EngineError> {
    let mut buf = [0u8; 4];
    read_exact(cursor, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, EngineError> {
    let mut buf = [0u8; 8];
    read_exact(cursor, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn to_usize(v: u64) -> Result<usize, EngineError> {
    usize::try_from(v).map_err(|_| EngineError::MalformedPayload(format!("{} exceeds usize", v)))
}

//==================================================================================
// Unit Tests
//==================================================================================
