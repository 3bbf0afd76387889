//! The engine's dedicated single-precision path.
//!
//! Lossless float jobs are XOR-delta coded on their bit patterns, byte-shuffled
//! and handed to zstd. Lossy float jobs first round every finite value's
//! mantissa to a reduced number of bits; the rest of the path is unchanged.

use crate::kernels::{shuffle, xor_delta, zstd};

use super::EngineError;

/// Explicit mantissa bits of an IEEE-754 single.
pub(crate) const MANTISSA_BITS: u32 = 23;

const EXPONENT_MASK: u32 = 0x7F80_0000;

/// Mantissa bits kept for a lossy target of `target_bits` effective bits.
/// Sign and exponent take nine bits of the budget.
pub(crate) fn keep_bits_for(target_bits: f32) -> u32 {
    let keep = (f64::from(target_bits).floor() - 9.0).clamp(0.0, f64::from(MANTISSA_BITS));
    keep as u32
}

/// Rounds one float bit pattern to `keep` mantissa bits, half up.
/// NaN and infinities pass through; a value that would round up to infinity
/// is truncated instead.
#[inline]
pub(crate) fn round_mantissa(word: u32, keep: u32) -> u32 {
    if keep >= MANTISSA_BITS || word & EXPONENT_MASK == EXPONENT_MASK {
        return word;
    }
    let drop = MANTISSA_BITS - keep;
    let mask = (1u32 << drop) - 1;
    let truncated = word & !mask;
    let half = 1u32 << (drop - 1);
    if word & mask < half {
        return truncated;
    }
    // Carry out of the mantissa bumps the exponent, which is the correct rounding.
    let rounded = truncated.wrapping_add(1u32 << drop);
    if rounded & EXPONENT_MASK == EXPONENT_MASK {
        truncated
    } else {
        rounded
    }
}

/// Encodes one float job (a single channel of one block).
pub(crate) fn encode_job(
    words: &[i32],
    keep_bits: Option<u32>,
    zstd_level: i32,
) -> Result<Vec<u8>, EngineError> {
    let mut bits: Vec<u32> = words.iter().map(|&w| w as u32).collect();
    if let Some(keep) = keep_bits {
        for w in bits.iter_mut() {
            *w = round_mantissa(*w, keep);
        }
    }
    xor_delta::encode_inplace(&mut bits);
    let shuffled = shuffle::encode(&bits);
    Ok(zstd::encode(&shuffled, zstd_level)?)
}

/// Decodes one float job of `count` samples.
pub(crate) fn decode_job(bytes: &[u8], count: usize) -> Result<Vec<i32>, EngineError> {
    let shuffled = zstd::decode(bytes)?;
    let mut bits = shuffle::decode::<u32>(&shuffled)?;
    if bits.len() != count {
        return Err(EngineError::MalformedPayload(format!(
            "float job holds {} samples, expected {}",
            bits.len(),
            count
        )));
    }
    xor_delta::decode_inplace(&mut bits);
    Ok(bits.into_iter().map(|w| w as i32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[f32]) -> Vec<i32> {
        values.iter().map(|v| v.to_bits() as i32).collect()
    }

    #[test]
    fn test_keep_bits_mapping() {
        assert_eq!(keep_bits_for(32.0), 23);
        assert_eq!(keep_bits_for(16.0), 7);
        assert_eq!(keep_bits_for(12.7), 3);
        assert_eq!(keep_bits_for(4.0), 0);
    }

    #[test]
    fn test_round_mantissa_half_up() {
        // An exact half ulp of the kept precision rounds up.
        let one_plus_ulp = 1.0f32.to_bits() | 1;
        assert_eq!(round_mantissa(one_plus_ulp, 22), 1.0f32.to_bits() | 2);
        assert_eq!(round_mantissa(1.0f32.to_bits(), 0), 1.0f32.to_bits());
        // 1.75 rounds to 2.0 with no mantissa bits kept.
        assert_eq!(f32::from_bits(round_mantissa(1.75f32.to_bits(), 0)), 2.0);
        assert_eq!(f32::from_bits(round_mantissa(1.25f32.to_bits(), 0)), 1.0);
    }

    #[test]
    fn test_round_mantissa_specials() {
        assert_eq!(round_mantissa(f32::INFINITY.to_bits(), 0), f32::INFINITY.to_bits());
        let nan = f32::NAN.to_bits() | 0x1234;
        assert_eq!(round_mantissa(nan, 0), nan);
        let max = f32::MAX.to_bits();
        assert!(f32::from_bits(round_mantissa(max, 4)).is_finite());
        assert_eq!(round_mantissa((-0.0f32).to_bits(), 3), (-0.0f32).to_bits());
    }

    #[test]
    fn test_float_job_roundtrip_lossless() {
        let values: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin() * 3.5).collect();
        let mut input = words(&values);
        input.push(f32::NAN.to_bits() as i32);
        input.push(f32::NEG_INFINITY.to_bits() as i32);

        let encoded = encode_job(&input, None, 3).unwrap();
        assert_eq!(decode_job(&encoded, input.len()).unwrap(), input);
    }

    #[test]
    fn test_float_job_lossy_relative_error() {
        let values: Vec<f32> = (1..500).map(|i| i as f32 * 0.37).collect();
        let keep = keep_bits_for(20.0);
        let encoded = encode_job(&words(&values), Some(keep), 3).unwrap();
        let decoded = decode_job(&encoded, values.len()).unwrap();
        for (orig, w) in values.iter().zip(decoded) {
            let back = f32::from_bits(w as u32);
            assert!(((back - orig) / orig).abs() <= 2f32.powi(-(keep as i32)));
        }
    }

    #[test]
    fn test_float_job_count_mismatch() {
        let encoded = encode_job(&words(&[1.0, 2.0]), None, 1).unwrap();
        assert!(matches!(
            decode_job(&encoded, 3),
            Err(EngineError::MalformedPayload(_))
        ));
    }
}
