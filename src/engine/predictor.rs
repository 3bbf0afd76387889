//! Integer prediction and hybrid quantization for one engine job.
//!
//! Each job is a single channel of one block. Samples are predicted from the
//! previously *reconstructed* samples with a fixed polynomial predictor, so the
//! encoder and decoder stay in lock-step even when residuals are quantized.
//! With a quantization step of 1 the scheme is lossless.

/// Highest polynomial predictor order.
pub(crate) const MAX_ORDER: u8 = 3;

/// Bound on the dynamic noise-shaping weight.
const MAX_DYNAMIC_WEIGHT: f64 = 0.75;

/// Inclusive value range of a signed integer sample width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SampleRange {
    pub min: i64,
    pub max: i64,
}

impl SampleRange {
    pub fn for_bits(bits: u8) -> Self {
        let half = 1i64 << (bits - 1);
        Self {
            min: -half,
            max: half - 1,
        }
    }

    #[inline]
    fn clamp(&self, v: i64) -> i64 {
        v.clamp(self.min, self.max)
    }
}

/// How residuals are quantized before entropy coding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Quantizer {
    /// Reconstruction step; 1 means lossless.
    pub step: i64,
    /// First-order error-feedback weight in [-1, 1].
    pub shaping_weight: f64,
}

impl Quantizer {
    /// Step that leaves `target_bits` of effective resolution in a `bits`-wide sample.
    pub fn step_for(bits: u8, target_bits: f32) -> i64 {
        let exponent = (f64::from(bits) - f64::from(target_bits)).max(0.0);
        (2f64.powf(exponent).round() as i64).max(1)
    }
}

/// Polynomial prediction of sample `i` from reconstructed history.
/// The order drops to the available history during warm-up.
#[inline]
fn predict(history: &[i64], i: usize, order: u8, range: SampleRange) -> i64 {
    let p = match usize::from(order).min(i) {
        0 => 0,
        1 => history[i - 1],
        2 => 2 * history[i - 1] - history[i - 2],
        _ => 3 * history[i - 1] - 3 * history[i - 2] + history[i - 3],
    };
    range.clamp(p)
}

/// Picks the predictor order with the smallest open-loop absolute residual sum.
pub(crate) fn choose_order(samples: &[i32], range: SampleRange) -> u8 {
    let history: Vec<i64> = samples.iter().map(|&v| i64::from(v)).collect();
    (0..=MAX_ORDER)
        .min_by_key(|&order| {
            (0..history.len())
                .map(|i| (history[i] - predict(&history, i, order, range)).unsigned_abs())
                .fold(0u64, u64::saturating_add)
        })
        .unwrap_or(1)
}

/// Per-block shaping weight from the lag-1 autocorrelation of the samples.
/// Low-frequency content (positive correlation) pushes noise up in frequency.
pub(crate) fn dynamic_shaping_weight(samples: &[i32]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let (mut num, mut den) = (0.0f64, 0.0f64);
    for pair in samples.windows(2) {
        let a = f64::from(pair[0]) - mean;
        let b = f64::from(pair[1]) - mean;
        num += a * b;
        den += a * a;
    }
    if den <= f64::EPSILON {
        return 0.0;
    }
    (num / den).clamp(-MAX_DYNAMIC_WEIGHT, MAX_DYNAMIC_WEIGHT)
}

/// Produces the (quantized) residuals of one job.
pub(crate) fn encode_residuals(
    samples: &[i32],
    order: u8,
    range: SampleRange,
    quantizer: Quantizer,
) -> Vec<i64> {
    let step = quantizer.step;
    let step_f = step as f64;
    let mut reconstructed: Vec<i64> = Vec::with_capacity(samples.len());
    let mut residuals = Vec::with_capacity(samples.len());
    let mut error = 0.0f64;

    for (i, &sample) in samples.iter().enumerate() {
        let x = i64::from(sample);
        let pred = predict(&reconstructed, i, order, range);
        let q = if step == 1 {
            x - pred
        } else {
            let target = x as f64 + quantizer.shaping_weight * error;
            ((target - pred as f64) / step_f).round() as i64
        };
        let value = range.clamp(pred.saturating_add(q.saturating_mul(step)));
        error = ((x - value) as f64).clamp(-step_f, step_f);
        reconstructed.push(value);
        residuals.push(q);
    }
    residuals
}

/// Rebuilds the samples of one job from its residuals.
pub(crate) fn decode_residuals(
    residuals: &[i64],
    order: u8,
    range: SampleRange,
    step: i64,
) -> Vec<i32> {
    let mut reconstructed: Vec<i64> = Vec::with_capacity(residuals.len());
    for (i, &q) in residuals.iter().enumerate() {
        let pred = predict(&reconstructed, i, order, range);
        reconstructed.push(range.clamp(pred.saturating_add(q.saturating_mul(step))));
    }
    // Every value is clamped to the sample range, so the narrowing is exact.
    reconstructed.into_iter().map(|v| v as i32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOSSLESS: Quantizer = Quantizer {
        step: 1,
        shaping_weight: 0.0,
    };

    fn ramp_with_noise(n: usize) -> Vec<i32> {
        (0..n)
            .map(|i| ((i as f64 * 0.05).sin() * 2000.0) as i32 + (i as i32 * 7919 % 11) - 5)
            .collect()
    }

    #[test]
    fn test_lossless_roundtrip_every_order() {
        let range = SampleRange::for_bits(16);
        let samples = ramp_with_noise(500);
        for order in 0..=MAX_ORDER {
            let residuals = encode_residuals(&samples, order, range, LOSSLESS);
            assert_eq!(decode_residuals(&residuals, order, range, 1), samples);
        }
    }

    #[test]
    fn test_lossless_extremes_of_int32() {
        let range = SampleRange::for_bits(32);
        let samples = vec![i32::MAX, i32::MIN, i32::MAX, 0, -1, i32::MIN, i32::MIN];
        let residuals = encode_residuals(&samples, 3, range, LOSSLESS);
        assert_eq!(decode_residuals(&residuals, 3, range, 1), samples);
    }

    #[test]
    fn test_smooth_signal_prefers_higher_order() {
        let range = SampleRange::for_bits(32);
        let quadratic: Vec<i32> = (0..200).map(|i| i * i).collect();
        assert!(choose_order(&quadratic, range) >= 2);
        let constant = vec![17i32; 100];
        assert_eq!(choose_order(&constant, range), 1);
    }

    #[test]
    fn test_hybrid_error_is_bounded_by_step() {
        let range = SampleRange::for_bits(16);
        let samples = ramp_with_noise(1000);
        let step = Quantizer::step_for(16, 6.0);
        assert_eq!(step, 1024);

        for weight in [0.0, 0.5, -0.5] {
            let quantizer = Quantizer {
                step,
                shaping_weight: weight,
            };
            let residuals = encode_residuals(&samples, 2, range, quantizer);
            let decoded = decode_residuals(&residuals, 2, range, step);
            assert_eq!(decoded.len(), samples.len());
            for (a, b) in samples.iter().zip(&decoded) {
                assert!(i64::from(*a - *b).abs() <= 2 * step, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_dynamic_weight_tracks_correlation() {
        let smooth: Vec<i32> = (0..400).map(|i| ((i as f64 * 0.01).sin() * 1000.0) as i32).collect();
        assert!(dynamic_shaping_weight(&smooth) > 0.5);
        let alternating: Vec<i32> = (0..400).map(|i| if i % 2 == 0 { 100 } else { -100 }).collect();
        assert!(dynamic_shaping_weight(&alternating) < -0.5);
        assert_eq!(dynamic_shaping_weight(&[5]), 0.0);
    }

    #[test]
    fn test_step_for_never_below_one() {
        assert_eq!(Quantizer::step_for(16, 15.9), 1);
        assert_eq!(Quantizer::step_for(8, 2.25), 54);
    }
}
