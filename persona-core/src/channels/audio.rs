//! Audio sample noise.
//!
//! Perturbations sit at the 1e-7 level, far below audibility, and skip
//! silent samples so a zero-filled buffer stays exactly zero.

use crate::prng::seeded_value;

pub const SAMPLE_NOISE_SCALE: f64 = 1e-7;

/// Every Nth sample is perturbed.
pub fn sample_stride(len: usize) -> usize {
    if len > 2000 {
        100
    } else {
        20
    }
}

/// Offset added to sample `index` of a buffer.
#[inline]
pub fn sample_noise(seed: u64, index: usize) -> f64 {
    seeded_value(seed.wrapping_add(index as u64), -1.0, 1.0) * SAMPLE_NOISE_SCALE
}

/// Perturb a channel's samples in place. Returns how many samples changed.
pub fn perturb_samples(samples: &mut [f32], seed: u64) -> usize {
    let stride = sample_stride(samples.len());
    let mut touched = 0;
    for i in (0..samples.len()).step_by(stride) {
        let v = f64::from(samples[i]);
        if v == 0.0 || v.abs() <= SAMPLE_NOISE_SCALE {
            continue;
        }
        samples[i] = (v + sample_noise(seed, i)) as f32;
        touched += 1;
    }
    touched
}

/// Offset for `DynamicsCompressorNode.reduction`.
pub fn compressor_noise(seed: u64) -> f64 {
    seeded_value(seed, 0.0, 1.0) * SAMPLE_NOISE_SCALE
}

/// Adjusted compressor reading. Zero readings pass through.
pub fn perturb_reduction(reduction: f64, seed: u64) -> f64 {
    if reduction == 0.0 {
        reduction
    } else {
        reduction + compressor_noise(seed)
    }
}
