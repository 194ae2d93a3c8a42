//! WebGPU limit and buffer perturbation.

use std::collections::HashMap;

use crate::prng::{seeded_value, SeededStream};

/// Seed spacing between successive noise draws.
const SEED_STEP: u64 = 7;

/// Fraction of a `Float32Array` that `writeBuffer` perturbs.
pub const WRITE_BUFFER_FRACTION: f64 = 0.05;

pub const WRITE_BUFFER_NOISE: f64 = 1e-4;

/// Seed offset for each perturbed limit, or `None` if the limit is reported
/// unchanged.
pub fn limit_offset(name: &str) -> Option<u64> {
    match name {
        "maxBufferSize" => Some(0),
        "maxStorageBufferBindingSize" => Some(1),
        _ => None,
    }
}

fn step_seed(seed: u64, index: u64) -> u64 {
    seed.wrapping_add(index.wrapping_mul(SEED_STEP))
}

/// Reduce a limit by a seed-derived amount in `[1, 63]`. Zero stays zero.
pub fn perturb_limit(raw: f64, seed: u64, offset: u64) -> f64 {
    if raw == 0.0 {
        return raw;
    }
    raw - seeded_value(step_seed(seed, offset), 1.0, 64.0).floor()
}

/// Scale each clear colour component down by a factor in `[0.001, 0.01)`.
pub fn perturb_clear_value(components: &mut [f64], seed: u64) {
    for (i, v) in components.iter_mut().enumerate() {
        let noise = seeded_value(step_seed(seed, i as u64), 0.001, 0.01);
        *v = (*v - *v * noise).abs();
    }
}

/// Deterministic choice of `ceil(5%)` distinct indices out of `len`.
pub fn write_buffer_indices(seed: u64, len: usize) -> Vec<usize> {
    let count = ((len as f64 * WRITE_BUFFER_FRACTION).ceil() as usize).min(len);
    let mut stream = SeededStream::new(seed);
    // partial Fisher-Yates over a virtual 0..len; only displaced slots are stored
    let mut displaced: HashMap<usize, usize> = HashMap::with_capacity(count * 2);
    let mut picked = Vec::with_capacity(count);
    for i in 0..count {
        let j = (i + (stream.next_f64() * (len - i) as f64) as usize).min(len - 1);
        let at_j = displaced.get(&j).copied().unwrap_or(j);
        let at_i = displaced.get(&i).copied().unwrap_or(i);
        displaced.insert(j, at_i);
        picked.push(at_j);
    }
    picked
}

/// Perturb a `Float32Array` payload in place. Returns the touched indices.
pub fn perturb_write_buffer(data: &mut [f32], seed: u64) -> Vec<usize> {
    let selected = write_buffer_indices(seed, data.len());
    for (k, &index) in selected.iter().enumerate() {
        let noise = seeded_value(
            step_seed(seed, k as u64),
            -WRITE_BUFFER_NOISE,
            WRITE_BUFFER_NOISE,
        );
        let value = f64::from(data[index]);
        data[index] = (value + noise * value) as f32;
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_limits() {
        assert_eq!(limit_offset("maxBufferSize"), Some(0));
        assert_eq!(limit_offset("maxStorageBufferBindingSize"), Some(1));
        assert_eq!(limit_offset("maxBindGroups"), None);

        let raw = 268_435_456.0;
        let reduced = perturb_limit(raw, 47, 0);
        assert!(reduced <= raw - 1.0 && reduced >= raw - 63.0);
        assert_eq!(reduced.fract(), 0.0);
        assert_eq!(perturb_limit(0.0, 47, 0), 0.0);
    }

    #[test]
    fn test_clear_value_scaled_down() {
        let mut rgba = [1.0, 0.5, 0.0, 1.0];
        perturb_clear_value(&mut rgba, 47);
        assert!(rgba[0] < 1.0 && rgba[0] > 0.98);
        assert!(rgba[1] < 0.5 && rgba[1] > 0.49);
        assert_eq!(rgba[2], 0.0);
    }

    #[test]
    fn test_index_selection() {
        let picked = write_buffer_indices(47, 100);
        assert_eq!(picked.len(), 5);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(picked.iter().all(|&i| i < 100));
        assert_eq!(picked, write_buffer_indices(47, 100));

        assert_eq!(write_buffer_indices(47, 1).len(), 1);
        assert!(write_buffer_indices(47, 0).is_empty());
    }

    #[test]
    fn test_index_selection_matches_full_shuffle() {
        fn shuffled_prefix(seed: u64, len: usize) -> Vec<usize> {
            let count = ((len as f64 * WRITE_BUFFER_FRACTION).ceil() as usize).min(len);
            let mut indices: Vec<usize> = (0..len).collect();
            let mut stream = SeededStream::new(seed);
            for i in 0..count {
                let j = i + (stream.next_f64() * (len - i) as f64) as usize;
                indices.swap(i, j.min(len - 1));
            }
            indices.truncate(count);
            indices
        }

        for (seed, len) in [(47, 100), (3, 7), (9, 2_000), (123, 65_537)] {
            assert_eq!(write_buffer_indices(seed, len), shuffled_prefix(seed, len));
        }
    }

    #[test]
    fn test_large_buffer_selection_is_bounded() {
        let len = 1 << 24;
        let picked = write_buffer_indices(5, len);
        assert_eq!(picked.len(), (len as f64 * WRITE_BUFFER_FRACTION).ceil() as usize);
        assert!(picked.iter().all(|&i| i < len));
    }

    #[test]
    fn test_write_buffer_small_relative_change() {
        let mut data = vec![2.0f32; 200];
        let touched = perturb_write_buffer(&mut data, 47);
        assert_eq!(touched.len(), 10);
        for (i, v) in data.iter().enumerate() {
            if touched.contains(&i) {
                assert!((v - 2.0).abs() <= 2.0 * 1e-4 + 1e-6);
            } else {
                assert_eq!(*v, 2.0);
            }
        }
    }
}
