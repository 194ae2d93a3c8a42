//! Client-rectangle jitter.

use crate::prng::seeded_value;

pub const RECT_NOISE_RANGE: f64 = 1e-6;

/// The one offset applied to every rectangle read under this seed.
pub fn rect_noise(seed: u64) -> f64 {
    seeded_value(seed, -RECT_NOISE_RANGE, RECT_NOISE_RANGE)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Shift nonzero `x` and `width`. Zero fields stay exact so collapsed or
/// hidden elements still read as zero.
pub fn jitter_rect(rect: RectGeometry, noise: f64) -> RectGeometry {
    let shift = |v: f64| if v != 0.0 { v + noise } else { v };
    RectGeometry {
        x: shift(rect.x),
        width: shift(rect.width),
        ..rect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_range() {
        for seed in 0..1000 {
            let n = rect_noise(seed);
            assert!(n.abs() <= RECT_NOISE_RANGE);
        }
        assert_eq!(rect_noise(46), rect_noise(46));
    }

    #[test]
    fn test_only_nonzero_x_and_width() {
        let noise = rect_noise(46);
        let rect = RectGeometry {
            x: 10.0,
            y: 20.0,
            width: 0.0,
            height: 30.0,
        };
        let out = jitter_rect(rect, noise);
        assert_eq!(out.x, 10.0 + noise);
        assert_eq!(out.y, 20.0);
        assert_eq!(out.width, 0.0);
        assert_eq!(out.height, 30.0);
    }
}
