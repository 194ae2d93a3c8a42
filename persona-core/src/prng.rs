//! Seeded noise primitive.
//!
//! Every perturbation is derived from a Mulberry32 stream so that a seed
//! replays the exact same noise forever. Two identities with different seeds
//! get statistically independent streams.
//!
//! The stream state is the low 32 bits of the seed, which is what a JS
//! number coerces to under `ToInt32`.

/// Deterministic `[0, 1)` stream from a 32-bit Weyl-increment state.
#[derive(Debug, Clone)]
pub struct SeededStream {
    state: u32,
}

impl SeededStream {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed as u32,
        }
    }

    /// Next raw 32-bit output.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let s = self.state;
        let mut t = (s ^ (s >> 15)).wrapping_mul(1 | s);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        t ^ (t >> 14)
    }

    /// Next value in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Next value scaled into `[min, max)`.
    #[inline]
    pub fn next_in(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }
}

impl Iterator for SeededStream {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_f64())
    }
}

/// First stream value for `seed`, scaled into `[min, max)`.
///
/// `min > max` is allowed and simply flips the interval.
#[inline]
pub fn seeded_value(seed: u64, min: f64, max: f64) -> f64 {
    SeededStream::new(seed).next_in(min, max)
}

/// Fold an arbitrary token into a non-negative 31-bit seed component.
///
/// 32-bit `h * 31 + unit` over UTF-16 code units, then absolute value.
pub fn hash_str(token: &str) -> u64 {
    let h = token
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    u64::from(h.unsigned_abs())
}
