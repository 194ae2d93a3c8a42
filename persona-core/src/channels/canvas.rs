//! Canvas pixel-buffer noise.
//!
//! Only "edge" pixels (ones that differ from all four direct neighbours) get
//! their alpha rewritten, so flat UI regions stay untouched while any hash
//! over content-bearing regions changes.

use crate::prng::SeededStream;

/// Number of noise values drawn from the canvas seed.
pub const NOISE_LEN: usize = 10;

/// Precompute the alpha noise for a canvas seed.
pub fn canvas_noise(seed: u64) -> [u8; NOISE_LEN] {
    let mut stream = SeededStream::new(seed);
    let mut noise = [0u8; NOISE_LEN];
    for slot in noise.iter_mut() {
        // floor(r * 255) is at most 254
        *slot = stream.next_in(0.0, 255.0).floor() as u8;
    }
    noise
}

/// Apply edge-only alpha noise to an RGBA buffer in place.
///
/// Interior pixels are visited on a stride of two in both directions; the
/// walk stops once every noise value has been consumed. Returns how many
/// pixels were rewritten.
pub fn apply_edge_noise(data: &mut [u8], width: usize, height: usize, noise: &[u8]) -> usize {
    if noise.is_empty() || data.len() < width * height * 4 {
        return 0;
    }

    let pixel = |row: usize, col: usize| (row * width + col) * 4;
    let mut used = 0;

    let mut row = 1;
    while row + 2 < height && used < noise.len() {
        let mut col = 1;
        while col + 2 < width && used < noise.len() {
            let center = pixel(row, col);
            let neighbours = [
                pixel(row - 1, col),
                pixel(row + 1, col),
                pixel(row, col - 1),
                pixel(row, col + 1),
            ];
            let is_edge = neighbours
                .iter()
                .all(|&n| data[center..center + 4] != data[n..n + 4]);
            if is_edge {
                data[center + 3] = noise[used];
                used += 1;
            }
            col += 2;
        }
        row += 2;
    }
    used
}
