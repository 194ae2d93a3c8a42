//! WebGL descriptor spoofing and read-back noise.

use crate::descriptor::GpuInfo;
use crate::prng::SeededStream;

/// `WEBGL_debug_renderer_info.UNMASKED_VENDOR_WEBGL`
pub const UNMASKED_VENDOR_WEBGL: u32 = 0x9245;
/// `WEBGL_debug_renderer_info.UNMASKED_RENDERER_WEBGL`
pub const UNMASKED_RENDERER_WEBGL: u32 = 0x9246;

pub const NOISE_VERTEX_SHADER: &str =
    "attribute vec4 noise;void main(){gl_Position=noise;gl_PointSize=0.001;}";
pub const NOISE_FRAGMENT_SHADER: &str = "void main(){gl_FragColor=vec4(0.0,0.0,0.0,0.01);}";

/// Name of the vertex attribute fed with [`noise_positions`].
pub const NOISE_ATTRIBUTE: &str = "noise";

pub const NOISE_POSITIONS: usize = 20;

/// Seed-derived clip-space positions in `[-1, 1)` for the noise point.
pub fn noise_positions(seed: u64) -> [f32; NOISE_POSITIONS] {
    let mut stream = SeededStream::new(seed);
    let mut positions = [0f32; NOISE_POSITIONS];
    for p in positions.iter_mut() {
        *p = stream.next_in(-1.0, 1.0) as f32;
    }
    positions
}

/// Replacement for a `getParameter` query, or `None` to pass through.
pub fn spoofed_parameter(gpu: &GpuInfo, parameter: u32) -> Option<&str> {
    let value = match parameter {
        UNMASKED_VENDOR_WEBGL => &gpu.vendor,
        UNMASKED_RENDERER_WEBGL => &gpu.renderer,
        _ => return None,
    };
    (!value.is_empty()).then_some(value.as_str())
}
