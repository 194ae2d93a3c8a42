//! WebGL vendor/renderer strings and readback noise.
//!
//! `getParameter` answers the unmasked vendor/renderer queries from the
//! descriptor's `gpuInfo`. With a WebGL seed, every `readPixels` first draws
//! one near-invisible point at seed-derived coordinates, so the read-back
//! hash moves without a visible artifact.

use js_sys::{Array, Float32Array};
use wasm_bindgen::prelude::*;
use web_sys::WebGlRenderingContext as Gl;

use persona_core::channels::webgl::{
    noise_positions, spoofed_parameter, NOISE_ATTRIBUTE, NOISE_FRAGMENT_SHADER, NOISE_POSITIONS,
    NOISE_VERTEX_SHADER,
};
use persona_core::descriptor::GpuInfo;
use persona_core::{Channel, FingerprintDescriptor, Result, SurfaceId};

use super::proxy_helpers::{self, describe_js_error, JsResult, Trap};
use super::{count, JsChannelHost};

pub const GET_PARAMETER: [SurfaceId; 2] = [
    SurfaceId::new("WebGLRenderingContext.prototype", "getParameter"),
    SurfaceId::new("WebGL2RenderingContext.prototype", "getParameter"),
];

pub const READ_PIXELS: [SurfaceId; 2] = [
    SurfaceId::new("WebGLRenderingContext.prototype", "readPixels"),
    SurfaceId::new("WebGL2RenderingContext.prototype", "readPixels"),
];

pub fn install(host: &mut JsChannelHost, descriptor: &FingerprintDescriptor) -> Result<usize> {
    let mut hooked = 0;

    if let Some(gpu) = &descriptor.gpu_info {
        for surface in GET_PARAMETER {
            let gpu = gpu.clone();
            hooked += count(host.wrap_method(Channel::WebGl, surface, move |native| {
                Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                    if let Some(spoofed) = spoof(&gpu, &args) {
                        return Ok(JsValue::from_str(spoofed));
                    }
                    proxy_helpers::call_function(&native, &this_arg, &args)
                }) as Trap
            })?);
        }
    }

    let noise_seed = descriptor
        .channel_seed(Channel::WebGl)
        .filter(|_| descriptor.flags.webgl);
    if let Some(seed) = noise_seed {
        let positions = noise_positions(seed);
        for surface in READ_PIXELS {
            hooked += count(host.wrap_method(Channel::WebGl, surface, move |native| {
                Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                    if let Err(err) = draw_noise(&this_arg, &positions) {
                        log::debug!("WebGL noise not drawn: {}", describe_js_error(&err));
                    }
                    proxy_helpers::call_function(&native, &this_arg, &args)
                }) as Trap
            })?);
        }
    }

    Ok(hooked)
}

fn spoof<'a>(gpu: &'a GpuInfo, args: &JsValue) -> Option<&'a str> {
    let parameter = Array::from(args).get(0).as_f64()?;
    if parameter < 0.0 || parameter > f64::from(u32::MAX) {
        return None;
    }
    spoofed_parameter(gpu, parameter as u32)
}

/// Dynamic calls on a WebGL 1 or 2 context.
struct GlCalls<'a> {
    gl: &'a JsValue,
}

impl GlCalls<'_> {
    fn call(&self, method: &str, args: &[&JsValue]) -> JsResult<JsValue> {
        let list: Array = args.iter().collect();
        proxy_helpers::call_method(self.gl, method, &list)
    }

    fn parameter(&self, name: u32) -> JsResult<JsValue> {
        self.call("getParameter", &[&num(name)])
    }

    fn vertex_attrib(&self, location: &JsValue, name: u32) -> JsResult<JsValue> {
        self.call("getVertexAttrib", &[location, &num(name)])
    }
}

fn num(v: u32) -> JsValue {
    JsValue::from_f64(f64::from(v))
}

/// Vertex attribute state at the noise attribute's location.
struct SavedAttribute {
    enabled: bool,
    buffer: JsValue,
    size: JsValue,
    kind: JsValue,
    normalized: JsValue,
    stride: JsValue,
    offset: JsValue,
}

impl SavedAttribute {
    fn read(gl: &GlCalls<'_>, location: &JsValue) -> JsResult<Self> {
        Ok(Self {
            enabled: gl.vertex_attrib(location, Gl::VERTEX_ATTRIB_ARRAY_ENABLED)?.is_truthy(),
            buffer: gl.vertex_attrib(location, Gl::VERTEX_ATTRIB_ARRAY_BUFFER_BINDING)?,
            size: gl.vertex_attrib(location, Gl::VERTEX_ATTRIB_ARRAY_SIZE)?,
            kind: gl.vertex_attrib(location, Gl::VERTEX_ATTRIB_ARRAY_TYPE)?,
            normalized: gl.vertex_attrib(location, Gl::VERTEX_ATTRIB_ARRAY_NORMALIZED)?,
            stride: gl.vertex_attrib(location, Gl::VERTEX_ATTRIB_ARRAY_STRIDE)?,
            offset: gl.call(
                "getVertexAttribOffset",
                &[location, &num(Gl::VERTEX_ATTRIB_ARRAY_POINTER)],
            )?,
        })
    }

    fn restore(&self, gl: &GlCalls<'_>, location: &JsValue) -> JsResult<()> {
        gl.call("bindBuffer", &[&num(Gl::ARRAY_BUFFER), &self.buffer])?;
        gl.call(
            "vertexAttribPointer",
            &[location, &self.size, &self.kind, &self.normalized, &self.stride, &self.offset],
        )?;
        if !self.enabled {
            gl.call("disableVertexAttribArray", &[location])?;
        }
        Ok(())
    }
}

/// Draw one point with the noise program. The page's current program,
/// `ARRAY_BUFFER` binding and vertex attribute state are restored afterwards,
/// also when the draw fails half way.
fn draw_noise(gl: &JsValue, positions: &[f32; NOISE_POSITIONS]) -> JsResult<()> {
    let gl = GlCalls { gl };
    let page_program = gl.parameter(Gl::CURRENT_PROGRAM)?;
    let page_buffer = gl.parameter(Gl::ARRAY_BUFFER_BINDING)?;

    let Some((program, shaders)) = build_program(&gl)? else {
        return Ok(());
    };
    let buffer = gl.call("createBuffer", &[])?;

    let drawn = draw_point(&gl, &program, &buffer, positions);

    let restored = gl
        .call("useProgram", &[&page_program])
        .and_then(|_| gl.call("bindBuffer", &[&num(Gl::ARRAY_BUFFER), &page_buffer]));
    for shader in &shaders {
        gl.call("deleteShader", &[shader])?;
    }
    gl.call("deleteProgram", &[&program])?;
    gl.call("deleteBuffer", &[&buffer])?;
    drawn.and(restored.map(|_| ()))
}

fn build_program(gl: &GlCalls<'_>) -> JsResult<Option<(JsValue, [JsValue; 2])>> {
    let shader = |kind: u32, source: &str| -> JsResult<Option<JsValue>> {
        let shader = gl.call("createShader", &[&num(kind)])?;
        if proxy_helpers::is_missing(&shader) {
            return Ok(None);
        }
        gl.call("shaderSource", &[&shader, &JsValue::from_str(source)])?;
        gl.call("compileShader", &[&shader])?;
        Ok(Some(shader))
    };

    let vertex = shader(Gl::VERTEX_SHADER, NOISE_VERTEX_SHADER)?;
    let fragment = shader(Gl::FRAGMENT_SHADER, NOISE_FRAGMENT_SHADER)?;
    let (vertex, fragment) = match (vertex, fragment) {
        (Some(v), Some(f)) => (v, f),
        _ => return Ok(None),
    };
    let program = gl.call("createProgram", &[])?;
    if proxy_helpers::is_missing(&program) {
        return Ok(None);
    }
    gl.call("attachShader", &[&program, &vertex])?;
    gl.call("attachShader", &[&program, &fragment])?;
    gl.call("linkProgram", &[&program])?;
    Ok(Some((program, [vertex, fragment])))
}

fn draw_point(
    gl: &GlCalls<'_>,
    program: &JsValue,
    buffer: &JsValue,
    positions: &[f32; NOISE_POSITIONS],
) -> JsResult<()> {
    let location = gl.call("getAttribLocation", &[program, &JsValue::from_str(NOISE_ATTRIBUTE)])?;
    if location.as_f64().map_or(true, |l| l < 0.0) {
        return Ok(());
    }
    let saved = SavedAttribute::read(gl, &location)?;

    let drawn = (|| {
        gl.call("useProgram", &[program])?;
        let vertices: JsValue = Float32Array::from(&positions[..]).into();
        gl.call("bindBuffer", &[&num(Gl::ARRAY_BUFFER), buffer])?;
        gl.call("bufferData", &[&num(Gl::ARRAY_BUFFER), &vertices, &num(Gl::STATIC_DRAW)])?;
        gl.call("enableVertexAttribArray", &[&location])?;
        gl.call(
            "vertexAttribPointer",
            &[&location, &num(2), &num(Gl::FLOAT), &JsValue::FALSE, &num(0), &num(0)],
        )?;
        gl.call("drawArrays", &[&num(Gl::POINTS), &num(0), &num(1)])
    })();

    let restored = saved.restore(gl, &location);
    drawn.and(restored)
}
