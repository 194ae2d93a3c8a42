//! Canvas 2D pixel readback.
//!
//! `getImageData` results get edge-only alpha noise. The export paths
//! (`toDataURL`, `toBlob`) serialize a noisy private copy of the canvas and
//! never touch the page's own pixels; if the copy cannot be made (tainted
//! canvas, no document) they export the original unchanged.

use js_sys::{Array, Reflect, Uint8ClampedArray};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData};

use persona_core::channels::canvas::{apply_edge_noise, canvas_noise, NOISE_LEN};
use persona_core::{Channel, Result, SurfaceId};

use super::proxy_helpers::{self, describe_js_error, JsResult, Trap};
use super::{count, JsChannelHost};

pub const GET_IMAGE_DATA: SurfaceId = SurfaceId::new("CanvasRenderingContext2D.prototype", "getImageData");
pub const TO_DATA_URL: SurfaceId = SurfaceId::new("HTMLCanvasElement.prototype", "toDataURL");
pub const TO_BLOB: SurfaceId = SurfaceId::new("HTMLCanvasElement.prototype", "toBlob");

pub fn install(host: &mut JsChannelHost, seed: u64) -> Result<usize> {
    let noise = canvas_noise(seed);

    let mut hooked = count(host.wrap_method(Channel::Canvas, GET_IMAGE_DATA, move |native_get| {
        Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
            let image = proxy_helpers::call_function(&native_get, &this_arg, &args)?;
            if let Err(err) = add_noise(&image, &noise) {
                log::debug!("getImageData left unperturbed: {}", describe_js_error(&err));
            }
            Ok(image)
        }) as Trap
    })?);

    // export copies are read back through the native getImageData
    let native_get = match host.original(&GET_IMAGE_DATA) {
        Some(native_get) => native_get,
        None => return Ok(hooked),
    };

    for surface in [TO_DATA_URL, TO_BLOB] {
        let native_get = native_get.clone();
        hooked += count(host.wrap_method(Channel::Canvas, surface, move |native_export| {
            Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                match noisy_copy(&this_arg, &native_get, &noise) {
                    Ok(copy) => proxy_helpers::call_function(&native_export, &copy, &args)
                        .or_else(|_| proxy_helpers::call_function(&native_export, &this_arg, &args)),
                    Err(err) => {
                        log::debug!("Canvas export left unperturbed: {}", describe_js_error(&err));
                        proxy_helpers::call_function(&native_export, &this_arg, &args)
                    }
                }
            }) as Trap
        })?);
    }

    Ok(hooked)
}

/// Apply edge noise to an `ImageData` in place.
fn add_noise(image: &JsValue, noise: &[u8; NOISE_LEN]) -> JsResult<usize> {
    let width = proxy_helpers::get_number(image, "width").unwrap_or(0.0) as usize;
    let height = proxy_helpers::get_number(image, "height").unwrap_or(0.0) as usize;
    let data: Uint8ClampedArray = Reflect::get(image, &JsValue::from_str("data"))?.dyn_into()?;

    // Copy to WASM memory, perturb, copy back
    let mut buffer = data.to_vec();
    let changed = apply_edge_noise(&mut buffer, width, height, noise);
    if changed > 0 {
        data.copy_from(&buffer);
    }
    Ok(changed)
}

/// A detached canvas holding the page canvas' pixels plus noise.
fn noisy_copy(
    canvas: &JsValue,
    native_get: &JsValue,
    noise: &[u8; NOISE_LEN],
) -> JsResult<JsValue> {
    let canvas: &HtmlCanvasElement = canvas
        .dyn_ref()
        .ok_or_else(|| JsValue::from_str("not a canvas element"))?;
    let (width, height) = (canvas.width(), canvas.height());
    if width == 0 || height == 0 {
        return Err(JsValue::from_str("empty canvas"));
    }

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let copy: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
    copy.set_width(width);
    copy.set_height(height);
    let ctx: CanvasRenderingContext2d = copy
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("no 2d context"))?
        .dyn_into()?;

    ctx.draw_image_with_html_canvas_element(canvas, 0.0, 0.0)?;
    let image = proxy_helpers::call_function(
        native_get,
        &ctx,
        &Array::of4(
            &JsValue::from_f64(0.0),
            &JsValue::from_f64(0.0),
            &JsValue::from_f64(f64::from(width)),
            &JsValue::from_f64(f64::from(height)),
        ),
    )?;
    add_noise(&image, noise)?;
    let image: ImageData = image.dyn_into()?;
    ctx.put_image_data(&image, 0.0, 0.0)?;
    Ok(copy.into())
}
