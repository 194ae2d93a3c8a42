//! Client-rectangle jitter for `Element` and `Range` geometry reads.

use js_sys::Reflect;
use wasm_bindgen::prelude::*;

use persona_core::channels::client_rects::{jitter_rect, rect_noise, RectGeometry};
use persona_core::{Channel, Result, SurfaceId};

use super::proxy_helpers::{self, describe_js_error, JsResult, Trap};
use super::{count, JsChannelHost};

pub const BOUNDING_RECTS: [SurfaceId; 2] = [
    SurfaceId::new("Element.prototype", "getBoundingClientRect"),
    SurfaceId::new("Range.prototype", "getBoundingClientRect"),
];

pub const RECT_LISTS: [SurfaceId; 2] = [
    SurfaceId::new("Element.prototype", "getClientRects"),
    SurfaceId::new("Range.prototype", "getClientRects"),
];

pub fn install(host: &mut JsChannelHost, seed: u64) -> Result<usize> {
    let noise = rect_noise(seed);
    let mut hooked = 0;

    for surface in BOUNDING_RECTS {
        hooked += count(host.wrap_method(Channel::DomRect, surface, move |native| {
            Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                let rect = proxy_helpers::call_function(&native, &this_arg, &args)?;
                if let Err(err) = jitter(&rect, noise) {
                    log::debug!("Rect left unperturbed: {}", describe_js_error(&err));
                }
                Ok(rect)
            }) as Trap
        })?);
    }

    for surface in RECT_LISTS {
        hooked += count(host.wrap_method(Channel::DomRect, surface, move |native| {
            Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                let rects = proxy_helpers::call_function(&native, &this_arg, &args)?;
                let len = proxy_helpers::get_number(&rects, "length").unwrap_or(0.0) as u32;
                for i in 0..len {
                    let jittered = Reflect::get_u32(&rects, i).and_then(|rect| jitter(&rect, noise));
                    if let Err(err) = jittered {
                        log::debug!("Rect {} left unperturbed: {}", i, describe_js_error(&err));
                    }
                }
                Ok(rects)
            }) as Trap
        })?);
    }

    Ok(hooked)
}

/// Shift a (writable) `DOMRect` in place.
fn jitter(rect: &JsValue, noise: f64) -> JsResult<()> {
    if proxy_helpers::is_missing(rect) {
        return Ok(());
    }
    let read = |prop: &str| proxy_helpers::get_number(rect, prop).unwrap_or(0.0);
    let before = RectGeometry {
        x: read("x"),
        y: read("y"),
        width: read("width"),
        height: read("height"),
    };
    let after = jitter_rect(before, noise);
    if after.x != before.x {
        Reflect::set(rect, &JsValue::from_str("x"), &JsValue::from_f64(after.x))?;
    }
    if after.width != before.width {
        Reflect::set(rect, &JsValue::from_str("width"), &JsValue::from_f64(after.width))?;
    }
    Ok(())
}
