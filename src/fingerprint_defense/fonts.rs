//! Font metric jitter and `FontFace` source substitution.

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use persona_core::channels::fonts::{font_offset, substitute_local_font};
use persona_core::{Channel, Result, SurfaceId};

use super::proxy_helpers::{self, JsResult, Trap};
use super::{count, JsChannelHost};

pub const OFFSET_METRICS: [SurfaceId; 2] = [
    SurfaceId::new("HTMLElement.prototype", "offsetWidth"),
    SurfaceId::new("HTMLElement.prototype", "offsetHeight"),
];

pub const FONT_FACE: SurfaceId = SurfaceId::new("globalThis", "FontFace");

pub fn install(host: &mut JsChannelHost, seed: u64) -> Result<usize> {
    let mut hooked = 0;

    for surface in OFFSET_METRICS {
        let property = surface.member;
        hooked += count(host.wrap_getter(Channel::Font, surface, move |native| {
            Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                let raw = proxy_helpers::call_function(&native, &this_arg, &args)?;
                Ok(match raw.as_f64() {
                    Some(value) => {
                        let family = font_family(&this_arg);
                        let offset = font_offset(seed, &family, property, value);
                        JsValue::from_f64(value + f64::from(offset))
                    }
                    None => raw,
                })
            }) as Trap
        })?);
    }

    hooked += count(host.wrap_constructor(Channel::Font, FONT_FACE, move |native| {
        let callable = native.clone();
        let apply = Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
            // calling without `new` throws natively; keep that
            proxy_helpers::call_function(&callable, &this_arg, &args)
        }) as Trap;
        let construct = Box::new(move |_target: JsValue, args: JsValue, new_target: JsValue| -> JsResult<JsValue> {
            let args = Array::from(&args);
            if let Some(source) = args.get(1).as_string() {
                if let Some(redirected) = substitute_local_font(&source, seed) {
                    args.set(1, JsValue::from_str(&redirected));
                }
            }
            let native: &Function = native.unchecked_ref();
            let new_target: &Function = new_target.unchecked_ref();
            Reflect::construct_with_new_target(native, &args, new_target)
        }) as Trap;
        (apply, construct)
    })?);

    Ok(hooked)
}

/// Inline `style.fontFamily` of an element, empty when unset.
fn font_family(element: &JsValue) -> String {
    Reflect::get(element, &JsValue::from_str("style"))
        .and_then(|style| Reflect::get(&style, &JsValue::from_str("fontFamily")))
        .ok()
        .and_then(|family| family.as_string())
        .unwrap_or_default()
}
