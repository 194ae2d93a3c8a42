//! Audio buffer sample noise.
//!
//! `AudioBuffer.getChannelData` perturbs every Nth sample of the returned
//! array once. The arrays already perturbed are remembered in a `WeakSet`,
//! so reading the same channel again returns identical samples while a
//! fresh buffer rendered from the same input gets the same noise.

use js_sys::{Array, Float32Array, WeakSet};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use persona_core::channels::audio::{perturb_reduction, perturb_samples};
use persona_core::{Channel, Result, SurfaceId};

use super::proxy_helpers::{self, describe_js_error, JsResult, Trap};
use super::{count, JsChannelHost};

pub const GET_CHANNEL_DATA: SurfaceId = SurfaceId::new("AudioBuffer.prototype", "getChannelData");
pub const COPY_FROM_CHANNEL: SurfaceId = SurfaceId::new("AudioBuffer.prototype", "copyFromChannel");
pub const COPY_TO_CHANNEL: SurfaceId = SurfaceId::new("AudioBuffer.prototype", "copyToChannel");
pub const COMPRESSOR_REDUCTION: SurfaceId =
    SurfaceId::new("DynamicsCompressorNode.prototype", "reduction");

pub fn install(host: &mut JsChannelHost, seed: u64) -> Result<usize> {
    let processed = WeakSet::new();

    let mut hooked = count(host.wrap_method(Channel::Audio, GET_CHANNEL_DATA, move |native| {
        Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
            let data = proxy_helpers::call_function(&native, &this_arg, &args)?;
            if let Some(samples) = data.dyn_ref::<Float32Array>() {
                if !processed.has(samples) {
                    let mut buffer = samples.to_vec();
                    if perturb_samples(&mut buffer, seed) > 0 {
                        samples.copy_from(&buffer);
                    }
                    processed.add(samples);
                }
            }
            Ok(data)
        }) as Trap
    })?);

    if hooked == 0 {
        return Ok(0);
    }

    // copies go through getChannelData first so they see the same samples
    for surface in [COPY_FROM_CHANNEL, COPY_TO_CHANNEL] {
        hooked += count(host.wrap_method(Channel::Audio, surface, |native| {
            Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                let channel = Array::from(&args).get(1);
                if let Err(err) = proxy_helpers::call_method(&this_arg, "getChannelData", &Array::of1(&channel)) {
                    log::debug!("Channel copy without noise pass: {}", describe_js_error(&err));
                }
                proxy_helpers::call_function(&native, &this_arg, &args)
            }) as Trap
        })?);
    }

    hooked += count(host.wrap_getter(Channel::Audio, COMPRESSOR_REDUCTION, move |native| {
        Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
            let reduction = proxy_helpers::call_function(&native, &this_arg, &args)?;
            Ok(match reduction.as_f64() {
                Some(value) => JsValue::from_f64(perturb_reduction(value, seed)),
                None => reduction,
            })
        }) as Trap
    })?);

    Ok(hooked)
}
