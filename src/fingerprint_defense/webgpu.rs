//! WebGPU limits, render-pass clear colours and buffer writes.
//!
//! Weak channel: every hook is skipped in contexts without WebGPU.

use js_sys::{Array, Float32Array, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use persona_core::channels::webgpu::{limit_offset, perturb_clear_value, perturb_limit, perturb_write_buffer};
use persona_core::{Channel, Result, SurfaceId};

use super::proxy_helpers::{self, describe_js_error, JsResult, Trap};
use super::{count, injection_error, JsChannelHost};

pub const ADAPTER_LIMITS: SurfaceId = SurfaceId::new("GPUAdapter.prototype", "limits");
pub const DEVICE_LIMITS: SurfaceId = SurfaceId::new("GPUDevice.prototype", "limits");
pub const BEGIN_RENDER_PASS: SurfaceId = SurfaceId::new("GPUCommandEncoder.prototype", "beginRenderPass");
pub const WRITE_BUFFER: SurfaceId = SurfaceId::new("GPUQueue.prototype", "writeBuffer");

pub fn install(host: &mut JsChannelHost, seed: u64) -> Result<usize> {
    if proxy_helpers::is_missing(&proxy_helpers::get_global("GPUAdapter").unwrap_or(JsValue::UNDEFINED)) {
        return Ok(0);
    }

    let mut hooked = 0;
    let handler = limits_handler(seed).map_err(injection_error(Channel::WebGpu))?;
    for surface in [ADAPTER_LIMITS, DEVICE_LIMITS] {
        let handler = handler.clone();
        hooked += count(host.wrap_getter(Channel::WebGpu, surface, move |native| {
            Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                let limits = proxy_helpers::call_function(&native, &this_arg, &args)?;
                if !limits.is_object() {
                    return Ok(limits);
                }
                proxy_helpers::proxy(&limits, &handler).or(Ok(limits))
            }) as Trap
        })?);
    }

    hooked += count(host.wrap_method(Channel::WebGpu, BEGIN_RENDER_PASS, move |native| {
        Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
            let descriptor = Array::from(&args).get(0);
            if let Err(err) = perturb_clear(&descriptor, seed) {
                log::debug!("Clear value left unperturbed: {}", describe_js_error(&err));
            }
            proxy_helpers::call_function(&native, &this_arg, &args)
        }) as Trap
    })?);

    hooked += count(host.wrap_method(Channel::WebGpu, WRITE_BUFFER, move |native| {
        Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
            if let Some(data) = Array::from(&args).get(2).dyn_ref::<Float32Array>() {
                let mut values = data.to_vec();
                if !perturb_write_buffer(&mut values, seed).is_empty() {
                    data.copy_from(&values);
                }
            }
            proxy_helpers::call_function(&native, &this_arg, &args)
        }) as Trap
    })?);

    Ok(hooked)
}

/// Shared `get` handler for `GPUSupportedLimits` proxies.
fn limits_handler(seed: u64) -> JsResult<Object> {
    proxy_helpers::handler_with_get(Box::new(
        move |target: JsValue, property: JsValue, _receiver: JsValue| -> JsResult<JsValue> {
            let value = Reflect::get(&target, &property)?;
            let offset = property.as_string().and_then(|name| limit_offset(&name));
            if let (Some(offset), Some(raw)) = (offset, value.as_f64()) {
                return Ok(JsValue::from_f64(perturb_limit(raw, seed, offset)));
            }
            // methods must run against the real limits object
            if let Some(method) = value.dyn_ref::<js_sys::Function>() {
                return Ok(method.bind(&target).into());
            }
            Ok(value)
        },
    ))
}

/// Scale `colorAttachments[0].clearValue` in place (array or `{r,g,b,a}`).
fn perturb_clear(descriptor: &JsValue, seed: u64) -> JsResult<()> {
    if !descriptor.is_object() {
        return Ok(());
    }
    let attachments = Reflect::get(descriptor, &JsValue::from_str("colorAttachments"))?;
    if proxy_helpers::is_missing(&attachments) {
        return Ok(());
    }
    let first = Reflect::get_u32(&attachments, 0)?;
    if proxy_helpers::is_missing(&first) {
        return Ok(());
    }
    let clear = Reflect::get(&first, &JsValue::from_str("clearValue"))?;
    if !clear.is_object() {
        return Ok(());
    }

    let keys = Object::keys(clear.unchecked_ref::<Object>());
    let mut components = Vec::with_capacity(keys.length() as usize);
    for key in keys.iter() {
        match Reflect::get(&clear, &key)?.as_f64() {
            Some(v) => components.push(v),
            None => return Ok(()),
        }
    }
    perturb_clear_value(&mut components, seed);
    for (key, value) in keys.iter().zip(components) {
        Reflect::set(&clear, &key, &JsValue::from_f64(value))?;
    }
    Ok(())
}
