//! Navigator, client hints and screen geometry.
//!
//! Values are returned verbatim from the descriptor through read-only
//! accessors defined on the `navigator` and `screen` instances.

use js_sys::{Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use persona_core::descriptor::{NavigatorProfile, ScreenProfile, UserAgentData};
use persona_core::{Channel, FingerprintDescriptor, Result, SurfaceId};

use super::proxy_helpers::{self, to_js, JsResult};
use super::{count, injection_error, JsChannelHost};

pub const NAVIGATOR_PLATFORM: SurfaceId = SurfaceId::new("navigator", "platform");
pub const NAVIGATOR_LANGUAGE: SurfaceId = SurfaceId::new("navigator", "language");
pub const NAVIGATOR_LANGUAGES: SurfaceId = SurfaceId::new("navigator", "languages");
pub const NAVIGATOR_CONCURRENCY: SurfaceId = SurfaceId::new("navigator", "hardwareConcurrency");
pub const NAVIGATOR_MEMORY: SurfaceId = SurfaceId::new("navigator", "deviceMemory");
pub const NAVIGATOR_UA_DATA: SurfaceId = SurfaceId::new("navigator", "userAgentData");

pub const SCREEN_WIDTH: SurfaceId = SurfaceId::new("screen", "width");
pub const SCREEN_AVAIL_WIDTH: SurfaceId = SurfaceId::new("screen", "availWidth");
pub const SCREEN_HEIGHT: SurfaceId = SurfaceId::new("screen", "height");
pub const SCREEN_AVAIL_HEIGHT: SurfaceId = SurfaceId::new("screen", "availHeight");
pub const SCREEN_COLOR_DEPTH: SurfaceId = SurfaceId::new("screen", "colorDepth");
pub const SCREEN_PIXEL_DEPTH: SurfaceId = SurfaceId::new("screen", "pixelDepth");

pub fn install(host: &mut JsChannelHost, descriptor: &FingerprintDescriptor) -> Result<usize> {
    let mut hooked = 0;
    if let Some(navigator) = &descriptor.navigator {
        hooked += install_navigator(host, navigator)?;
    }
    if let Some(screen) = &descriptor.screen {
        hooked += install_screen(host, screen)?;
    }
    Ok(hooked)
}

fn number(value: u32) -> JsValue {
    JsValue::from_f64(f64::from(value))
}

fn install_navigator(host: &mut JsChannelHost, profile: &NavigatorProfile) -> Result<usize> {
    let channel = Channel::Hardware;
    let languages =
        proxy_helpers::frozen_string_array(&profile.languages).map_err(injection_error(channel))?;

    let values = [
        (NAVIGATOR_PLATFORM, JsValue::from_str(&profile.platform)),
        (NAVIGATOR_LANGUAGE, JsValue::from_str(&profile.language)),
        (NAVIGATOR_LANGUAGES, languages),
        (NAVIGATOR_CONCURRENCY, number(profile.hardware_concurrency)),
        (NAVIGATOR_MEMORY, number(profile.device_memory)),
    ];
    let mut hooked = 0;
    for (surface, value) in values {
        hooked += count(host.define_value(channel, surface, value)?);
    }

    // only browsers that ship client hints get them spoofed
    if let Some(ua_data) = &profile.user_agent_data {
        if host.is_present(&NAVIGATOR_UA_DATA) {
            let hints = user_agent_data(ua_data).map_err(injection_error(channel))?;
            hooked += count(host.define_value(channel, NAVIGATOR_UA_DATA, hints)?);
        }
    }
    Ok(hooked)
}

/// `NavigatorUAData` stand-in: low-entropy fields, `getHighEntropyValues()`
/// and `toJSON()`.
fn user_agent_data(data: &UserAgentData) -> JsResult<JsValue> {
    let low_entropy = to_js(&data.low_entropy())?;
    let high_entropy = to_js(data)?;

    let object = Object::new();
    for key in ["brands", "mobile", "platform"] {
        let value = Reflect::get(&low_entropy, &JsValue::from_str(key))?;
        Reflect::set(&object, &JsValue::from_str(key), &value)?;
    }

    let get_high_entropy_values = Closure::wrap(Box::new(move |_hints: JsValue| -> JsValue {
        Promise::resolve(&high_entropy).into()
    }) as Box<dyn FnMut(JsValue) -> JsValue>);
    Reflect::set(
        &object,
        &JsValue::from_str("getHighEntropyValues"),
        get_high_entropy_values.as_ref(),
    )?;
    get_high_entropy_values.forget();

    let to_json = Closure::wrap(Box::new(move || -> JsValue {
        let copy = Object::new();
        Object::assign(&copy, low_entropy.unchecked_ref());
        copy.into()
    }) as Box<dyn FnMut() -> JsValue>);
    Reflect::set(&object, &JsValue::from_str("toJSON"), to_json.as_ref())?;
    to_json.forget();

    Ok(object.into())
}

fn install_screen(host: &mut JsChannelHost, profile: &ScreenProfile) -> Result<usize> {
    let values = [
        (SCREEN_WIDTH, profile.width),
        (SCREEN_AVAIL_WIDTH, profile.width),
        (SCREEN_HEIGHT, profile.height),
        (SCREEN_AVAIL_HEIGHT, profile.avail_height()),
        (SCREEN_COLOR_DEPTH, profile.color_depth),
        (SCREEN_PIXEL_DEPTH, profile.color_depth),
    ];
    let mut hooked = 0;
    for (surface, value) in values {
        hooked += count(host.define_value(Channel::Hardware, surface, number(value))?);
    }
    Ok(hooked)
}
