//! Timezone rebasing.
//!
//! `Intl.DateTimeFormat` and the `Date.prototype.toLocale*` family default
//! to the profile zone and locale. `getTimezoneOffset` and
//! `toString`/`toDateString`/`toTimeString` are rebuilt from the parts of a
//! native formatter running in the profile zone, so both agree across DST.

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use persona_core::channels::timezone::{effective_locale, parts_format_options, DateParts, PARTS_LOCALE};
use persona_core::descriptor::TimezoneProfile;
use persona_core::{Channel, Result, SurfaceId};

use super::proxy_helpers::{self, describe_js_error, to_js, JsResult, Trap};
use super::{count, injection_error, JsChannelHost};

pub const DATE_TIME_FORMAT: SurfaceId = SurfaceId::new("Intl", "DateTimeFormat");
pub const GET_TIMEZONE_OFFSET: SurfaceId = SurfaceId::new("Date.prototype", "getTimezoneOffset");
pub const LOCALE_METHODS: [SurfaceId; 3] = [
    SurfaceId::new("Date.prototype", "toLocaleString"),
    SurfaceId::new("Date.prototype", "toLocaleDateString"),
    SurfaceId::new("Date.prototype", "toLocaleTimeString"),
];
pub const TO_STRING: SurfaceId = SurfaceId::new("Date.prototype", "toString");
pub const TO_DATE_STRING: SurfaceId = SurfaceId::new("Date.prototype", "toDateString");
pub const TO_TIME_STRING: SurfaceId = SurfaceId::new("Date.prototype", "toTimeString");

#[derive(Clone, Copy)]
enum DateRendering {
    Full,
    Date,
    Time,
}

impl DateRendering {
    fn render(self, parts: &DateParts) -> String {
        match self {
            DateRendering::Full => parts.full_string(),
            DateRendering::Date => parts.date_string(),
            DateRendering::Time => parts.time_string(),
        }
    }
}

pub fn install(host: &mut JsChannelHost, profile: &TimezoneProfile) -> Result<usize> {
    let channel = Channel::Timezone;

    // built from the native constructor before it is wrapped; throws for an
    // unknown zone, which disables the channel
    let formatter = parts_formatter(&profile.zone).map_err(injection_error(channel))?;
    let mut hooked = 0;

    let (zone, locale) = (profile.zone.clone(), profile.locale.clone());
    hooked += count(host.wrap_constructor(channel, DATE_TIME_FORMAT, move |native| {
        let (apply_zone, apply_locale) = (zone.clone(), locale.clone());
        let callable = native.clone();
        let apply = Box::new(move |_target: JsValue, _this: JsValue, args: JsValue| -> JsResult<JsValue> {
            // `Intl.DateTimeFormat()` without `new` still constructs
            let args = rebase_args(&args, &apply_zone, &apply_locale);
            Reflect::construct(callable.unchecked_ref::<Function>(), &args)
        }) as Trap;
        let construct = Box::new(move |_target: JsValue, args: JsValue, new_target: JsValue| -> JsResult<JsValue> {
            let args = rebase_args(&args, &zone, &locale);
            Reflect::construct_with_new_target(
                native.unchecked_ref::<Function>(),
                &args,
                new_target.unchecked_ref::<Function>(),
            )
        }) as Trap;
        (apply, construct)
    })?);

    let fixed_offset = profile.timezone_offset();
    let offset_formatter = formatter.clone();
    hooked += count(host.wrap_method(channel, GET_TIMEZONE_OFFSET, move |native| {
        Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
            match date_parts(&offset_formatter, &this_arg) {
                Ok(parts) => {
                    let offset = parts.timezone_offset().unwrap_or(fixed_offset);
                    Ok(JsValue::from_f64(f64::from(offset)))
                }
                // NaN for invalid dates, TypeError for other receivers
                Err(_) => proxy_helpers::call_function(&native, &this_arg, &args),
            }
        }) as Trap
    })?);

    for surface in LOCALE_METHODS {
        let (zone, locale) = (profile.zone.clone(), profile.locale.clone());
        hooked += count(host.wrap_method(channel, surface, move |native| {
            Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                let args = rebase_args(&args, &zone, &locale);
                proxy_helpers::call_function(&native, &this_arg, &args)
            }) as Trap
        })?);
    }

    let renderings = [
        (TO_STRING, DateRendering::Full),
        (TO_DATE_STRING, DateRendering::Date),
        (TO_TIME_STRING, DateRendering::Time),
    ];
    for (surface, rendering) in renderings {
        let formatter = formatter.clone();
        hooked += count(host.wrap_method(channel, surface, move |native| {
            Box::new(move |_target: JsValue, this_arg: JsValue, args: JsValue| -> JsResult<JsValue> {
                match date_parts(&formatter, &this_arg) {
                    Ok(parts) => Ok(JsValue::from_str(&rendering.render(&parts))),
                    // invalid dates and the like keep the native text
                    Err(err) => {
                        log::debug!("Native date rendering: {}", describe_js_error(&err));
                        proxy_helpers::call_function(&native, &this_arg, &args)
                    }
                }
            }) as Trap
        })?);
    }

    Ok(hooked)
}

fn parts_formatter(zone: &str) -> JsResult<JsValue> {
    let intl = proxy_helpers::get_global("Intl")?;
    let native: Function = Reflect::get(&intl, &JsValue::from_str("DateTimeFormat"))?.dyn_into()?;
    let options = to_js(&parts_format_options(zone))?;
    Reflect::construct(&native, &Array::of2(&JsValue::from_str(PARTS_LOCALE), &options))
}

fn date_parts(formatter: &JsValue, date: &JsValue) -> JsResult<DateParts> {
    if !date.is_instance_of::<js_sys::Date>() {
        return Err(JsValue::from_str("receiver is not a Date"));
    }
    let parts = proxy_helpers::call_method(formatter, "formatToParts", &Array::of1(date))?;
    let parts: Array = parts.dyn_into()?;
    let pairs = parts.iter().filter_map(|part| {
        let kind = Reflect::get(&part, &JsValue::from_str("type")).ok()?.as_string()?;
        let value = Reflect::get(&part, &JsValue::from_str("value")).ok()?.as_string()?;
        Some((kind, value))
    });
    Ok(DateParts::from_parts(pairs))
}

/// `(locales || profileLocale, Object.assign({ timeZone }, options))`,
/// followed by any further arguments unchanged.
fn rebase_args(args: &JsValue, zone: &str, locale: &str) -> Array {
    let args = Array::from(args);

    let requested = args.get(0);
    let locales = match requested.as_string() {
        Some(requested) => JsValue::from_str(effective_locale(Some(&requested), locale)),
        None if requested.is_falsy() => JsValue::from_str(locale),
        None => requested,
    };

    let options = Object::new();
    let _ = Reflect::set(&options, &JsValue::from_str("timeZone"), &JsValue::from_str(zone));
    let supplied = args.get(1);
    if supplied.is_object() {
        Object::assign(&options, supplied.unchecked_ref());
    }

    args.set(0, locales);
    args.set(1, options.into());
    args
}
