//! Browser interception layer.
//!
//! [`JsChannelHost`] installs the per-channel hooks into the current
//! execution context. Every replaced member goes through the core
//! [`InterceptionTable`], so a surface is wrapped at most once per context
//! and its native implementation stays reachable for passthrough. All
//! replacements are `Proxy` objects around the native members (see
//! [`proxy_helpers`]), which keeps `toString()`, `name` and `length`
//! indistinguishable from the originals.
//!
//! Injectors never let a perturbation failure reach the page: a trap that
//! cannot perturb returns the native result unchanged.

use js_sys::{Object, Reflect};
use wasm_bindgen::prelude::*;

use persona_core::{
    Channel, ChannelHost, FingerprintDescriptor, InterceptionTable, Result, ShieldError, SurfaceId,
    SurfaceKind,
};

pub mod audio;
pub mod canvas;
pub mod client_rects;
pub mod fonts;
pub mod hardware;
pub mod proxy_helpers;
pub mod timezone;
pub mod webgl;
pub mod webgpu;
pub mod webrtc;

use proxy_helpers::{describe_js_error, is_missing, Trap};

/// Convert a thrown JS value into an injection error for `channel`.
pub(crate) fn injection_error(channel: Channel) -> impl Fn(JsValue) -> ShieldError {
    move |err| ShieldError::injection(channel, describe_js_error(&err))
}

/// Installs channels into the global scope it runs in (window or worker).
pub struct JsChannelHost {
    guard_flag: String,
    table: InterceptionTable<JsValue>,
}

impl JsChannelHost {
    pub fn new(guard_flag: impl Into<String>) -> Self {
        Self {
            guard_flag: guard_flag.into(),
            table: InterceptionTable::new(),
        }
    }

    pub fn table(&self) -> &InterceptionTable<JsValue> {
        &self.table
    }

    /// Native implementation of an installed surface.
    pub fn original(&self, surface: &SurfaceId) -> Option<JsValue> {
        self.table.original(surface).cloned()
    }

    /// Whether the context exposes `surface` at all.
    pub fn is_present(&self, surface: &SurfaceId) -> bool {
        proxy_helpers::resolve_path(surface.target)
            .ok()
            .filter(|owner| !is_missing(owner))
            .and_then(|owner| Reflect::get(&owner, &JsValue::from_str(surface.member)).ok())
            .map(|member| !is_missing(&member))
            .unwrap_or(false)
    }

    /// Resolve the object owning `surface`, `None` when the context lacks it.
    fn owner(&self, channel: Channel, surface: &SurfaceId) -> Result<Option<JsValue>> {
        let owner = proxy_helpers::resolve_path(surface.target).map_err(injection_error(channel))?;
        if is_missing(&owner) {
            log::debug!("{} not available, skipping", surface);
            return Ok(None);
        }
        Ok(Some(owner))
    }

    /// Replace a method with a proxy around the native one. `make_trap`
    /// receives the native function.
    ///
    /// Returns `false` when the context has no such method.
    pub fn wrap_method<F>(&mut self, channel: Channel, surface: SurfaceId, make_trap: F) -> Result<bool>
    where
        F: FnOnce(JsValue) -> Trap,
    {
        let owner = match self.owner(channel, &surface)? {
            Some(owner) => owner,
            None => return Ok(false),
        };
        let original = Reflect::get(&owner, &JsValue::from_str(surface.member))
            .map_err(injection_error(channel))?;
        if !original.is_function() {
            log::debug!("{} is not a function, skipping", surface);
            return Ok(false);
        }

        self.table
            .install(surface, channel, SurfaceKind::Method, || {
                let replacement =
                    proxy_helpers::proxy_function_with_apply(&original, make_trap(original.clone()))
                        .map_err(injection_error(channel))?;
                Reflect::set(&owner, &JsValue::from_str(surface.member), &replacement)
                    .map_err(injection_error(channel))?;
                Ok::<_, ShieldError>((original, replacement))
            })?;
        Ok(true)
    }

    /// Replace an accessor's getter with a proxy around the native getter.
    /// The trap's `this` is the receiver the property was read from.
    pub fn wrap_getter<F>(&mut self, channel: Channel, surface: SurfaceId, make_trap: F) -> Result<bool>
    where
        F: FnOnce(JsValue) -> Trap,
    {
        let owner = match self.owner(channel, &surface)? {
            Some(owner) => owner,
            None => return Ok(false),
        };
        let getter =
            proxy_helpers::find_getter(&owner, surface.member).map_err(injection_error(channel))?;
        if !getter.is_function() {
            log::debug!("{} has no getter, skipping", surface);
            return Ok(false);
        }

        self.table
            .install(surface, channel, SurfaceKind::Getter, || {
                let replacement =
                    proxy_helpers::proxy_function_with_apply(&getter, make_trap(getter.clone()))
                        .map_err(injection_error(channel))?;
                proxy_helpers::define_getter(&owner, surface.member, &replacement)
                    .map_err(injection_error(channel))?;
                Ok::<_, ShieldError>((getter, replacement))
            })?;
        Ok(true)
    }

    /// Shadow a property with a getter returning `value`.
    pub fn define_value(&mut self, channel: Channel, surface: SurfaceId, value: JsValue) -> Result<bool> {
        let owner = match self.owner(channel, &surface)? {
            Some(owner) => owner,
            None => return Ok(false),
        };

        self.table
            .install(surface, channel, SurfaceKind::Getter, || {
                let original = Reflect::get(&owner, &JsValue::from_str(surface.member))
                    .map_err(injection_error(channel))?;
                let getter = proxy_helpers::constant_getter(value);
                proxy_helpers::define_getter(&owner, surface.member, &getter)
                    .map_err(injection_error(channel))?;
                Ok::<_, ShieldError>((original, getter))
            })?;
        Ok(true)
    }

    /// Replace a constructor with a proxy trapping both call and `new`.
    pub fn wrap_constructor<F>(&mut self, channel: Channel, surface: SurfaceId, make_traps: F) -> Result<bool>
    where
        F: FnOnce(JsValue) -> (Trap, Trap),
    {
        let owner = match self.owner(channel, &surface)? {
            Some(owner) => owner,
            None => return Ok(false),
        };
        let original = Reflect::get(&owner, &JsValue::from_str(surface.member))
            .map_err(injection_error(channel))?;
        if !original.is_function() {
            log::debug!("{} is not a constructor, skipping", surface);
            return Ok(false);
        }

        self.table
            .install(surface, channel, SurfaceKind::Constructor, || {
                let (apply, construct) = make_traps(original.clone());
                let replacement = proxy_helpers::proxy_constructor(&original, apply, construct)
                    .map_err(injection_error(channel))?;
                Reflect::set(&owner, &JsValue::from_str(surface.member), &replacement)
                    .map_err(injection_error(channel))?;
                Ok::<_, ShieldError>((original, replacement))
            })?;
        Ok(true)
    }

    /// Remove a global constructor, leaving `undefined` in its place.
    pub fn remove_constructor(&mut self, channel: Channel, surface: SurfaceId) -> Result<bool> {
        if !self.is_present(&surface) {
            return Ok(false);
        }
        let owner = match self.owner(channel, &surface)? {
            Some(owner) => owner,
            None => return Ok(false),
        };

        self.table
            .install(surface, channel, SurfaceKind::Constructor, || {
                let original = Reflect::get(&owner, &JsValue::from_str(surface.member))
                    .map_err(injection_error(channel))?;
                Reflect::set(&owner, &JsValue::from_str(surface.member), &JsValue::UNDEFINED)
                    .map_err(injection_error(channel))?;
                Ok::<_, ShieldError>((original, JsValue::UNDEFINED))
            })?;
        Ok(true)
    }

    fn install_channel(&mut self, channel: Channel, descriptor: &FingerprintDescriptor) -> Result<usize> {
        let seed = || {
            descriptor
                .channel_seed(channel)
                .ok_or(ShieldError::MissingSeed(channel))
        };
        match channel {
            Channel::Canvas => canvas::install(self, seed()?),
            Channel::WebGl => webgl::install(self, descriptor),
            Channel::Audio => audio::install(self, seed()?),
            Channel::Font => fonts::install(self, seed()?),
            Channel::DomRect => client_rects::install(self, seed()?),
            Channel::WebGpu => webgpu::install(self, seed()?),
            Channel::Hardware => hardware::install(self, descriptor),
            Channel::Timezone => match &descriptor.timezone {
                Some(profile) => timezone::install(self, profile),
                None => Ok(0),
            },
            Channel::WebRtc => webrtc::install(self),
        }
    }
}

impl ChannelHost for JsChannelHost {
    fn install(&mut self, channel: Channel, descriptor: &FingerprintDescriptor) -> Result<()> {
        let hooked = self.install_channel(channel, descriptor)?;
        if hooked == 0 {
            return Err(ShieldError::UnsupportedSurface(channel.name().to_string()));
        }
        log::debug!("{}: {} surfaces hooked", channel.name(), hooked);
        Ok(())
    }

    fn guard_is_set(&self) -> bool {
        proxy_helpers::get_global(&self.guard_flag)
            .map(|flag| flag.is_truthy())
            .unwrap_or(false)
    }

    fn set_guard(&mut self) {
        // non-enumerable so it does not show up in `Object.keys(window)`
        let descriptor = Object::new();
        let defined = Reflect::set(&descriptor, &JsValue::from_str("value"), &JsValue::TRUE)
            .and_then(|_| {
                proxy_helpers::define_property(&js_sys::global(), &self.guard_flag, &descriptor)
            });
        if let Err(err) = defined {
            log::debug!("Guard flag not defined: {}", describe_js_error(&err));
            let _ = Reflect::set(&js_sys::global(), &JsValue::from_str(&self.guard_flag), &JsValue::TRUE);
        }
    }
}

/// Count a surface that was hooked.
pub(crate) fn count(hooked: bool) -> usize {
    usize::from(hooked)
}
