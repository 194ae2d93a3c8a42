//! Identity store backed by host callbacks.
//!
//! The extension keeps identities, whitelist and toggles in its own
//! storage. It hands the coordinator an object with these methods, each of
//! which may return a value or a Promise:
//!
//! | method                          | returns                        |
//! |---------------------------------|--------------------------------|
//! | `getActiveIdentity(origin)`     | identity id string or null     |
//! | `getDescriptor(id)`             | descriptor object or null      |
//! | `putDescriptor(id, descriptor)` | anything                       |
//! | `getOriginDefault(origin)`      | descriptor object or null      |
//! | `putOriginDefault(origin, d)`   | anything                       |
//! | `getWhitelist()`                | array of host patterns         |
//! | `getChannelToggles()`           | toggles object                 |
//!
//! The two origin-default methods are optional; without them the defaults
//! are kept in memory for the lifetime of the coordinator.

use async_trait::async_trait;
use js_sys::{Array, Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use persona_core::{
    ChannelToggles, FingerprintDescriptor, IdentityId, IdentityStore, MemoryIdentityStore, Result,
    ShieldError,
};

use crate::fingerprint_defense::proxy_helpers::{describe_js_error, to_js};

const REQUIRED_METHODS: [&str; 5] = [
    "getActiveIdentity",
    "getDescriptor",
    "putDescriptor",
    "getWhitelist",
    "getChannelToggles",
];

pub struct JsIdentityStore {
    callbacks: Object,
    /// Origin defaults when the host does not persist them.
    fallback: MemoryIdentityStore,
}

impl JsIdentityStore {
    /// Wrap a host callback object, checking the required methods exist.
    pub fn new(callbacks: JsValue) -> Result<Self> {
        let callbacks: Object = callbacks
            .dyn_into()
            .map_err(|_| ShieldError::Config("identity store must be an object".into()))?;
        for name in REQUIRED_METHODS {
            if !Self::has_method(&callbacks, name) {
                return Err(ShieldError::Config(format!("identity store lacks {}()", name)));
            }
        }
        Ok(Self {
            callbacks,
            fallback: MemoryIdentityStore::new(),
        })
    }

    fn has_method(callbacks: &Object, name: &str) -> bool {
        Reflect::get(callbacks, &JsValue::from_str(name))
            .map(|f| f.is_function())
            .unwrap_or(false)
    }

    /// Call `name(...args)` and await the result if it is a Promise.
    async fn call(&self, name: &str, args: &[JsValue]) -> Result<JsValue> {
        let storage_error = |e: JsValue| ShieldError::Storage(format!("{}: {}", name, describe_js_error(&e)));

        let method: js_sys::Function = Reflect::get(&self.callbacks, &JsValue::from_str(name))
            .map_err(storage_error)?
            .dyn_into()
            .map_err(|_| ShieldError::Storage(format!("{} is not a function", name)))?;
        let args: Array = args.iter().collect();
        let value = method.apply(&self.callbacks, &args).map_err(storage_error)?;

        match value.dyn_into::<Promise>() {
            Ok(promise) => JsFuture::from(promise).await.map_err(storage_error),
            Err(value) => Ok(value),
        }
    }

    async fn call_for_descriptor(&self, name: &str, key: &str) -> Result<Option<FingerprintDescriptor>> {
        let value = self.call(name, &[JsValue::from_str(key)]).await?;
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        let descriptor: FingerprintDescriptor = serde_wasm_bindgen::from_value(value)
            .map_err(|e| ShieldError::MalformedDescriptor(format!("{}: {}", name, e)))?;
        Ok(Some(descriptor))
    }

    async fn call_with_descriptor(
        &self,
        name: &str,
        key: &str,
        descriptor: &FingerprintDescriptor,
    ) -> Result<()> {
        let value = to_js(descriptor)
            .map_err(|e| ShieldError::Internal(format!("descriptor conversion: {}", describe_js_error(&e))))?;
        self.call(name, &[JsValue::from_str(key), value]).await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl IdentityStore for JsIdentityStore {
    async fn get_active_identity(&self, origin: &str) -> Result<Option<IdentityId>> {
        let value = self.call("getActiveIdentity", &[JsValue::from_str(origin)]).await?;
        Ok(value.as_string().filter(|id| !id.is_empty()).map(IdentityId::new))
    }

    async fn get_descriptor(&self, identity: &IdentityId) -> Result<Option<FingerprintDescriptor>> {
        self.call_for_descriptor("getDescriptor", identity.as_str()).await
    }

    async fn put_descriptor(
        &self,
        identity: &IdentityId,
        descriptor: &FingerprintDescriptor,
    ) -> Result<()> {
        self.call_with_descriptor("putDescriptor", identity.as_str(), descriptor)
            .await
    }

    async fn get_origin_default(&self, origin: &str) -> Result<Option<FingerprintDescriptor>> {
        if !Self::has_method(&self.callbacks, "getOriginDefault") {
            return self.fallback.get_origin_default(origin).await;
        }
        self.call_for_descriptor("getOriginDefault", origin).await
    }

    async fn put_origin_default(
        &self,
        origin: &str,
        descriptor: &FingerprintDescriptor,
    ) -> Result<()> {
        if !Self::has_method(&self.callbacks, "putOriginDefault") {
            return self.fallback.put_origin_default(origin, descriptor).await;
        }
        self.call_with_descriptor("putOriginDefault", origin, descriptor)
            .await
    }

    async fn get_whitelist(&self) -> Result<Vec<String>> {
        let value = self.call("getWhitelist", &[]).await?;
        if value.is_null() || value.is_undefined() {
            return Ok(Vec::new());
        }
        serde_wasm_bindgen::from_value(value)
            .map_err(|e| ShieldError::Storage(format!("getWhitelist: {}", e)))
    }

    async fn get_channel_toggles(&self) -> Result<ChannelToggles> {
        let value = self.call("getChannelToggles", &[]).await?;
        if value.is_null() || value.is_undefined() {
            return Ok(ChannelToggles::default());
        }
        serde_wasm_bindgen::from_value(value)
            .map_err(|e| ShieldError::Storage(format!("getChannelToggles: {}", e)))
    }
}
