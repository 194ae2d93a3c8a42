//! Extension-side coordinator export.
//!
//! The navigation layer calls into [`ShieldCoordinator`] at page-load
//! start, when an identity changes and when a page reports back. Async
//! operations return Promises; every delivery failure resolves to `null`
//! so the page simply loads unspoofed.

use std::rc::Rc;

use js_sys::Promise;
use rand::rngs::StdRng;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use persona_core::catalogue::PRESETS;
use persona_core::{
    Coordinator, DescriptorGenerator, IdentityId, PageLoadId, PolicyResolver, ShieldError,
};

use crate::fingerprint_defense::proxy_helpers::to_js;
use crate::identity_store::JsIdentityStore;
use crate::{error_to_js, now_ms, parse_config};

type Inner = Coordinator<JsIdentityStore, StdRng>;

fn page_id(page: f64) -> Result<PageLoadId, JsValue> {
    if page.is_finite() && page >= 0.0 && page.fract() == 0.0 {
        Ok(PageLoadId(page as u64))
    } else {
        Err(error_to_js(&ShieldError::Config(format!("invalid page load id {}", page))))
    }
}

#[wasm_bindgen]
pub struct ShieldCoordinator {
    inner: Rc<Inner>,
}

#[wasm_bindgen]
impl ShieldCoordinator {
    /// Create a coordinator over a host identity store (see
    /// `JsIdentityStore`) and optional shield options.
    #[wasm_bindgen(constructor)]
    pub fn new(store: JsValue, options: JsValue) -> Result<ShieldCoordinator, JsValue> {
        let config = parse_config(options);
        log::set_max_level(config.level_filter());

        let store = JsIdentityStore::new(store).map_err(|e| error_to_js(&e))?;
        let resolver = PolicyResolver::new(store, DescriptorGenerator::from_entropy());
        log::info!("Shield coordinator created");
        Ok(Self {
            inner: Rc::new(Coordinator::new(resolver, config.delivery)),
        })
    }

    /// Resolve and stage the payload for a page load.
    ///
    /// Resolves to `{ page, payload, descriptor }` or `null` when the page
    /// must run unspoofed.
    #[wasm_bindgen(js_name = onPageLoadStarting)]
    pub fn on_page_load_starting(&self, page: f64, url: String) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let page = page_id(page)?;
            match inner.on_page_load_starting(page, &url, now_ms()).await {
                Some(snapshot) => to_js(&snapshot),
                None => Ok(JsValue::NULL),
            }
        })
    }

    /// Invalidate pending deliveries for the identity that was active
    /// before the switch. Returns the affected page load ids.
    #[wasm_bindgen(js_name = onIdentitySwitched)]
    pub fn on_identity_switched(&self, previous: String) -> JsValue {
        let pages = self.inner.on_identity_switched(&IdentityId::new(previous));
        to_js(&pages).unwrap_or(JsValue::NULL)
    }

    /// Take the one-shot payload for a page load, if still valid.
    #[wasm_bindgen(js_name = takePayload)]
    pub fn take_payload(&self, page: f64) -> Result<Option<String>, JsValue> {
        Ok(self.inner.take_payload(page_id(page)?, now_ms()))
    }

    #[wasm_bindgen(js_name = onApplied)]
    pub fn on_applied(&self, page: f64) -> Result<(), JsValue> {
        self.inner.on_applied(page_id(page)?);
        Ok(())
    }

    /// The page load was closed or navigated away; drop its delivery.
    #[wasm_bindgen(js_name = onPageGone)]
    pub fn on_page_gone(&self, page: f64) -> Result<(), JsValue> {
        self.inner.on_page_gone(page_id(page)?);
        Ok(())
    }

    /// Delivery state name for a page load, `undefined` when unknown.
    #[wasm_bindgen(js_name = deliveryState)]
    pub fn delivery_state(&self, page: f64) -> Result<JsValue, JsValue> {
        let state = self.inner.delivery_state(page_id(page)?);
        match state {
            Some(state) => to_js(&state),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Replace an identity's descriptor with a freshly generated one.
    pub fn regenerate(&self, identity: String) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let descriptor = inner
                .regenerate(&IdentityId::new(identity))
                .await
                .map_err(|e| error_to_js(&e))?;
            to_js(&descriptor)
        })
    }

    /// Replace an identity's descriptor with one pinned to a named preset.
    #[wasm_bindgen(js_name = regenerateFromPreset)]
    pub fn regenerate_from_preset(&self, identity: String, preset: String) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let identity = IdentityId::new(identity);
            inner.on_identity_switched(&identity);
            let descriptor = inner
                .resolver()
                .regenerate_from_preset(&identity, &preset)
                .await
                .map_err(|e| error_to_js(&e))?;
            to_js(&descriptor)
        })
    }
}

/// Generate a standalone descriptor, optionally pinned to a preset.
#[wasm_bindgen]
pub fn generate_fingerprint(preset: Option<String>) -> Result<JsValue, JsValue> {
    let mut generator = DescriptorGenerator::from_entropy();
    let descriptor = match preset {
        Some(name) => generator
            .generate_from_preset(&name)
            .ok_or_else(|| error_to_js(&ShieldError::Config(format!("unknown preset '{}'", name))))?,
        None => generator.generate(),
    };
    to_js(&descriptor)
}

/// Names accepted by `generate_fingerprint` and `regenerateFromPreset`.
#[wasm_bindgen]
pub fn fingerprint_presets() -> JsValue {
    let names: Vec<&str> = PRESETS.iter().map(|p| p.name).collect();
    to_js(&names).unwrap_or(JsValue::NULL)
}
