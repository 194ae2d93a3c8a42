//! # Persona WASM
//!
//! Browser bindings for the fingerprint persona engine.
//!
//! The decisions (which descriptor a page gets, how each surface is
//! perturbed) live in `persona-core`. This crate owns the two browser
//! sides of the pipeline:
//!
//! ```text
//! ShieldCoordinator (extension background)
//!   ↓  payload in the handoff slot / ready event
//! bootstrap_page (page or worker, before any page script)
//!   ↓
//! JsChannelHost → per-channel Proxy hooks
//! ```
//!
//! ## Exports
//!
//! - [`bootstrap_page`](bootstrap::bootstrap_page): start the page-side handoff
//! - [`apply_fingerprint`](bootstrap::apply_fingerprint): direct apply, no handoff
//! - [`ShieldCoordinator`](coordinator::ShieldCoordinator): per-page-load delivery
//! - [`generate_fingerprint`](coordinator::generate_fingerprint): one-off descriptors

use wasm_bindgen::prelude::*;

use persona_core::{ErrorInfo, ShieldConfig, ShieldError, VERSION};

pub mod bootstrap;
pub mod coordinator;
pub mod fingerprint_defense;
pub mod identity_store;

pub use bootstrap::{apply_fingerprint, bootstrap_page, SessionStorageSlot};
pub use coordinator::ShieldCoordinator;
pub use fingerprint_defense::JsChannelHost;
pub use identity_store::JsIdentityStore;

/// Initialize the WASM module
///
/// This sets up logging. A logger installed by an earlier module instance
/// in the same context is kept.
#[wasm_bindgen(start)]
pub fn init() {
    let _ = console_log::init_with_level(log::Level::Info);

    log::info!("Persona shield {} initialized", VERSION);
}

/// Set the log level ("error" .. "trace"; unknown means "info"), installing
/// the console logger first if the start hook has not.
#[wasm_bindgen]
pub fn init_logging(level: &str) {
    let _ = console_log::init_with_level(log::Level::Trace);
    let config = ShieldConfig {
        log_level: level.to_string(),
        ..ShieldConfig::default()
    };
    log::set_max_level(config.level_filter());
}

/// Crate version
#[wasm_bindgen]
pub fn version() -> String {
    VERSION.to_string()
}

/// Milliseconds since the epoch on the page's clock.
pub(crate) fn now_ms() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `{ code, message, isFatal, isSilent }` for a thrown error.
pub(crate) fn error_to_js(err: &ShieldError) -> JsValue {
    fingerprint_defense::proxy_helpers::to_js(&ErrorInfo::from(err))
        .unwrap_or_else(|_| JsValue::from_str(&err.to_string()))
}

/// Parse the options object shared by the exports. `undefined`, `null`
/// and anything that fails validation fall back to the defaults.
pub(crate) fn parse_config(options: JsValue) -> ShieldConfig {
    if options.is_undefined() || options.is_null() {
        return ShieldConfig::default();
    }
    let parsed: std::result::Result<ShieldConfig, _> = match options.as_string() {
        Some(json) => return ShieldConfig::from_json_or_default(&json),
        None => serde_wasm_bindgen::from_value(options),
    };
    match parsed {
        Ok(config) => match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("Invalid shield options ({}), using defaults", e);
                ShieldConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Unreadable shield options ({}), using defaults", e);
            ShieldConfig::default()
        }
    }
}
