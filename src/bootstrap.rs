//! Page-side bootstrap.
//!
//! Runs in every page and worker context before page script. The first of
//! three paths to produce a descriptor wins:
//!
//! 1. the payload already sitting in the handoff slot at bootstrap
//! 2. the ready event dispatched by the extension
//! 3. a bounded backup poll of the handoff slot
//!
//! [`apply_fingerprint`] is the direct path used when the extension injects
//! the descriptor itself. All paths share one [`PageSession`] per context,
//! so hooks are installed at most once.

use std::cell::RefCell;

use gloo_timers::future::TimeoutFuture;
use js_sys::JSON;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

use persona_core::delivery::page::PagePhase;
use persona_core::{
    ApplyOutcome, Channel, DeliveryConfig, ErrorInfo, FingerprintDescriptor, HandoffSlot,
    PageSession, PollStatus, ShieldError,
};

use crate::fingerprint_defense::proxy_helpers::{describe_js_error, to_js};
use crate::fingerprint_defense::JsChannelHost;
use crate::{error_to_js, now_ms, parse_config};

/// Handoff slot backed by the page's `sessionStorage`.
pub struct SessionStorageSlot {
    key: String,
}

impl SessionStorageSlot {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage() -> Option<web_sys::Storage> {
        // workers and sandboxed frames have no sessionStorage; reading it
        // can also throw on opaque origins
        web_sys::window()?.session_storage().ok()?
    }
}

impl HandoffSlot for SessionStorageSlot {
    fn read(&self) -> Option<String> {
        Self::storage()?.get_item(&self.key).ok()?
    }

    fn clear(&self) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(&self.key);
        }
    }
}

struct PageContext {
    session: PageSession,
    host: JsChannelHost,
    slot: SessionStorageSlot,
}

impl PageContext {
    fn new(config: DeliveryConfig) -> Self {
        Self {
            host: JsChannelHost::new(config.guard_flag.clone()),
            slot: SessionStorageSlot::new(config.handoff_key.clone()),
            session: PageSession::new(config, now_ms()),
        }
    }
}

thread_local! {
    static PAGE: RefCell<Option<PageContext>> = RefCell::new(None);
}

/// Run `f` against this context's session, creating it with `config` first
/// if needed. `None` if the session is busy (re-entrant call from a hook).
fn with_page<T>(config: impl FnOnce() -> DeliveryConfig, f: impl FnOnce(&mut PageContext) -> T) -> Option<T> {
    PAGE.with(|page| {
        let mut page = page.try_borrow_mut().ok()?;
        let context = page.get_or_insert_with(|| PageContext::new(config()));
        Some(f(context))
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailedChannel {
    channel: Channel,
    error: ErrorInfo,
}

/// What an apply attempt did, as returned to JS.
#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApplyStatus {
    status: &'static str,
    installed: Vec<Channel>,
    failed: Vec<FailedChannel>,
    skipped: Vec<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

impl From<&ApplyOutcome> for ApplyStatus {
    fn from(outcome: &ApplyOutcome) -> Self {
        match outcome {
            ApplyOutcome::Applied(report) => ApplyStatus {
                status: "applied",
                installed: report.installed.clone(),
                failed: report
                    .failed
                    .iter()
                    .map(|(channel, err)| FailedChannel {
                        channel: *channel,
                        error: ErrorInfo::from(err),
                    })
                    .collect(),
                skipped: report.skipped.iter().map(|(channel, _)| *channel).collect(),
                error: None,
            },
            ApplyOutcome::AlreadyApplied => ApplyStatus {
                status: "alreadyApplied",
                ..Default::default()
            },
            ApplyOutcome::NothingDelivered => ApplyStatus {
                status: "waiting",
                ..Default::default()
            },
            ApplyOutcome::Rejected(err) => ApplyStatus {
                status: "rejected",
                error: Some(ErrorInfo::from(err)),
                ..Default::default()
            },
            ApplyOutcome::Expired => ApplyStatus {
                status: "expired",
                ..Default::default()
            },
        }
    }
}

fn status_to_js(outcome: &ApplyOutcome) -> Result<JsValue, JsValue> {
    to_js(&ApplyStatus::from(outcome))
}

fn busy() -> JsValue {
    error_to_js(&ShieldError::Internal("page session is busy".into()))
}

/// Start the page-side handoff for this context.
///
/// `options` is an optional shield config object (see `ShieldConfig`).
/// Resolves immediately with the bootstrap status; later deliveries via the
/// ready event or the backup poll are applied in the background. Calling it
/// again in the same context returns the current status.
#[wasm_bindgen]
pub fn bootstrap_page(options: JsValue) -> Result<JsValue, JsValue> {
    let config = parse_config(options);
    log::set_max_level(config.level_filter());
    let delivery = config.delivery.clone();

    let already_running = PAGE.with(|page| page.borrow().is_some());
    let (outcome, listening) = with_page(
        || delivery.clone(),
        |ctx| {
            if already_running {
                let outcome = match ctx.session.phase() {
                    PagePhase::Applied => ApplyOutcome::AlreadyApplied,
                    PagePhase::GaveUp => ApplyOutcome::Expired,
                    PagePhase::Listening => ApplyOutcome::NothingDelivered,
                };
                return (outcome, false);
            }
            let outcome = ctx.session.bootstrap(&mut ctx.host, &ctx.slot, now_ms());
            (outcome, ctx.session.phase() == PagePhase::Listening)
        },
    )
    .ok_or_else(busy)?;

    // a stale or malformed slot payload still leaves the session waiting
    if listening {
        listen_for_ready_event(&delivery)?;
        spawn_backup_poll(&delivery);
    }
    status_to_js(&outcome)
}

/// Apply a descriptor directly, bypassing the handoff.
///
/// Accepts a descriptor object or its JSON text. A context that is already
/// spoofed is left alone.
#[wasm_bindgen]
pub fn apply_fingerprint(descriptor: JsValue) -> Result<JsValue, JsValue> {
    let descriptor = parse_descriptor(descriptor).map_err(|e| error_to_js(&e))?;
    let outcome = with_page(DeliveryConfig::default, |ctx| {
        ctx.session.apply(&mut ctx.host, &descriptor)
    })
    .ok_or_else(busy)?;
    status_to_js(&outcome)
}

/// Surfaces hooked in this context, as `"target.member"` strings.
#[wasm_bindgen]
pub fn installed_surfaces() -> JsValue {
    let names = PAGE.with(|page| {
        page.try_borrow()
            .ok()
            .and_then(|page| {
                page.as_ref()
                    .map(|ctx| ctx.host.table().surfaces().map(|s| s.to_string()).collect::<Vec<_>>())
            })
            .unwrap_or_default()
    });
    to_js(&names).unwrap_or(JsValue::NULL)
}

fn parse_descriptor(value: JsValue) -> persona_core::Result<FingerprintDescriptor> {
    if let Some(json) = value.as_string() {
        return FingerprintDescriptor::from_payload(&json);
    }
    if !value.is_object() {
        return Err(ShieldError::MalformedDescriptor("expected an object".into()));
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| ShieldError::MalformedDescriptor(e.to_string()))
}

/// Event `detail` as payload text: strings verbatim, objects as JSON.
fn event_payload(event: &web_sys::Event) -> Option<String> {
    let detail = event.dyn_ref::<web_sys::CustomEvent>()?.detail();
    if let Some(text) = detail.as_string() {
        return Some(text);
    }
    if !detail.is_object() {
        return None;
    }
    JSON::stringify(&detail).ok()?.as_string()
}

fn listen_for_ready_event(config: &DeliveryConfig) -> Result<(), JsValue> {
    // workers get their payload through apply_fingerprint
    let Some(window) = web_sys::window() else {
        return Ok(());
    };

    let on_ready = Closure::wrap(Box::new(move |event: web_sys::Event| {
        let Some(payload) = event_payload(&event) else {
            log::debug!("Ready event without a payload");
            return;
        };
        let handled = with_page(DeliveryConfig::default, |ctx| {
            let outcome = ctx.session.receive(&mut ctx.host, &payload, now_ms());
            // the same payload may still be waiting in the slot
            ctx.slot.clear();
            outcome
        });
        if handled.is_none() {
            log::warn!("Ready event dropped: page session busy");
        }
    }) as Box<dyn FnMut(web_sys::Event)>);

    window
        .add_event_listener_with_callback(&config.ready_event, on_ready.as_ref().unchecked_ref())
        .map_err(|e| {
            log::warn!("Could not listen for {}: {}", config.ready_event, describe_js_error(&e));
            e
        })?;
    on_ready.forget();
    Ok(())
}

fn spawn_backup_poll(config: &DeliveryConfig) {
    let interval = config.poll_interval_ms;
    spawn_local(async move {
        loop {
            TimeoutFuture::new(interval).await;
            let status = with_page(DeliveryConfig::default, |ctx| {
                ctx.session.poll(&mut ctx.host, &ctx.slot, now_ms())
            });
            if let Some(PollStatus::Done) = status {
                break;
            }
        }
    });
}
