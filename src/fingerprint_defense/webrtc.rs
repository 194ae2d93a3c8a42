//! WebRTC and media-capture removal (opt-in).
//!
//! Peer connection constructors become `undefined` and the capture entry
//! points read as `undefined`, so feature detection sees no WebRTC at all.

use wasm_bindgen::prelude::*;

use persona_core::{Channel, Result, SurfaceId};

use super::{count, JsChannelHost};

pub const PEER_CONNECTIONS: [SurfaceId; 3] = [
    SurfaceId::new("globalThis", "RTCPeerConnection"),
    SurfaceId::new("globalThis", "webkitRTCPeerConnection"),
    SurfaceId::new("globalThis", "mozRTCPeerConnection"),
];

pub const MEDIA_CAPTURE: [SurfaceId; 4] = [
    SurfaceId::new("navigator", "mediaDevices"),
    SurfaceId::new("navigator", "getUserMedia"),
    SurfaceId::new("navigator", "webkitGetUserMedia"),
    SurfaceId::new("navigator", "mozGetUserMedia"),
];

pub fn install(host: &mut JsChannelHost) -> Result<usize> {
    let mut hooked = 0;
    for surface in PEER_CONNECTIONS {
        hooked += count(host.remove_constructor(Channel::WebRtc, surface)?);
    }
    for surface in MEDIA_CAPTURE {
        if host.is_present(&surface) {
            hooked += count(host.define_value(Channel::WebRtc, surface, JsValue::UNDEFINED)?);
        }
    }
    Ok(hooked)
}
