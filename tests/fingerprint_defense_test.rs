//! Fingerprint Defense WASM Integration Tests
//!
//! Run with: wasm-pack test --headless --chrome
//! (or --firefox, --safari)
//!
//! All tests share one page, so the descriptor is applied once and every
//! test checks the resulting surfaces.

#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

use persona_core::{DescriptorGenerator, FingerprintDescriptor};
use persona_wasm::fingerprint_defense::proxy_helpers::to_js;

wasm_bindgen_test_configure!(run_in_browser);

fn test_descriptor() -> FingerprintDescriptor {
    let mut descriptor = DescriptorGenerator::seeded(7)
        .generate_from_preset("windows-chrome")
        .expect("preset exists");
    descriptor.flags.disable_webrtc = true;
    descriptor
}

/// Apply the test descriptor (first call) and return it.
fn applied() -> FingerprintDescriptor {
    let descriptor = test_descriptor();
    persona_wasm::apply_fingerprint(to_js(&descriptor).unwrap()).expect("apply should succeed");
    descriptor
}

fn eval(code: &str) -> JsValue {
    js_sys::eval(code).unwrap()
}

fn get(obj: &JsValue, key: &str) -> JsValue {
    Reflect::get(obj, &JsValue::from_str(key)).unwrap()
}

// ===== Apply Tests =====

#[wasm_bindgen_test]
fn apply_is_idempotent() {
    let expected = applied();

    let mut other = DescriptorGenerator::seeded(99)
        .generate_from_preset("mac-chrome")
        .unwrap();
    other.seed = expected.seed + 1;
    let result = persona_wasm::apply_fingerprint(to_js(&other).unwrap()).unwrap();
    assert_eq!(get(&result, "status").as_string().unwrap(), "alreadyApplied");

    let platform = eval("navigator.platform").as_string().unwrap();
    assert_eq!(platform, expected.navigator.unwrap().platform, "First descriptor should stay in place");
}

#[wasm_bindgen_test]
fn guard_flag_set() {
    applied();
    assert_eq!(eval("globalThis.__fp_applied__"), JsValue::TRUE);
    // not enumerable, so it does not show up in Object.keys(window)
    assert_eq!(eval("Object.keys(globalThis).includes('__fp_applied__')"), JsValue::FALSE);
}

#[wasm_bindgen_test]
fn bootstrap_after_apply_reports_applied() {
    applied();
    let result = persona_wasm::bootstrap_page(JsValue::UNDEFINED).unwrap();
    assert_eq!(get(&result, "status").as_string().unwrap(), "alreadyApplied");
}

#[wasm_bindgen_test]
fn installed_surfaces_listed() {
    applied();
    let surfaces: Array = persona_wasm::bootstrap::installed_surfaces().dyn_into().unwrap();
    let names: Vec<String> = surfaces.iter().filter_map(|s| s.as_string()).collect();
    assert!(names.contains(&"navigator.platform".to_string()));
    assert!(names.contains(&"HTMLCanvasElement.prototype.toDataURL".to_string()));
}

#[wasm_bindgen_test]
fn malformed_descriptor_rejected() {
    let err = persona_wasm::apply_fingerprint(JsValue::from_f64(3.0)).unwrap_err();
    assert!(get(&err, "message").as_string().unwrap().contains("expected an object"));
    assert_eq!(get(&err, "isFatal"), JsValue::FALSE);
}

// ===== Navigator / Screen Tests =====

#[wasm_bindgen_test]
fn navigator_matches_descriptor() {
    let navigator = applied().navigator.unwrap();

    assert_eq!(eval("navigator.platform").as_string().unwrap(), navigator.platform);
    assert_eq!(eval("navigator.language").as_string().unwrap(), navigator.language);
    assert_eq!(
        eval("navigator.hardwareConcurrency").as_f64().unwrap(),
        f64::from(navigator.hardware_concurrency)
    );
    assert_eq!(eval("Object.isFrozen(navigator.languages)"), JsValue::TRUE);
}

#[wasm_bindgen_test]
fn screen_matches_descriptor() {
    let screen = applied().screen.unwrap();

    assert_eq!(eval("screen.width").as_f64().unwrap(), f64::from(screen.width));
    assert_eq!(eval("screen.availHeight").as_f64().unwrap(), f64::from(screen.avail_height()));
    assert_eq!(eval("screen.pixelDepth").as_f64().unwrap(), f64::from(screen.color_depth));
}

// ===== Canvas Tests =====

#[wasm_bindgen_test]
fn canvas_reads_are_stable() {
    applied();
    let stable = eval(
        "(() => {
            const c = document.createElement('canvas');
            c.width = 32; c.height = 32;
            const ctx = c.getContext('2d');
            ctx.fillStyle = '#3a7';
            ctx.fillRect(0, 0, 32, 32);
            ctx.fillStyle = '#fff';
            ctx.fillRect(8, 8, 16, 16);
            const a = ctx.getImageData(0, 0, 32, 32).data.join(',');
            const b = ctx.getImageData(0, 0, 32, 32).data.join(',');
            return a === b && c.toDataURL() === c.toDataURL();
        })()",
    );
    assert_eq!(stable, JsValue::TRUE, "Same seed should give the same pixels every read");
}

#[wasm_bindgen_test]
fn canvas_export_leaves_source_untouched() {
    applied();
    let untouched = eval(
        "(() => {
            const c = document.createElement('canvas');
            c.width = 8; c.height = 8;
            const ctx = c.getContext('2d');
            ctx.fillStyle = '#000';
            ctx.fillRect(0, 0, 8, 8);
            const before = ctx.getImageData(0, 0, 8, 8).data.join(',');
            c.toDataURL();
            return ctx.getImageData(0, 0, 8, 8).data.join(',') === before;
        })()",
    );
    assert_eq!(untouched, JsValue::TRUE);
}

#[wasm_bindgen_test]
fn wrappers_look_native() {
    applied();
    let native = eval(
        "Function.prototype.toString.call(HTMLCanvasElement.prototype.toDataURL).includes('[native code]')",
    );
    assert_eq!(native, JsValue::TRUE);
    assert_eq!(
        eval("HTMLCanvasElement.prototype.toDataURL.name").as_string().unwrap(),
        "toDataURL"
    );
}

// ===== WebGL Tests =====

#[wasm_bindgen_test]
fn webgl_reports_descriptor_gpu() {
    let gpu = applied().gpu_info.unwrap();
    let gl = eval("document.createElement('canvas').getContext('webgl')");
    if gl.is_null() {
        return;
    }
    let parameter = |code: u32| {
        let args = Array::of1(&JsValue::from_f64(f64::from(code)));
        let method: js_sys::Function = get(&gl, "getParameter").dyn_into().unwrap();
        method.apply(&gl, &args).unwrap()
    };
    assert_eq!(parameter(0x9245).as_string().unwrap(), gpu.vendor);
    assert_eq!(parameter(0x9246).as_string().unwrap(), gpu.renderer);
}

#[wasm_bindgen_test]
fn webgl_read_keeps_page_bindings() {
    applied();
    let kept = eval(
        "(() => {
            const gl = document.createElement('canvas').getContext('webgl');
            if (!gl) return true;
            const shader = (type, source) => {
                const s = gl.createShader(type);
                gl.shaderSource(s, source);
                gl.compileShader(s);
                return s;
            };
            const prog = gl.createProgram();
            gl.attachShader(prog, shader(gl.VERTEX_SHADER,
                'attribute vec3 p; void main() { gl_Position = vec4(p, 1.0); }'));
            gl.attachShader(prog, shader(gl.FRAGMENT_SHADER,
                'void main() { gl_FragColor = vec4(1.0); }'));
            gl.linkProgram(prog);
            gl.useProgram(prog);
            const buf = gl.createBuffer();
            gl.bindBuffer(gl.ARRAY_BUFFER, buf);
            gl.bufferData(gl.ARRAY_BUFFER, new Float32Array(12), gl.STATIC_DRAW);
            gl.enableVertexAttribArray(0);
            gl.vertexAttribPointer(0, 3, gl.FLOAT, false, 12, 4);

            gl.readPixels(0, 0, 1, 1, gl.RGBA, gl.UNSIGNED_BYTE, new Uint8Array(4));

            return gl.getParameter(gl.CURRENT_PROGRAM) === prog
                && gl.getParameter(gl.ARRAY_BUFFER_BINDING) === buf
                && gl.getVertexAttrib(0, gl.VERTEX_ATTRIB_ARRAY_ENABLED) === true
                && gl.getVertexAttrib(0, gl.VERTEX_ATTRIB_ARRAY_BUFFER_BINDING) === buf
                && gl.getVertexAttrib(0, gl.VERTEX_ATTRIB_ARRAY_SIZE) === 3
                && gl.getVertexAttrib(0, gl.VERTEX_ATTRIB_ARRAY_STRIDE) === 12
                && gl.getVertexAttribOffset(0, gl.VERTEX_ATTRIB_ARRAY_POINTER) === 4;
        })()",
    );
    assert_eq!(kept, JsValue::TRUE, "readPixels should leave the page's GL state as it was");
}

// ===== Audio Tests =====

#[wasm_bindgen_test]
async fn audio_reads_are_memoized() {
    applied();
    let promise: js_sys::Promise = eval(
        "(async () => {
            const render = () => {
                const ctx = new OfflineAudioContext(1, 4410, 44100);
                const osc = ctx.createOscillator();
                osc.frequency.value = 1000;
                osc.connect(ctx.destination);
                osc.start(0);
                return ctx.startRendering();
            };
            const a = await render();
            const b = await render();
            const first = Array.from(a.getChannelData(0)).join(',');
            const again = Array.from(a.getChannelData(0)).join(',');
            const other = Array.from(b.getChannelData(0)).join(',');
            return first === again && first === other;
        })()",
    )
    .dyn_into()
    .unwrap();
    let same = wasm_bindgen_futures::JsFuture::from(promise).await.unwrap();
    assert_eq!(same, JsValue::TRUE, "Repeated and identical renders should read the same samples");
}

// ===== Geometry Tests =====

#[wasm_bindgen_test]
fn client_rect_moves_only_x_and_width() {
    applied();
    let rect = eval(
        "(() => {
            const el = document.createElement('div');
            el.style.cssText = 'position:absolute;left:10px;top:5px;width:100px;height:20px';
            document.body.appendChild(el);
            const r = el.getBoundingClientRect();
            el.remove();
            return r;
        })()",
    );
    let read = |key: &str| get(&rect, key).as_f64().unwrap();
    assert_eq!(read("y"), 5.0);
    assert_eq!(read("height"), 20.0);
    assert!((read("x") - 10.0).abs() < 1e-5);
    assert!((read("width") - 100.0).abs() < 1e-5);
}

#[wasm_bindgen_test]
fn offset_width_shifts_at_most_two_pixels() {
    applied();
    let widths: Array = eval(
        "(() => {
            const el = document.createElement('div');
            el.style.cssText = 'position:absolute;width:100px;height:10px;font-family:monospace';
            document.body.appendChild(el);
            const w = [el.offsetWidth, el.offsetWidth];
            el.remove();
            return w;
        })()",
    )
    .dyn_into()
    .unwrap();
    let first = widths.get(0).as_f64().unwrap();
    assert!([100.0, 99.0, 98.0].contains(&first), "offsetWidth was {}", first);
    assert_eq!(widths.get(1).as_f64().unwrap(), first, "Same element should read the same width");
}

#[wasm_bindgen_test]
fn font_face_still_constructs() {
    applied();
    assert_eq!(eval("new FontFace('Body', 'local(Arial)') instanceof FontFace"), JsValue::TRUE);
    assert_eq!(
        eval("(() => { try { FontFace('x', 'local(Arial)'); return false; } catch (e) { return e instanceof TypeError; } })()"),
        JsValue::TRUE,
        "Calling without new should still throw"
    );
}

// ===== Timezone Tests =====

#[wasm_bindgen_test]
fn timezone_offset_matches_profile() {
    let timezone = applied().timezone.unwrap();

    let offset = eval("new Date().getTimezoneOffset()").as_f64().unwrap();
    assert_eq!(offset, f64::from(timezone.timezone_offset()));

    let zone = eval("new Intl.DateTimeFormat().resolvedOptions().timeZone")
        .as_string()
        .unwrap();
    assert_eq!(zone, timezone.zone);
}

#[wasm_bindgen_test]
fn timezone_offset_agrees_with_to_string() {
    applied();
    let agrees = eval(
        "[Date.UTC(2024, 0, 15), Date.UTC(2024, 6, 15), NaN].every(t => {
            const d = new Date(t);
            if (isNaN(t)) return Number.isNaN(d.getTimezoneOffset());
            const m = d.toString().match(/GMT([+-])(\\d\\d)(\\d\\d)/);
            const east = (m[1] === '+' ? 1 : -1) * (Number(m[2]) * 60 + Number(m[3]));
            return d.getTimezoneOffset() === -east;
        })",
    );
    assert_eq!(agrees, JsValue::TRUE);
}

#[wasm_bindgen_test]
fn explicit_timezone_wins() {
    applied();
    let zone = eval("new Intl.DateTimeFormat('en-US', { timeZone: 'UTC' }).resolvedOptions().timeZone")
        .as_string()
        .unwrap();
    assert_eq!(zone, "UTC");
}

#[wasm_bindgen_test]
fn invalid_date_keeps_native_text() {
    applied();
    let text = eval("new Date(NaN).toString()").as_string().unwrap();
    assert_eq!(text, "Invalid Date");
}

// ===== WebRTC Tests =====

#[wasm_bindgen_test]
fn webrtc_removed() {
    applied();
    assert_eq!(eval("typeof RTCPeerConnection"), JsValue::from_str("undefined"));
    assert_eq!(eval("navigator.mediaDevices === undefined"), JsValue::TRUE);
}

// ===== Generator Exports =====

#[wasm_bindgen_test]
fn presets_exported() {
    let presets: Array = persona_wasm::coordinator::fingerprint_presets().dyn_into().unwrap();
    let names: Vec<String> = presets.iter().filter_map(|p| p.as_string()).collect();
    assert!(names.contains(&"windows-chrome".to_string()));

    let descriptor =
        persona_wasm::coordinator::generate_fingerprint(Some("mac-chrome".to_string())).unwrap();
    let navigator = get(&descriptor, "navigator");
    assert_eq!(get(&navigator, "platform").as_string().unwrap(), "MacIntel");

    assert!(persona_wasm::coordinator::generate_fingerprint(Some("amiga".to_string())).is_err());
}
