//! Proxy and Reflect wrappers used by every channel injector.
//!
//! Replacements are built as `Proxy` objects around the native member with
//! an `apply` (or `construct`) trap, so `Function.prototype.toString` on a
//! spoofed member still reports `[native code]` and `name`/`length` are the
//! native ones.

use js_sys::{Array, Function, Object, Reflect};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Three-argument Proxy trap: `apply(target, thisArg, argumentsList)`,
/// `construct(target, argumentsList, newTarget)` or
/// `get(target, property, receiver)`.
pub type Trap = Box<dyn FnMut(JsValue, JsValue, JsValue) -> Result<JsValue, JsValue>>;

/// Result of a call that may throw into Rust.
pub type JsResult<T> = Result<T, JsValue>;

/// Get a property from the global scope.
pub fn get_global(prop: &str) -> Result<JsValue, JsValue> {
    Reflect::get(&js_sys::global(), &JsValue::from_str(prop))
}

/// Walk a dotted path from the global object, e.g. `"Intl"` or
/// `"AudioBuffer.prototype"`. `"globalThis"` is the global itself.
pub fn resolve_path(path: &str) -> Result<JsValue, JsValue> {
    let mut current: JsValue = js_sys::global().into();
    for segment in path.split('.').filter(|s| *s != "globalThis") {
        if current.is_undefined() || current.is_null() {
            break;
        }
        current = Reflect::get(&current, &JsValue::from_str(segment))?;
    }
    Ok(current)
}

pub fn is_missing(value: &JsValue) -> bool {
    value.is_undefined() || value.is_null()
}

fn object_static(name: &str) -> Result<Function, JsValue> {
    let object = get_global("Object")?;
    Reflect::get(&object, &JsValue::from_str(name))?
        .dyn_into()
        .map_err(|_| JsValue::from_str("Object builtin not found"))
}

/// `Object.defineProperty` through `Reflect.apply`, so a non-configurable
/// property surfaces as an `Err` instead of an uncaught exception.
pub fn define_property(obj: &JsValue, prop: &str, descriptor: &Object) -> Result<(), JsValue> {
    let define = object_static("defineProperty")?;
    let args = Array::of3(obj, &JsValue::from_str(prop), descriptor);
    Reflect::apply(&define, &JsValue::UNDEFINED, &args)?;
    Ok(())
}

/// Accessor descriptor of `prop`, looked up along the prototype chain.
pub fn find_getter(obj: &JsValue, prop: &str) -> Result<JsValue, JsValue> {
    let get_own = object_static("getOwnPropertyDescriptor")?;
    let get_proto = object_static("getPrototypeOf")?;
    let mut current = obj.clone();
    while !is_missing(&current) {
        let desc = Reflect::apply(
            &get_own,
            &JsValue::UNDEFINED,
            &Array::of2(&current, &JsValue::from_str(prop)),
        )?;
        if !is_missing(&desc) {
            return Reflect::get(&desc, &JsValue::from_str("get"));
        }
        current = Reflect::apply(&get_proto, &JsValue::UNDEFINED, &Array::of1(&current))?;
    }
    Ok(JsValue::UNDEFINED)
}

/// Install `getter` as the accessor for `prop`.
pub fn define_getter(obj: &JsValue, prop: &str, getter: &JsValue) -> Result<(), JsValue> {
    let descriptor = Object::new();
    Reflect::set(&descriptor, &JsValue::from_str("get"), getter)?;
    Reflect::set(&descriptor, &JsValue::from_str("configurable"), &JsValue::TRUE)?;
    Reflect::set(&descriptor, &JsValue::from_str("enumerable"), &JsValue::TRUE)?;
    define_property(obj, prop, &descriptor)
}

/// A getter function that always returns `value`.
/// The getter closure is a WASM function → native toString().
pub fn constant_getter(value: JsValue) -> JsValue {
    let getter = Closure::wrap(Box::new(move || -> JsValue { value.clone() }) as Box<dyn FnMut() -> JsValue>);
    let function: JsValue = getter.as_ref().clone();
    getter.forget();
    function
}

/// `new Proxy(target, handler)`.
pub fn proxy(target: &JsValue, handler: &Object) -> Result<JsValue, JsValue> {
    let proxy_ctor: Function = get_global("Proxy")?
        .dyn_into()
        .map_err(|_| JsValue::from_str("Proxy not found"))?;
    Reflect::construct(&proxy_ctor, &Array::of2(target, handler))
}

/// Create a Proxy around a target function with an `apply` trap.
/// Use this for method interception where you need to call the original
/// and post-process the result.
pub fn proxy_function_with_apply(target: &JsValue, apply_trap: Trap) -> Result<JsValue, JsValue> {
    let handler = Object::new();
    let apply_trap = Closure::wrap(apply_trap);
    Reflect::set(&handler, &JsValue::from_str("apply"), apply_trap.as_ref())?;
    apply_trap.forget();
    proxy(target, &handler)
}

/// Create a Proxy around a constructor that traps both `new X()` and a
/// plain `X()` call.
pub fn proxy_constructor(
    target: &JsValue,
    apply_trap: Trap,
    construct_trap: Trap,
) -> Result<JsValue, JsValue> {
    let handler = Object::new();
    let apply_trap = Closure::wrap(apply_trap);
    Reflect::set(&handler, &JsValue::from_str("apply"), apply_trap.as_ref())?;
    apply_trap.forget();
    let construct_trap = Closure::wrap(construct_trap);
    Reflect::set(&handler, &JsValue::from_str("construct"), construct_trap.as_ref())?;
    construct_trap.forget();
    proxy(target, &handler)
}

/// A reusable handler object with only a `get` trap, for wrapping many
/// objects the same way.
pub fn handler_with_get(get_trap: Trap) -> Result<Object, JsValue> {
    let handler = Object::new();
    let get_trap = Closure::wrap(get_trap);
    Reflect::set(&handler, &JsValue::from_str("get"), get_trap.as_ref())?;
    get_trap.forget();
    Ok(handler)
}

/// Call a JS function with arguments via Reflect.apply.
pub fn call_function(func: &JsValue, this_arg: &JsValue, args: &JsValue) -> Result<JsValue, JsValue> {
    let func: &Function = func.unchecked_ref();
    Reflect::apply(func, this_arg, args.unchecked_ref())
}

/// Call `this_arg[method](...args)`.
pub fn call_method(this_arg: &JsValue, method: &str, args: &Array) -> Result<JsValue, JsValue> {
    let func = Reflect::get(this_arg, &JsValue::from_str(method))?;
    let func: Function = func
        .dyn_into()
        .map_err(|_| JsValue::from_str("not a function"))?;
    Reflect::apply(&func, this_arg, args)
}

/// Number property, `None` when missing or not a number.
pub fn get_number(obj: &JsValue, prop: &str) -> Option<f64> {
    Reflect::get(obj, &JsValue::from_str(prop)).ok()?.as_f64()
}

/// Create a frozen JS array from strings.
pub fn frozen_string_array<S: AsRef<str>>(items: &[S]) -> Result<JsValue, JsValue> {
    let arr = Array::new();
    for item in items {
        arr.push(&JsValue::from_str(item.as_ref()));
    }
    let freeze = object_static("freeze")?;
    Reflect::apply(&freeze, &JsValue::UNDEFINED, &Array::of1(&arr))
}

/// Serialize into a plain JS object (maps become objects, not `Map`s).
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> JsResult<JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).map_err(JsValue::from)
}

/// Readable text for a thrown JS value.
pub fn describe_js_error(err: &JsValue) -> String {
    if let Some(e) = err.dyn_ref::<js_sys::Error>() {
        return String::from(e.message());
    }
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}
