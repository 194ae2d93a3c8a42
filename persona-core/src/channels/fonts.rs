//! Font metric jitter and font-face source substitution.

use crate::prng::{hash_str, seeded_value};

/// Integer offset for a font-dependent geometry reading.
///
/// About nine readings in ten are left alone; the rest move by -1 or -2.
/// The offset depends on the element's font family, the property name and
/// the raw value, so the same element reads back the same value every time.
pub fn font_offset(seed: u64, font_family: &str, property: &str, raw: f64) -> i32 {
    let mark = format!("{}{}{}", font_family, property, js_number(raw));
    let r = seeded_value(seed.wrapping_add(hash_str(&mark)), 0.0, 3.0);
    if (r * 10.0).fract() < 0.9 {
        0
    } else {
        -1 - (r.floor() as i32 % 2)
    }
}

/// Rewritten `FontFace` source for a `local(name)` lookup, if this lookup is
/// one of the few that get redirected.
pub fn substitute_local_font(source: &str, seed: u64) -> Option<String> {
    let inner = source.strip_prefix("local(")?;
    let name = &inner[..inner.find(')')?];
    let rand = seeded_value(hash_str(&format!("{}{}", name, seed)), 0.0, 1.0);
    if rand < 0.02 {
        Some(format!("local(\"{}\")", rand))
    } else if rand < 0.04 {
        Some("local(\"Arial\")".to_string())
    } else {
        None
    }
}

/// Integral values print without a fractional part, like a JS number.
fn js_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}
