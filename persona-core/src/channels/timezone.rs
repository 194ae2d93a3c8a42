//! Timezone rebasing helpers.
//!
//! The page layer asks the engine's own `Intl.DateTimeFormat` for the parts
//! of a date in the profile zone and assembles `Date.prototype.toString`
//! style output from them here.

use serde::Serialize;

/// Formatter options used to pull date parts in the profile zone.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartsFormatOptions<'a> {
    pub time_zone: &'a str,
    pub weekday: &'static str,
    pub month: &'static str,
    pub day: &'static str,
    pub year: &'static str,
    pub hour: &'static str,
    pub minute: &'static str,
    pub second: &'static str,
    pub hour12: bool,
    pub time_zone_name: &'static str,
}

/// Locale the parts formatter always runs under.
pub const PARTS_LOCALE: &str = "en-US";

pub fn parts_format_options(zone: &str) -> PartsFormatOptions<'_> {
    PartsFormatOptions {
        time_zone: zone,
        weekday: "short",
        month: "short",
        day: "2-digit",
        year: "numeric",
        hour: "2-digit",
        minute: "2-digit",
        second: "2-digit",
        hour12: false,
        time_zone_name: "longOffset",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateParts {
    pub weekday: String,
    pub month: String,
    pub day: String,
    pub year: String,
    pub hour: String,
    pub minute: String,
    pub second: String,
    pub time_zone_name: String,
}

impl DateParts {
    /// Collect `formatToParts` output. Literal parts are ignored.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut out = DateParts::default();
        for (kind, value) in parts {
            let kind: String = kind.into();
            let value: String = value.into();
            match kind.as_str() {
                "weekday" => out.weekday = value,
                "month" => out.month = value,
                "day" => out.day = value,
                "year" => out.year = value,
                // hour12:false renders midnight as 24 in some engines
                "hour" => out.hour = if value == "24" { "00".to_string() } else { value },
                "minute" => out.minute = value,
                "second" => out.second = value,
                "timeZoneName" => out.time_zone_name = value,
                _ => {}
            }
        }
        out
    }

    /// `Tue Mar 05 2024`
    pub fn date_string(&self) -> String {
        format!("{} {} {} {}", self.weekday, self.month, self.day, self.year)
    }

    /// `14:03:09 GMT+0800`
    pub fn time_string(&self) -> String {
        format!(
            "{}:{}:{} {}",
            self.hour,
            self.minute,
            self.second,
            gmt_label(&self.time_zone_name)
        )
    }

    /// `Tue Mar 05 2024 14:03:09 GMT+0800`
    pub fn full_string(&self) -> String {
        format!("{} {}", self.date_string(), self.time_string())
    }

    /// `getTimezoneOffset` for this date: minutes from local time to UTC,
    /// so `GMT+08:00` is -480. `None` when the zone name is not a GMT offset.
    pub fn timezone_offset(&self) -> Option<i32> {
        let offset = self.time_zone_name.strip_prefix("GMT")?;
        if offset.is_empty() {
            return Some(0);
        }
        let (sign, rest) = match offset.as_bytes()[0] {
            b'+' => (-1, &offset[1..]),
            b'-' => (1, &offset[1..]),
            _ => return None,
        };
        let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
        let hours: i32 = hours.parse().ok()?;
        let minutes: i32 = minutes.parse().ok()?;
        if hours > 23 || minutes > 59 {
            return None;
        }
        Some(sign * (hours * 60 + minutes))
    }
}

/// `GMT+08:00` becomes `GMT+0800`. A bare `GMT` is kept as is.
pub fn gmt_label(long_offset: &str) -> String {
    long_offset.replacen(':', "", 1)
}

/// Locale for a `toLocale*`/`DateTimeFormat` call: the caller's choice if
/// given, otherwise the profile's.
pub fn effective_locale<'a>(requested: Option<&'a str>, profile_locale: &'a str) -> &'a str {
    match requested {
        Some(l) if !l.is_empty() => l,
        _ => profile_locale,
    }
}
