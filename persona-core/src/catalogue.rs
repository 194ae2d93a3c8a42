//! Immutable platform catalogues.
//!
//! Every GPU string is pre-paired with the platform archetype it belongs to,
//! and every locale with the timezone it is spoken in, so a generator that
//! only ever picks whole tuples cannot produce an inconsistent descriptor.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Windows,
    Mac,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GpuPair {
    pub vendor: &'static str,
    pub renderer: &'static str,
}

#[derive(Debug)]
pub struct PlatformArchetype {
    pub archetype: Archetype,
    /// `navigator.platform`
    pub platform: &'static str,
    /// Client hints platform name and version.
    pub ua_platform: &'static str,
    pub ua_platform_version: &'static str,
    pub gpus: &'static [GpuPair],
    pub hardware_concurrency: &'static [u32],
    pub device_memory: &'static [u32],
}

#[derive(Debug)]
pub struct TimezoneEntry {
    pub zone: &'static str,
    pub offset_minutes: i32,
    pub locale: &'static str,
    pub languages: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
}

/// Browser brand presented through client hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BrowserBrand {
    Chrome,
    Edge,
}

impl BrowserBrand {
    pub fn brand_name(&self) -> &'static str {
        match self {
            BrowserBrand::Chrome => "Google Chrome",
            BrowserBrand::Edge => "Microsoft Edge",
        }
    }
}

/// A named, fully pinned archetype selection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub name: &'static str,
    pub archetype: Archetype,
    pub gpu: GpuPair,
    pub zone: &'static str,
    pub screen: Resolution,
    pub browser: BrowserBrand,
}

pub const CHROME_VERSIONS: &[&str] = &["118", "119", "120", "121", "122", "123"];

/// Appended to the major version for `fullVersionList`/`uaFullVersion`.
pub const FULL_VERSION_SUFFIX: &str = ".0.6099.130";

const WINDOWS_GPUS: [GpuPair; 6] = [
    GpuPair {
        vendor: "Google Inc. (Intel)",
        renderer: "ANGLE (Intel, Intel(R) UHD Graphics 630 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    GpuPair {
        vendor: "Google Inc. (Intel)",
        renderer: "ANGLE (Intel, Intel(R) UHD Graphics 770 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    GpuPair {
        vendor: "Google Inc. (NVIDIA)",
        renderer: "ANGLE (NVIDIA, NVIDIA GeForce GTX 1060 6GB Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    GpuPair {
        vendor: "Google Inc. (NVIDIA)",
        renderer: "ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    GpuPair {
        vendor: "Google Inc. (AMD)",
        renderer: "ANGLE (AMD, AMD Radeon RX 580 Series Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
    GpuPair {
        vendor: "Google Inc. (AMD)",
        renderer: "ANGLE (AMD, AMD Radeon RX 6600 XT Direct3D11 vs_5_0 ps_5_0, D3D11)",
    },
];

const MAC_GPUS: [GpuPair; 4] = [
    GpuPair {
        vendor: "Google Inc. (Apple)",
        renderer: "ANGLE (Apple, Apple M1, OpenGL 4.1)",
    },
    GpuPair {
        vendor: "Google Inc. (Apple)",
        renderer: "ANGLE (Apple, Apple M2, OpenGL 4.1)",
    },
    GpuPair {
        vendor: "Google Inc. (Apple)",
        renderer: "ANGLE (Apple, Apple M1 Pro, OpenGL 4.1)",
    },
    GpuPair {
        vendor: "Google Inc. (Intel Inc.)",
        renderer: "ANGLE (Intel Inc., Intel(R) Iris(TM) Plus Graphics 655, OpenGL 4.1)",
    },
];

const LINUX_GPUS: [GpuPair; 3] = [
    GpuPair {
        vendor: "Google Inc. (Intel)",
        renderer: "ANGLE (Intel, Mesa Intel(R) UHD Graphics 630 (CFL GT2), OpenGL 4.6)",
    },
    GpuPair {
        vendor: "Google Inc. (NVIDIA Corporation)",
        renderer: "ANGLE (NVIDIA Corporation, NVIDIA GeForce GTX 1080/PCIe/SSE2, OpenGL 4.6)",
    },
    GpuPair {
        vendor: "Mesa",
        renderer: "Mesa Intel(R) UHD Graphics 630 (CFL GT2)",
    },
];

pub static ARCHETYPES: [PlatformArchetype; 3] = [
    PlatformArchetype {
        archetype: Archetype::Windows,
        platform: "Win32",
        ua_platform: "Windows",
        ua_platform_version: "10.0.0",
        gpus: &WINDOWS_GPUS,
        hardware_concurrency: &[4, 6, 8, 12, 16],
        device_memory: &[4, 8, 16, 32],
    },
    PlatformArchetype {
        archetype: Archetype::Mac,
        platform: "MacIntel",
        ua_platform: "macOS",
        ua_platform_version: "14.0.0",
        gpus: &MAC_GPUS,
        hardware_concurrency: &[8, 10, 12],
        device_memory: &[8, 16, 32],
    },
    PlatformArchetype {
        archetype: Archetype::Linux,
        platform: "Linux x86_64",
        ua_platform: "Linux",
        ua_platform_version: "6.0.0",
        gpus: &LINUX_GPUS,
        hardware_concurrency: &[4, 8, 12, 16],
        device_memory: &[4, 8, 16, 32],
    },
];

pub static TIMEZONES: [TimezoneEntry; 7] = [
    TimezoneEntry {
        zone: "Asia/Shanghai",
        offset_minutes: 480,
        locale: "zh-CN",
        languages: &["zh-CN", "zh", "en-US", "en"],
    },
    TimezoneEntry {
        zone: "Asia/Tokyo",
        offset_minutes: 540,
        locale: "ja-JP",
        languages: &["ja-JP", "ja", "en-US", "en"],
    },
    TimezoneEntry {
        zone: "America/New_York",
        offset_minutes: -300,
        locale: "en-US",
        languages: &["en-US", "en"],
    },
    TimezoneEntry {
        zone: "America/Los_Angeles",
        offset_minutes: -480,
        locale: "en-US",
        languages: &["en-US", "en"],
    },
    TimezoneEntry {
        zone: "Europe/London",
        offset_minutes: 0,
        locale: "en-GB",
        languages: &["en-GB", "en"],
    },
    TimezoneEntry {
        zone: "Europe/Paris",
        offset_minutes: 60,
        locale: "fr-FR",
        languages: &["fr-FR", "fr", "en-US", "en"],
    },
    TimezoneEntry {
        zone: "Australia/Sydney",
        offset_minutes: 660,
        locale: "en-AU",
        languages: &["en-AU", "en"],
    },
];

pub static RESOLUTIONS: [Resolution; 8] = [
    Resolution { width: 1920, height: 1080, color_depth: 24 },
    Resolution { width: 2560, height: 1440, color_depth: 24 },
    Resolution { width: 1366, height: 768, color_depth: 24 },
    Resolution { width: 1536, height: 864, color_depth: 24 },
    Resolution { width: 1440, height: 900, color_depth: 24 },
    Resolution { width: 1680, height: 1050, color_depth: 24 },
    Resolution { width: 2560, height: 1600, color_depth: 30 },
    Resolution { width: 3840, height: 2160, color_depth: 30 },
];

pub static PRESETS: [Preset; 3] = [
    Preset {
        name: "windows-chrome",
        archetype: Archetype::Windows,
        gpu: WINDOWS_GPUS[0],
        zone: "Asia/Shanghai",
        screen: Resolution { width: 1920, height: 1080, color_depth: 24 },
        browser: BrowserBrand::Chrome,
    },
    Preset {
        name: "mac-chrome",
        archetype: Archetype::Mac,
        gpu: MAC_GPUS[0],
        zone: "Asia/Shanghai",
        screen: Resolution { width: 2560, height: 1440, color_depth: 30 },
        browser: BrowserBrand::Chrome,
    },
    Preset {
        name: "windows-edge",
        archetype: Archetype::Windows,
        gpu: WINDOWS_GPUS[2],
        zone: "America/New_York",
        screen: Resolution { width: 1920, height: 1080, color_depth: 24 },
        browser: BrowserBrand::Edge,
    },
];

pub fn archetype(kind: Archetype) -> &'static PlatformArchetype {
    match kind {
        Archetype::Windows => &ARCHETYPES[0],
        Archetype::Mac => &ARCHETYPES[1],
        Archetype::Linux => &ARCHETYPES[2],
    }
}

pub fn timezone(zone: &str) -> Option<&'static TimezoneEntry> {
    TIMEZONES.iter().find(|tz| tz.zone == zone)
}

pub fn preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name == name)
}

/// Which archetype owns a `navigator.platform` value.
pub fn archetype_of_platform(platform: &str) -> Option<Archetype> {
    ARCHETYPES
        .iter()
        .find(|a| a.platform == platform)
        .map(|a| a.archetype)
}

/// Which archetype a renderer string is catalogued under.
pub fn archetype_of_renderer(renderer: &str) -> Option<Archetype> {
    ARCHETYPES
        .iter()
        .find(|a| a.gpus.iter().any(|g| g.renderer == renderer))
        .map(|a| a.archetype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_renderers_belong_to_one_archetype() {
        let mut seen = HashSet::new();
        for a in ARCHETYPES.iter() {
            assert!(!a.gpus.is_empty());
            assert!(!a.hardware_concurrency.is_empty());
            assert!(!a.device_memory.is_empty());
            for gpu in a.gpus {
                assert!(seen.insert(gpu.renderer), "duplicate renderer {}", gpu.renderer);
            }
        }
    }

    #[test]
    fn test_presets_use_catalogued_tuples() {
        for p in PRESETS.iter() {
            assert_eq!(archetype_of_renderer(p.gpu.renderer), Some(p.archetype));
            assert!(timezone(p.zone).is_some(), "unknown zone {}", p.zone);
        }
    }

    #[test]
    fn test_locale_leads_languages() {
        for tz in TIMEZONES.iter() {
            assert_eq!(tz.languages.first(), Some(&tz.locale));
        }
    }

    #[test]
    fn test_lookups() {
        assert_eq!(archetype_of_platform("MacIntel"), Some(Archetype::Mac));
        assert_eq!(archetype_of_platform("Win64"), None);
        assert_eq!(
            archetype_of_renderer("ANGLE (Apple, Apple M2, OpenGL 4.1)"),
            Some(Archetype::Mac)
        );
        assert!(preset("linux-firefox").is_none());
        assert_eq!(timezone("Asia/Tokyo").map(|t| t.offset_minutes), Some(540));
    }
}
