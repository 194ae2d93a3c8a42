//! Fingerprint descriptor data model.
//!
//! A descriptor is the reproducible environment one identity presents to a
//! site: a root seed (and the per-channel seeds derived from it), the
//! hardware/locale profile, and the per-channel enable flags.
//!
//! The serialized form is the handoff payload between the coordinator and a
//! page context, so field names follow the wire format and every value is
//! JSON-representable (seeds stay below 2^53).

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Largest seed that survives a round trip through a JS number.
pub const MAX_SEED: u64 = (1 << 53) - 1;

/// One category of entropy-bearing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Canvas,
    WebGl,
    Audio,
    Font,
    DomRect,
    WebGpu,
    Hardware,
    Timezone,
    WebRtc,
}

/// Discriminating power vs. breakage risk, which drives the default policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStrength {
    /// High discriminating power, low breakage risk. Default on.
    Strong,
    /// Low discriminating power or high breakage risk. Default off.
    Weak,
    /// Descriptor values replayed verbatim, not a noise channel.
    Baseline,
}

impl Channel {
    pub const ALL: [Channel; 9] = [
        Channel::Canvas,
        Channel::WebGl,
        Channel::Audio,
        Channel::Font,
        Channel::DomRect,
        Channel::WebGpu,
        Channel::Hardware,
        Channel::Timezone,
        Channel::WebRtc,
    ];

    pub fn strength(&self) -> ChannelStrength {
        match self {
            Channel::Canvas | Channel::WebGl | Channel::Audio | Channel::Font => {
                ChannelStrength::Strong
            }
            Channel::DomRect | Channel::WebGpu | Channel::Timezone | Channel::WebRtc => {
                ChannelStrength::Weak
            }
            Channel::Hardware => ChannelStrength::Baseline,
        }
    }

    /// Fixed offset from the root seed for noise channels.
    pub fn seed_offset(&self) -> Option<u64> {
        match self {
            Channel::Canvas => Some(0),
            Channel::WebGl => Some(1),
            Channel::Audio => Some(2),
            Channel::Font => Some(3),
            Channel::DomRect => Some(4),
            Channel::WebGpu => Some(5),
            Channel::Hardware | Channel::Timezone | Channel::WebRtc => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Canvas => "canvas",
            Channel::WebGl => "webgl",
            Channel::Audio => "audio",
            Channel::Font => "font",
            Channel::DomRect => "domRect",
            Channel::WebGpu => "webgpu",
            Channel::Hardware => "hardware",
            Channel::Timezone => "timezone",
            Channel::WebRtc => "webrtc",
        }
    }
}

/// Per-channel seeds. Any of them may be missing from a partial payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelSeeds {
    pub canvas_seed: Option<u64>,
    pub webgl_seed: Option<u64>,
    pub audio_seed: Option<u64>,
    pub font_seed: Option<u64>,
    pub dom_rect_seed: Option<u64>,
    pub webgpu_seed: Option<u64>,
}

impl ChannelSeeds {
    /// Derive every channel seed as `root + offset`.
    pub fn derive(root: u64) -> Self {
        let at = |channel: Channel| channel.seed_offset().map(|o| root.wrapping_add(o));
        Self {
            canvas_seed: at(Channel::Canvas),
            webgl_seed: at(Channel::WebGl),
            audio_seed: at(Channel::Audio),
            font_seed: at(Channel::Font),
            dom_rect_seed: at(Channel::DomRect),
            webgpu_seed: at(Channel::WebGpu),
        }
    }

    pub fn get(&self, channel: Channel) -> Option<u64> {
        match channel {
            Channel::Canvas => self.canvas_seed,
            Channel::WebGl => self.webgl_seed,
            Channel::Audio => self.audio_seed,
            Channel::Font => self.font_seed,
            Channel::DomRect => self.dom_rect_seed,
            Channel::WebGpu => self.webgpu_seed,
            Channel::Hardware | Channel::Timezone | Channel::WebRtc => None,
        }
    }
}

/// Per-channel enable flags. Missing flags mean "enabled", except the
/// WebRTC block which is opt-in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelFlags {
    pub canvas: bool,
    pub webgl: bool,
    pub audio: bool,
    pub font: bool,
    pub dom_rect: bool,
    pub webgpu: bool,
    #[serde(rename = "disableWebRTC")]
    pub disable_webrtc: bool,
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self {
            canvas: true,
            webgl: true,
            audio: true,
            font: true,
            dom_rect: true,
            webgpu: true,
            disable_webrtc: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GpuInfo {
    pub vendor: String,
    pub renderer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrandVersion {
    pub brand: String,
    pub version: String,
}

/// User-Agent Client Hints (`navigator.userAgentData`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAgentData {
    pub brands: Vec<BrandVersion>,
    pub full_version_list: Vec<BrandVersion>,
    pub mobile: bool,
    pub platform: String,
    pub platform_version: String,
    pub architecture: String,
    pub bitness: String,
    pub model: String,
    pub ua_full_version: String,
    pub form_factors: Vec<String>,
}

/// The low-entropy subset returned by `userAgentData.toJSON()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowEntropyHints<'a> {
    pub brands: &'a [BrandVersion],
    pub mobile: bool,
    pub platform: &'a str,
}

impl UserAgentData {
    pub fn low_entropy(&self) -> LowEntropyHints<'_> {
        LowEntropyHints {
            brands: &self.brands,
            mobile: self.mobile,
            platform: &self.platform,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigatorProfile {
    pub platform: String,
    pub language: String,
    pub languages: Vec<String>,
    pub hardware_concurrency: u32,
    pub device_memory: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent_data: Option<UserAgentData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenProfile {
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
}

impl ScreenProfile {
    /// Height reserved for the OS taskbar.
    pub const TASKBAR_HEIGHT: u32 = 40;

    pub fn avail_height(&self) -> u32 {
        self.height.saturating_sub(Self::TASKBAR_HEIGHT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimezoneProfile {
    pub zone: String,
    /// Minutes east of UTC.
    #[serde(rename = "offset", alias = "offsetMinutes")]
    pub offset_minutes: i32,
    pub locale: String,
}

impl TimezoneProfile {
    /// What `Date.prototype.getTimezoneOffset` reports (minutes west of UTC).
    pub fn timezone_offset(&self) -> i32 {
        -self.offset_minutes
    }
}

/// The full environment description for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintDescriptor {
    #[serde(default)]
    pub seed: u64,
    #[serde(flatten)]
    pub seeds: ChannelSeeds,
    #[serde(flatten)]
    pub flags: ChannelFlags,
    #[serde(default)]
    pub gpu_info: Option<GpuInfo>,
    #[serde(default, alias = "navigatorProfile")]
    pub navigator: Option<NavigatorProfile>,
    #[serde(default, alias = "screenProfile")]
    pub screen: Option<ScreenProfile>,
    #[serde(default, alias = "timezoneProfile")]
    pub timezone: Option<TimezoneProfile>,
}

impl FingerprintDescriptor {
    /// Whether the descriptor asks for `channel` to be spoofed.
    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Canvas => self.flags.canvas,
            Channel::WebGl => self.flags.webgl,
            Channel::Audio => self.flags.audio,
            Channel::Font => self.flags.font,
            Channel::DomRect => self.flags.dom_rect,
            Channel::WebGpu => self.flags.webgpu,
            Channel::Hardware => self.navigator.is_some() || self.screen.is_some(),
            Channel::Timezone => self.timezone.is_some(),
            Channel::WebRtc => self.flags.disable_webrtc,
        }
    }

    pub fn channel_seed(&self, channel: Channel) -> Option<u64> {
        self.seeds.get(channel)
    }

    /// Serialize into the handoff payload.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a handoff payload. Missing channel seeds are kept missing.
    pub fn from_payload(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_derivation() {
        let seeds = ChannelSeeds::derive(42);
        assert_eq!(seeds.canvas_seed, Some(42));
        assert_eq!(seeds.webgl_seed, Some(43));
        assert_eq!(seeds.audio_seed, Some(44));
        assert_eq!(seeds.font_seed, Some(45));
        assert_eq!(seeds.dom_rect_seed, Some(46));
        assert_eq!(seeds.webgpu_seed, Some(47));
        assert_eq!(seeds.get(Channel::Timezone), None);
    }

    #[test]
    fn test_channel_strength() {
        assert_eq!(Channel::Canvas.strength(), ChannelStrength::Strong);
        assert_eq!(Channel::Font.strength(), ChannelStrength::Strong);
        assert_eq!(Channel::DomRect.strength(), ChannelStrength::Weak);
        assert_eq!(Channel::WebRtc.strength(), ChannelStrength::Weak);
        assert_eq!(Channel::Hardware.strength(), ChannelStrength::Baseline);
    }

    #[test]
    fn test_partial_payload_keeps_missing_seeds() {
        let json = r#"{"seed":7,"canvasSeed":7,"canvas":true,"audio":false}"#;
        let descriptor = FingerprintDescriptor::from_payload(json).unwrap();
        assert_eq!(descriptor.channel_seed(Channel::Canvas), Some(7));
        assert_eq!(descriptor.channel_seed(Channel::WebGl), None);
        assert!(!descriptor.flags.audio);
        // absent flags default to enabled
        assert!(descriptor.flags.webgl);
        assert!(!descriptor.flags.disable_webrtc);
        assert!(descriptor.timezone.is_none());
    }

    #[test]
    fn test_wire_keys() {
        let descriptor = FingerprintDescriptor {
            seed: 1,
            seeds: ChannelSeeds::derive(1),
            flags: ChannelFlags::default(),
            gpu_info: None,
            navigator: None,
            screen: Some(ScreenProfile {
                width: 1920,
                height: 1080,
                color_depth: 24,
            }),
            timezone: Some(TimezoneProfile {
                zone: "Asia/Tokyo".into(),
                offset_minutes: 540,
                locale: "ja-JP".into(),
            }),
        };
        let value: serde_json::Value =
            serde_json::from_str(&descriptor.to_payload().unwrap()).unwrap();
        assert_eq!(value["domRectSeed"], 5);
        assert_eq!(value["disableWebRTC"], false);
        assert_eq!(value["screen"]["colorDepth"], 24);
        assert_eq!(value["timezone"]["offset"], 540);
    }

    #[test]
    fn test_spec_aliases_accepted() {
        let json = r#"{
            "seed": 3,
            "timezoneProfile": {"zone": "Europe/Paris", "offsetMinutes": 60, "locale": "fr-FR"},
            "screenProfile": {"width": 1440, "height": 900, "colorDepth": 24}
        }"#;
        let descriptor = FingerprintDescriptor::from_payload(json).unwrap();
        let tz = descriptor.timezone.unwrap();
        assert_eq!(tz.offset_minutes, 60);
        assert_eq!(tz.timezone_offset(), -60);
        assert_eq!(descriptor.screen.unwrap().avail_height(), 860);
    }
}
