//! Descriptor generator.
//!
//! Picks one platform archetype, one timezone/locale entry and one screen
//! resolution, then draws a root seed and derives the channel seeds from it.
//! The entropy source is injected so tests can replay a generator run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalogue::{
    self, BrowserBrand, GpuPair, PlatformArchetype, Resolution, TimezoneEntry, ARCHETYPES,
    CHROME_VERSIONS, FULL_VERSION_SUFFIX, RESOLUTIONS, TIMEZONES,
};
use crate::descriptor::{
    BrandVersion, ChannelFlags, ChannelSeeds, FingerprintDescriptor, GpuInfo, NavigatorProfile,
    ScreenProfile, TimezoneProfile, UserAgentData, MAX_SEED,
};

pub struct DescriptorGenerator<R: Rng> {
    rng: R,
}

impl DescriptorGenerator<StdRng> {
    /// Generator backed by OS entropy (`crypto.getRandomValues` in WASM).
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible generator, used by tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> DescriptorGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generate a fresh descriptor with every channel flag enabled.
    pub fn generate(&mut self) -> FingerprintDescriptor {
        let platform = &ARCHETYPES[self.rng.gen_range(0..ARCHETYPES.len())];
        let gpu = pick(&mut self.rng, platform.gpus);
        let tz = &TIMEZONES[self.rng.gen_range(0..TIMEZONES.len())];
        let resolution = pick(&mut self.rng, &RESOLUTIONS);
        self.assemble(platform, gpu, tz, resolution, BrowserBrand::Chrome)
    }

    /// Generate a descriptor pinned to a named preset. The seed and the
    /// hardware pools are still drawn fresh.
    pub fn generate_from_preset(&mut self, name: &str) -> Option<FingerprintDescriptor> {
        let preset = catalogue::preset(name)?;
        let tz = catalogue::timezone(preset.zone)?;
        let platform = catalogue::archetype(preset.archetype);
        Some(self.assemble(platform, preset.gpu, tz, preset.screen, preset.browser))
    }

    fn assemble(
        &mut self,
        platform: &PlatformArchetype,
        gpu: GpuPair,
        tz: &TimezoneEntry,
        resolution: Resolution,
        browser: BrowserBrand,
    ) -> FingerprintDescriptor {
        let seed = self.rng.gen_range(0..=MAX_SEED);
        let major = pick(&mut self.rng, CHROME_VERSIONS);

        log::debug!(
            "Generated descriptor: platform={} zone={} screen={}x{}",
            platform.platform,
            tz.zone,
            resolution.width,
            resolution.height
        );

        FingerprintDescriptor {
            seed,
            seeds: ChannelSeeds::derive(seed),
            flags: ChannelFlags::default(),
            gpu_info: Some(GpuInfo {
                vendor: gpu.vendor.to_string(),
                renderer: gpu.renderer.to_string(),
            }),
            navigator: Some(NavigatorProfile {
                platform: platform.platform.to_string(),
                language: tz.locale.to_string(),
                languages: tz.languages.iter().map(|l| l.to_string()).collect(),
                hardware_concurrency: pick(&mut self.rng, platform.hardware_concurrency),
                device_memory: pick(&mut self.rng, platform.device_memory),
                user_agent_data: Some(client_hints(platform, major, browser)),
            }),
            screen: Some(ScreenProfile {
                width: resolution.width,
                height: resolution.height,
                color_depth: resolution.color_depth,
            }),
            timezone: Some(TimezoneProfile {
                zone: tz.zone.to_string(),
                offset_minutes: tz.offset_minutes,
                locale: tz.locale.to_string(),
            }),
        }
    }
}

fn pick<T: Copy, R: Rng>(rng: &mut R, items: &[T]) -> T {
    items[rng.gen_range(0..items.len())]
}

fn client_hints(platform: &PlatformArchetype, major: &str, browser: BrowserBrand) -> UserAgentData {
    let full = format!("{}{}", major, FULL_VERSION_SUFFIX);
    let brand = |name: &str, version: &str| BrandVersion {
        brand: name.to_string(),
        version: version.to_string(),
    };

    UserAgentData {
        brands: vec![
            brand("Chromium", major),
            brand(browser.brand_name(), major),
            brand("Not_A Brand", "8"),
        ],
        full_version_list: vec![
            brand("Chromium", &full),
            brand(browser.brand_name(), &full),
            brand("Not_A Brand", "8.0.0.0"),
        ],
        mobile: false,
        platform: platform.ua_platform.to_string(),
        platform_version: platform.ua_platform_version.to_string(),
        architecture: "x86".to_string(),
        bitness: "64".to_string(),
        model: String::new(),
        ua_full_version: full,
        form_factors: vec!["Desktop".to_string()],
    }
}
