//! Behavioural properties of the persona engine, exercised end to end over
//! the native core.

use std::collections::HashSet;

use futures::executor::block_on;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use persona_core::catalogue::{archetype, archetype_of_platform, archetype_of_renderer};
use persona_core::channels::{audio, canvas};
use persona_core::descriptor::ChannelSeeds;
use persona_core::{
    ApplyOutcome, Channel, ChannelHost, ChannelToggles, DeliveryConfig, DescriptorGenerator,
    FingerprintDescriptor, IdentityId, IdentityStore, InterceptionTable, MemoryIdentityStore,
    PageSession, PolicyResolver, Result, SeededStream, ShieldError, SurfaceId, SurfaceKind,
};

fn variance(values: &[f64]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

fn gradient_image(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 4);
    for row in 0..height {
        for col in 0..width {
            data.extend_from_slice(&[(col * 17) as u8, (row * 29) as u8, ((row ^ col) * 7) as u8, 255]);
        }
    }
    data
}

#[test]
fn noise_streams_replay_exactly() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..100 {
        let seed: u64 = rng.gen_range(0..(1u64 << 53));
        let a: Vec<f64> = SeededStream::new(seed).take(256).collect();
        let b: Vec<f64> = SeededStream::new(seed).take(256).collect();
        assert_eq!(a, b);
    }
}

#[test]
fn canvas_output_is_reproducible_across_contexts() {
    let descriptor = DescriptorGenerator::seeded(8).generate();
    let seed = descriptor.channel_seed(Channel::Canvas).unwrap();

    let mut first = gradient_image(64, 32);
    let mut second = gradient_image(64, 32);
    canvas::apply_edge_noise(&mut first, 64, 32, &canvas::canvas_noise(seed));
    canvas::apply_edge_noise(&mut second, 64, 32, &canvas::canvas_noise(seed));

    assert_eq!(first, second);
    assert_ne!(first, gradient_image(64, 32));
}

#[test]
fn noise_is_never_degenerate() {
    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..1_000 {
        let seed: u64 = rng.gen_range(1..(1u64 << 53));

        let canvas: Vec<f64> = canvas::canvas_noise(seed).iter().map(|&v| f64::from(v)).collect();
        assert!(canvas.iter().any(|&v| v != 0.0), "canvas noise all zero for {}", seed);
        assert!(variance(&canvas) > 1.0, "flat canvas noise for {}", seed);

        let audio: Vec<f64> = (0..64)
            .map(|i| audio::sample_noise(seed, i * 20) / audio::SAMPLE_NOISE_SCALE)
            .collect();
        assert!(audio.iter().any(|&v| v != 0.0), "audio noise all zero for {}", seed);
        assert!(variance(&audio) > 1e-2, "flat audio noise for {}", seed);
    }
}

#[test]
fn generated_descriptors_are_distinct() {
    let mut gen = DescriptorGenerator::seeded(3);
    let mut payloads = HashSet::new();
    for _ in 0..10_000 {
        let payload = gen.generate().to_payload().unwrap();
        assert!(payloads.insert(payload), "duplicate descriptor generated");
    }
}

#[test]
fn platform_and_gpu_share_an_archetype() {
    let mut gen = DescriptorGenerator::seeded(4);
    for _ in 0..5_000 {
        let descriptor = gen.generate();
        let nav = descriptor.navigator.as_ref().unwrap();
        let gpu = descriptor.gpu_info.as_ref().unwrap();

        let by_platform = archetype_of_platform(&nav.platform).unwrap();
        assert_eq!(archetype_of_renderer(&gpu.renderer), Some(by_platform));
        assert_eq!(
            nav.user_agent_data.as_ref().unwrap().platform,
            archetype(by_platform).ua_platform
        );
        if nav.platform == "Win32" {
            assert!(!gpu.renderer.contains("Apple"));
        }
    }
}

#[test]
fn whitelist_matches_subdomains_only() {
    let store = MemoryIdentityStore::new();
    store.set_whitelist(["example.com"]);
    let resolver = PolicyResolver::new(store, DescriptorGenerator::seeded(5));

    assert!(block_on(resolver.resolve("example.com", None)).unwrap().is_none());
    assert!(block_on(resolver.resolve("sub.example.com", None)).unwrap().is_none());
    assert!(block_on(resolver.resolve("example.com.evil.com", None))
        .unwrap()
        .is_some());
}

#[test]
fn toggles_override_stored_flags() {
    let store = MemoryIdentityStore::new();
    let id = IdentityId::new("shopper");
    let mut stored = DescriptorGenerator::seeded(6).generate();
    stored.flags.canvas = true;
    stored.flags.dom_rect = true;
    block_on(store.put_descriptor(&id, &stored)).unwrap();
    store.set_active_identity("example.com", id.clone());

    store.set_toggles(ChannelToggles {
        fp_canvas: Some(false),
        ..Default::default()
    });
    let resolver = PolicyResolver::new(store, DescriptorGenerator::seeded(6));

    let resolved = block_on(resolver.resolve("example.com", None)).unwrap().unwrap();
    assert!(!resolved.flags.canvas);
    assert!(!resolved.flags.dom_rect);
    assert!(resolved.flags.webgl);
    assert_eq!(resolved.seed, stored.seed);

    // stored original untouched
    let still = resolver.store().stored_descriptor(&id).unwrap();
    assert!(still.flags.canvas && still.flags.dom_rect);

    resolver.store().set_toggles(ChannelToggles {
        fp_domrect: Some(true),
        fp_webrtc: Some(true),
        fp_timezone: Some(true),
        ..Default::default()
    });
    let resolved = block_on(resolver.resolve("example.com", None)).unwrap().unwrap();
    assert!(resolved.flags.canvas);
    assert!(resolved.flags.dom_rect);
    assert!(!resolved.flags.webgpu);
    assert!(resolved.flags.disable_webrtc);
    assert!(resolved.timezone.is_some());
}

/// Host that installs through an interception table, counting wraps.
struct TableHost {
    guard: bool,
    table: InterceptionTable<u32>,
    wraps: u32,
}

const SURFACES: [(Channel, SurfaceId); 3] = [
    (Channel::Canvas, SurfaceId::new("CanvasRenderingContext2D.prototype", "getImageData")),
    (Channel::Audio, SurfaceId::new("AudioBuffer.prototype", "getChannelData")),
    (Channel::Font, SurfaceId::new("HTMLElement.prototype", "offsetWidth")),
];

impl ChannelHost for TableHost {
    fn install(&mut self, channel: Channel, _: &FingerprintDescriptor) -> Result<()> {
        for (owner, surface) in SURFACES.iter().filter(|(c, _)| *c == channel) {
            let wraps = &mut self.wraps;
            self.table
                .install::<ShieldError>(*surface, *owner, SurfaceKind::Method, || {
                    *wraps += 1;
                    Ok((0, *wraps))
                })?;
        }
        Ok(())
    }

    fn guard_is_set(&self) -> bool {
        self.guard
    }

    fn set_guard(&mut self) {
        self.guard = true;
    }
}

#[test]
fn bootstrap_installs_hooks_once() {
    let descriptor = DescriptorGenerator::seeded(7).generate();
    let mut host = TableHost {
        guard: false,
        table: InterceptionTable::new(),
        wraps: 0,
    };

    let first = PageSession::new(DeliveryConfig::default(), 0).apply(&mut host, &descriptor);
    assert!(matches!(first, ApplyOutcome::Applied(_)));
    assert!(host.guard);
    assert_eq!(host.wraps, 3);

    let second = PageSession::new(DeliveryConfig::default(), 0).apply(&mut host, &descriptor);
    assert_eq!(second, ApplyOutcome::AlreadyApplied);
    assert_eq!(host.wraps, 3);

    // even a retry path that skips the guard cannot double-wrap
    host.install(Channel::Canvas, &descriptor).unwrap();
    assert_eq!(host.wraps, 3);
    assert_eq!(host.table.len(), 3);
}

#[test]
fn seed_42_end_to_end() {
    let seeds = ChannelSeeds::derive(42);
    assert_eq!(seeds.canvas_seed, Some(42));
    assert_eq!(seeds.webgl_seed, Some(43));
    assert_eq!(seeds.audio_seed, Some(44));

    let value = persona_core::seeded_value(seeds.audio_seed.unwrap(), 1.0, -1.0);
    assert_eq!(value, -0.6723604644648731);
}
