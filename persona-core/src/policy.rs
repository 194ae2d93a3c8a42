//! Policy resolver.
//!
//! Decides which descriptor (if any) a page load gets:
//! 1. global protection switch
//! 2. whitelist exemption
//! 3. the active identity's descriptor, generated and persisted on first use
//! 4. otherwise a shared per-origin default descriptor
//!
//! and then clears the channels the user's toggles disable. The stored
//! descriptor is never modified by the toggles; only the returned copy is.

use std::cell::RefCell;
use std::net::IpAddr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::descriptor::FingerprintDescriptor;
use crate::error::{Result, ShieldError};
use crate::generator::DescriptorGenerator;
use crate::store::{IdentityId, IdentityStore};

/// Two-label public suffixes that keep three labels in the main domain.
const SPECIAL_SUFFIXES: &[&str] = &["co.uk", "com.cn", "com.hk", "co.jp", "com.tw", "co.kr", "com.au"];

/// User toggles as persisted by the settings layer. `None` means unset.
///
/// Strong channels (canvas, webgl, audio, font) are on unless explicitly
/// `false`; weak channels (domRect, webgpu, timezone) are off unless
/// explicitly `true`; the WebRTC block is opt-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelToggles {
    #[serde(rename = "fingerprintEnabled", skip_serializing_if = "Option::is_none")]
    pub fingerprint_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fp_canvas: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fp_webgl: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fp_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fp_font: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fp_domrect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fp_webgpu: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fp_timezone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fp_webrtc: Option<bool>,
}

impl ChannelToggles {
    pub fn protection_enabled(&self) -> bool {
        self.fingerprint_enabled != Some(false)
    }

    /// Clear the channels these toggles disable.
    pub fn apply(&self, descriptor: &mut FingerprintDescriptor) {
        let flags = &mut descriptor.flags;

        // strong channels: opt-out
        if self.fp_canvas == Some(false) {
            flags.canvas = false;
        }
        if self.fp_webgl == Some(false) {
            flags.webgl = false;
        }
        if self.fp_audio == Some(false) {
            flags.audio = false;
        }
        if self.fp_font == Some(false) {
            flags.font = false;
        }

        // weak channels: opt-in
        if self.fp_domrect != Some(true) {
            flags.dom_rect = false;
        }
        if self.fp_webgpu != Some(true) {
            flags.webgpu = false;
        }
        if self.fp_timezone != Some(true) {
            descriptor.timezone = None;
        }
        if self.fp_webrtc == Some(true) {
            flags.disable_webrtc = true;
        }
    }
}

/// Reduce an origin or URL to its lowercase host.
///
/// Accepts `https://Sub.Example.com:8443/path`, `sub.example.com` and
/// similar; scheme, credentials, port, path and a trailing dot are dropped.
pub fn normalize_host(origin: &str) -> Result<String> {
    let rest = origin.trim();
    let rest = match rest.find("://") {
        Some(i) => &rest[i + 3..],
        None => rest,
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or_default();

    let host = if authority.starts_with('[') {
        match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        }
    } else {
        authority.split(':').next().unwrap_or_default()
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return Err(ShieldError::InvalidOrigin(origin.to_string()));
    }
    Ok(host)
}

/// Registrable ("main") domain of a host: `www.bing.com` → `bing.com`,
/// `a.b.example.co.uk` → `example.co.uk`. IP literals are returned as is.
pub fn main_domain(host: &str) -> String {
    if host.starts_with('[') || host.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }

    let labels: Vec<&str> = host.split('.').collect();
    let keep = if SPECIAL_SUFFIXES
        .iter()
        .any(|suffix| host.ends_with(&format!(".{}", suffix)))
    {
        3
    } else {
        2
    };

    if labels.len() <= keep {
        host.to_string()
    } else {
        labels[labels.len() - keep..].join(".")
    }
}

/// Exact, subdomain or `*.`-wildcard match against the whitelist.
///
/// `example.com` exempts `example.com` and `sub.example.com`, never
/// `example.com.evil.com`.
pub fn is_whitelisted(host: &str, whitelist: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    whitelist.iter().any(|pattern| {
        let pattern = pattern.trim().to_ascii_lowercase();
        let base = pattern.strip_prefix("*.").unwrap_or(&pattern);
        if base.is_empty() {
            return false;
        }
        host == base || host.ends_with(&format!(".{}", base))
    })
}

pub struct PolicyResolver<S: IdentityStore, R: Rng> {
    store: S,
    generator: RefCell<DescriptorGenerator<R>>,
}

impl<S: IdentityStore, R: Rng> PolicyResolver<S, R> {
    pub fn new(store: S, generator: DescriptorGenerator<R>) -> Self {
        Self {
            store,
            generator: RefCell::new(generator),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Identity the store has selected for `origin`'s main domain.
    pub async fn active_identity(&self, origin: &str) -> Result<Option<IdentityId>> {
        let domain = main_domain(&normalize_host(origin)?);
        self.store.get_active_identity(&domain).await
    }

    fn generate(&self) -> FingerprintDescriptor {
        self.generator.borrow_mut().generate()
    }

    /// Descriptor for a page load on `origin`, or `None` when the page must
    /// run unspoofed.
    ///
    /// `identity` overrides the store's active identity for the origin.
    pub async fn resolve(
        &self,
        origin: &str,
        identity: Option<&IdentityId>,
    ) -> Result<Option<FingerprintDescriptor>> {
        let toggles = self.store.get_channel_toggles().await?;
        if !toggles.protection_enabled() {
            log::debug!("Fingerprint protection disabled");
            return Ok(None);
        }

        let host = normalize_host(origin)?;
        let whitelist = self.store.get_whitelist().await?;
        if is_whitelisted(&host, &whitelist) {
            log::debug!("{} is whitelisted", host);
            return Ok(None);
        }

        let domain = main_domain(&host);
        let identity = match identity {
            Some(id) => Some(id.clone()),
            None => self.store.get_active_identity(&domain).await?,
        };

        let mut descriptor = match identity {
            Some(id) => self.descriptor_for_identity(&id).await?,
            None => self.origin_default(&domain).await?,
        };

        toggles.apply(&mut descriptor);
        Ok(Some(descriptor))
    }

    async fn descriptor_for_identity(&self, identity: &IdentityId) -> Result<FingerprintDescriptor> {
        if let Some(existing) = self.store.get_descriptor(identity).await? {
            return Ok(existing);
        }
        let descriptor = self.generate();
        log::info!("Generated descriptor for identity {}", identity);
        self.store.put_descriptor(identity, &descriptor).await?;
        Ok(descriptor)
    }

    async fn origin_default(&self, domain: &str) -> Result<FingerprintDescriptor> {
        if let Some(existing) = self.store.get_origin_default(domain).await? {
            return Ok(existing);
        }
        let descriptor = self.generate();
        log::info!("Generated default descriptor for {}", domain);
        self.store.put_origin_default(domain, &descriptor).await?;
        Ok(descriptor)
    }

    /// Replace an identity's descriptor with a freshly generated one.
    pub async fn regenerate(&self, identity: &IdentityId) -> Result<FingerprintDescriptor> {
        let descriptor = self.generate();
        self.store.put_descriptor(identity, &descriptor).await?;
        log::info!("Regenerated descriptor for identity {}", identity);
        Ok(descriptor)
    }

    /// Replace an identity's descriptor with one pinned to a named preset.
    pub async fn regenerate_from_preset(
        &self,
        identity: &IdentityId,
        preset: &str,
    ) -> Result<FingerprintDescriptor> {
        let descriptor = self
            .generator
            .borrow_mut()
            .generate_from_preset(preset)
            .ok_or_else(|| ShieldError::Config(format!("unknown preset '{}'", preset)))?;
        self.store.put_descriptor(identity, &descriptor).await?;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryIdentityStore;
    use futures::executor::block_on;
    use rand::rngs::StdRng;

    fn resolver() -> PolicyResolver<MemoryIdentityStore, StdRng> {
        PolicyResolver::new(MemoryIdentityStore::new(), DescriptorGenerator::seeded(11))
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("https://Sub.Example.com:8443/a?b#c").unwrap(),
            "sub.example.com"
        );
        assert_eq!(normalize_host("example.com.").unwrap(), "example.com");
        assert_eq!(normalize_host("http://user:pw@host.io").unwrap(), "host.io");
        assert_eq!(normalize_host("http://[::1]:8080/").unwrap(), "[::1]");
        assert!(matches!(
            normalize_host("https://"),
            Err(ShieldError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn test_main_domain() {
        assert_eq!(main_domain("rewards.bing.com"), "bing.com");
        assert_eq!(main_domain("bing.com"), "bing.com");
        assert_eq!(main_domain("a.b.example.co.uk"), "example.co.uk");
        assert_eq!(main_domain("shop.taobao.com.cn"), "taobao.com.cn");
        assert_eq!(main_domain("localhost"), "localhost");
        assert_eq!(main_domain("192.168.1.10"), "192.168.1.10");
    }

    #[test]
    fn test_whitelist_matching() {
        let list = vec!["Example.com".to_string(), "*.corp.net".to_string(), "".to_string()];
        assert!(is_whitelisted("example.com", &list));
        assert!(is_whitelisted("sub.example.com", &list));
        assert!(!is_whitelisted("example.com.evil.com", &list));
        assert!(!is_whitelisted("notexample.com", &list));
        assert!(is_whitelisted("corp.net", &list));
        assert!(is_whitelisted("mail.corp.net", &list));
        assert!(!is_whitelisted("anything.org", &list));
    }

    #[test]
    fn test_toggle_defaults() {
        let mut descriptor = DescriptorGenerator::seeded(1).generate();
        ChannelToggles::default().apply(&mut descriptor);
        assert!(descriptor.flags.canvas && descriptor.flags.webgl);
        assert!(descriptor.flags.audio && descriptor.flags.font);
        assert!(!descriptor.flags.dom_rect);
        assert!(!descriptor.flags.webgpu);
        assert!(descriptor.timezone.is_none());
        assert!(!descriptor.flags.disable_webrtc);
    }

    #[test]
    fn test_toggle_keys() {
        let toggles: ChannelToggles =
            serde_json::from_str(r#"{"fingerprintEnabled":true,"fp_canvas":false,"fp_webrtc":true}"#)
                .unwrap();
        assert_eq!(toggles.fp_canvas, Some(false));
        assert_eq!(toggles.fp_domrect, None);
        assert!(toggles.protection_enabled());
    }

    #[test]
    fn test_disabled_protection() {
        let resolver = resolver();
        resolver.store().set_toggles(ChannelToggles {
            fingerprint_enabled: Some(false),
            ..Default::default()
        });
        assert!(block_on(resolver.resolve("example.com", None)).unwrap().is_none());
        assert_eq!(resolver.store().descriptor_writes(), 0);
    }

    #[test]
    fn test_identity_descriptor_generated_once() {
        let resolver = resolver();
        let id = IdentityId::new("work");
        resolver.store().set_active_identity("example.com", id.clone());

        let first = block_on(resolver.resolve("https://www.example.com/", None))
            .unwrap()
            .unwrap();
        let second = block_on(resolver.resolve("https://api.example.com/", None))
            .unwrap()
            .unwrap();
        assert_eq!(first.seed, second.seed);
        assert_eq!(resolver.store().descriptor_writes(), 1);

        // toggles only touched the returned copy
        let stored = resolver.store().stored_descriptor(&id).unwrap();
        assert!(stored.flags.dom_rect);
        assert!(stored.timezone.is_some());
    }

    #[test]
    fn test_origin_default_is_shared() {
        let resolver = resolver();
        let a = block_on(resolver.resolve("a.example.com", None)).unwrap().unwrap();
        let b = block_on(resolver.resolve("b.example.com", None)).unwrap().unwrap();
        let other = block_on(resolver.resolve("other.org", None)).unwrap().unwrap();
        assert_eq!(a.seed, b.seed);
        assert_ne!(a.seed, other.seed);
    }

    #[test]
    fn test_explicit_identity_wins() {
        let resolver = resolver();
        resolver
            .store()
            .set_active_identity("example.com", IdentityId::new("a"));
        let a = block_on(resolver.resolve("example.com", None)).unwrap().unwrap();
        let b = block_on(resolver.resolve("example.com", Some(&IdentityId::new("b"))))
            .unwrap()
            .unwrap();
        assert_ne!(a.seed, b.seed);
    }

    #[test]
    fn test_regenerate() {
        let resolver = resolver();
        let id = IdentityId::new("p");
        let before = block_on(resolver.resolve("example.com", Some(&id))).unwrap().unwrap();
        let after = block_on(resolver.regenerate(&id)).unwrap();
        assert_ne!(before.seed, after.seed);
        assert_eq!(resolver.store().stored_descriptor(&id), Some(after));

        let preset = block_on(resolver.regenerate_from_preset(&id, "windows-edge")).unwrap();
        assert_eq!(preset.navigator.unwrap().platform, "Win32");
        assert!(matches!(
            block_on(resolver.regenerate_from_preset(&id, "nope")),
            Err(ShieldError::Config(_))
        ));
    }
}
