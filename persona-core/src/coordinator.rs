//! Coordinator facade for the navigation/lifecycle layer.
//!
//! Ties the policy resolver to the delivery pipeline. Everything here fails
//! open: any error on the way to a payload means the page simply runs
//! unspoofed for that load.

use std::cell::RefCell;

use rand::Rng;
use serde::Serialize;

use crate::config::DeliveryConfig;
use crate::delivery::{DeliveryPipeline, DeliveryState, PageLoadId};
use crate::descriptor::FingerprintDescriptor;
use crate::error::{Result, ShieldError};
use crate::policy::PolicyResolver;
use crate::store::{IdentityId, IdentityStore};

/// What the navigation layer pushes into the page context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySnapshot {
    pub page: PageLoadId,
    /// One-shot JSON payload for the handoff slot / ready event.
    pub payload: String,
    pub descriptor: FingerprintDescriptor,
}

pub struct Coordinator<S: IdentityStore, R: Rng> {
    resolver: PolicyResolver<S, R>,
    pipeline: RefCell<DeliveryPipeline>,
}

impl<S: IdentityStore, R: Rng> Coordinator<S, R> {
    pub fn new(resolver: PolicyResolver<S, R>, config: DeliveryConfig) -> Self {
        Self {
            resolver,
            pipeline: RefCell::new(DeliveryPipeline::new(config)),
        }
    }

    pub fn resolver(&self) -> &PolicyResolver<S, R> {
        &self.resolver
    }

    /// Navigation committed: resolve and stage the payload for `page`.
    ///
    /// Returns `None` when the page must run unspoofed (protection off,
    /// whitelisted, restricted URL, or any failure along the way).
    pub async fn on_page_load_starting(
        &self,
        page: PageLoadId,
        url: &str,
        now_ms: u64,
    ) -> Option<DeliverySnapshot> {
        match self.stage(page, url, now_ms).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                if err.is_silent() {
                    log::debug!("No delivery for page load {}: {}", page, err);
                } else {
                    log::warn!("Delivery for page load {} failed: {}", page, err);
                }
                self.pipeline.borrow_mut().abandon(page);
                None
            }
        }
    }

    async fn stage(
        &self,
        page: PageLoadId,
        url: &str,
        now_ms: u64,
    ) -> Result<Option<DeliverySnapshot>> {
        {
            let mut pipeline = self.pipeline.borrow_mut();
            pipeline.expire(now_ms);
            pipeline.prune();
            if crate::delivery::is_restricted_url(url) {
                return Err(ShieldError::DeliveryRefused(url.to_string()));
            }
        }

        let identity = self.resolver.active_identity(url).await?;
        self.pipeline
            .borrow_mut()
            .begin(page, url, identity.clone(), now_ms)?;

        let descriptor = match self.resolver.resolve(url, identity.as_ref()).await? {
            Some(descriptor) => descriptor,
            None => {
                self.pipeline.borrow_mut().abandon(page);
                return Ok(None);
            }
        };

        let payload = self
            .pipeline
            .borrow_mut()
            .deliver(page, &descriptor, now_ms)?;
        log::debug!("Staged descriptor for page load {}", page);

        Ok(Some(DeliverySnapshot {
            page,
            payload,
            descriptor,
        }))
    }

    /// The user switched away from `previous`; in-flight deliveries made
    /// for it are dropped so a stale identity is never applied.
    pub fn on_identity_switched(&self, previous: &IdentityId) -> Vec<PageLoadId> {
        let dropped = self.pipeline.borrow_mut().invalidate_identity(previous);
        if !dropped.is_empty() {
            log::info!(
                "Identity {} switched, dropped {} pending deliveries",
                previous,
                dropped.len()
            );
        }
        dropped
    }

    /// Backup consumer path: the page asks for its payload directly.
    pub fn take_payload(&self, page: PageLoadId, now_ms: u64) -> Option<String> {
        match self.pipeline.borrow_mut().take_payload(page, now_ms) {
            Ok(payload) => Some(payload),
            Err(err) => {
                log::debug!("No payload for page load {}: {}", page, err);
                None
            }
        }
    }

    pub fn on_applied(&self, page: PageLoadId) {
        if let Err(err) = self.pipeline.borrow_mut().mark_applied(page) {
            log::debug!("Applied report for page load {} ignored: {}", page, err);
        }
    }

    /// The page navigated away or closed.
    pub fn on_page_gone(&self, page: PageLoadId) {
        self.pipeline.borrow_mut().abandon(page);
    }

    pub fn delivery_state(&self, page: PageLoadId) -> Option<DeliveryState> {
        self.pipeline.borrow().state(page)
    }

    pub async fn regenerate(&self, identity: &IdentityId) -> Result<FingerprintDescriptor> {
        self.on_identity_switched(identity);
        self.resolver.regenerate(identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DescriptorGenerator;
    use crate::policy::ChannelToggles;
    use crate::store::MemoryIdentityStore;
    use futures::executor::block_on;
    use rand::rngs::StdRng;

    fn coordinator() -> Coordinator<MemoryIdentityStore, StdRng> {
        Coordinator::new(
            PolicyResolver::new(MemoryIdentityStore::new(), DescriptorGenerator::seeded(21)),
            DeliveryConfig::default(),
        )
    }

    #[test]
    fn test_page_load_delivers_payload() {
        let c = coordinator();
        let snapshot = block_on(c.on_page_load_starting(PageLoadId(1), "https://example.com/", 0))
            .unwrap();
        assert_eq!(c.delivery_state(PageLoadId(1)), Some(DeliveryState::Delivered));
        assert_eq!(
            FingerprintDescriptor::from_payload(&snapshot.payload).unwrap(),
            snapshot.descriptor
        );

        assert_eq!(c.take_payload(PageLoadId(1), 10), Some(snapshot.payload));
        assert_eq!(c.take_payload(PageLoadId(1), 11), None);
        c.on_applied(PageLoadId(1));
        assert_eq!(c.delivery_state(PageLoadId(1)), Some(DeliveryState::Applied));
    }

    #[test]
    fn test_restricted_and_whitelisted() {
        let c = coordinator();
        c.resolver().store().set_whitelist(["bank.com"]);
        assert!(block_on(c.on_page_load_starting(PageLoadId(1), "chrome://newtab", 0)).is_none());
        assert!(
            block_on(c.on_page_load_starting(PageLoadId(2), "https://login.bank.com", 0)).is_none()
        );
        assert_eq!(c.delivery_state(PageLoadId(1)), None);
        assert_eq!(c.delivery_state(PageLoadId(2)), None);
    }

    #[test]
    fn test_protection_off() {
        let c = coordinator();
        c.resolver().store().set_toggles(ChannelToggles {
            fingerprint_enabled: Some(false),
            ..Default::default()
        });
        assert!(block_on(c.on_page_load_starting(PageLoadId(1), "https://a.com", 0)).is_none());
    }

    #[test]
    fn test_invalid_url_fails_open() {
        let c = coordinator();
        assert!(block_on(c.on_page_load_starting(PageLoadId(1), "https://", 0)).is_none());
        assert_eq!(c.delivery_state(PageLoadId(1)), None);
    }

    #[test]
    fn test_identity_switch_drops_pending() {
        let c = coordinator();
        let work = IdentityId::new("work");
        c.resolver().store().set_active_identity("example.com", work.clone());
        block_on(c.on_page_load_starting(PageLoadId(7), "https://example.com", 0)).unwrap();

        assert_eq!(c.on_identity_switched(&work), vec![PageLoadId(7)]);
        assert_eq!(c.take_payload(PageLoadId(7), 1), None);
        assert_eq!(c.delivery_state(PageLoadId(7)), Some(DeliveryState::Expired));
    }

    #[test]
    fn test_expired_records_are_pruned() {
        let c = coordinator();
        block_on(c.on_page_load_starting(PageLoadId(1), "https://a.com", 0)).unwrap();
        block_on(c.on_page_load_starting(PageLoadId(2), "https://b.com", 20_000)).unwrap();
        assert_eq!(c.delivery_state(PageLoadId(1)), None);
        assert_eq!(c.delivery_state(PageLoadId(2)), Some(DeliveryState::Delivered));
    }
}
