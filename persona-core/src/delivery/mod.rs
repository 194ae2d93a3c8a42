//! Delivery pipeline.
//!
//! Coordinator side: one [`PendingDelivery`] per page load, moving through
//!
//! ```text
//! PendingGeneration --deliver--> Delivered --mark_applied--> Applied
//!        |                           |
//!        +------ window elapsed / identity switched --------> Expired
//! ```
//!
//! `Applied` and `Expired` are terminal. The page side lives in [`page`].

pub mod page;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::DeliveryConfig;
use crate::descriptor::FingerprintDescriptor;
use crate::error::{Result, ShieldError};
use crate::store::IdentityId;

/// Host-assigned page-load identifier (tab/frame/navigation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageLoadId(pub u64);

impl fmt::Display for PageLoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    PendingGeneration,
    Delivered,
    Applied,
    Expired,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Applied | DeliveryState::Expired)
    }
}

/// URL schemes a page context can never be injected into.
pub fn is_restricted_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("chrome")
        || lower.starts_with("edge:")
        || lower.starts_with("about:")
        || lower.starts_with("devtools:")
        || lower.starts_with("view-source:")
}

#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub page: PageLoadId,
    pub origin: String,
    pub identity: Option<IdentityId>,
    pub created_ms: u64,
    pub state: DeliveryState,
    payload: Option<String>,
}

impl PendingDelivery {
    fn is_stale(&self, now_ms: u64, window_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_ms) >= window_ms
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

#[derive(Debug)]
pub struct DeliveryPipeline {
    config: DeliveryConfig,
    records: HashMap<PageLoadId, PendingDelivery>,
}

impl DeliveryPipeline {
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Open a record for a navigation that just committed.
    ///
    /// A new navigation on the same page-load id replaces the old record.
    pub fn begin(
        &mut self,
        page: PageLoadId,
        url: &str,
        identity: Option<IdentityId>,
        now_ms: u64,
    ) -> Result<()> {
        if is_restricted_url(url) {
            return Err(ShieldError::DeliveryRefused(url.to_string()));
        }
        if self.records.contains_key(&page) {
            log::debug!("Page load {} restarted, dropping previous delivery", page);
        }
        self.records.insert(
            page,
            PendingDelivery {
                page,
                origin: url.to_string(),
                identity,
                created_ms: now_ms,
                state: DeliveryState::PendingGeneration,
                payload: None,
            },
        );
        Ok(())
    }

    /// Attach the resolved descriptor and return the one-shot payload.
    pub fn deliver(
        &mut self,
        page: PageLoadId,
        descriptor: &FingerprintDescriptor,
        now_ms: u64,
    ) -> Result<String> {
        let window = self.config.validity_window_ms;
        let record = self
            .records
            .get_mut(&page)
            .ok_or(ShieldError::NoPendingDelivery(page.0))?;

        if record.state != DeliveryState::PendingGeneration {
            return Err(ShieldError::Internal(format!(
                "page load {} cannot be delivered from {:?}",
                page, record.state
            )));
        }
        if record.is_stale(now_ms, window) {
            record.state = DeliveryState::Expired;
            return Err(ShieldError::DeliveryExpired(page.0));
        }

        let payload = descriptor.to_payload()?;
        record.payload = Some(payload.clone());
        record.state = DeliveryState::Delivered;
        Ok(payload)
    }

    /// Hand the payload to its first consumer. Later calls find nothing.
    pub fn take_payload(&mut self, page: PageLoadId, now_ms: u64) -> Result<String> {
        let window = self.config.validity_window_ms;
        let record = self
            .records
            .get_mut(&page)
            .ok_or(ShieldError::NoPendingDelivery(page.0))?;

        if record.state == DeliveryState::Delivered && record.is_stale(now_ms, window) {
            record.state = DeliveryState::Expired;
            record.payload = None;
        }
        if record.state == DeliveryState::Expired {
            return Err(ShieldError::DeliveryExpired(page.0));
        }
        record
            .payload
            .take()
            .ok_or(ShieldError::NoPendingDelivery(page.0))
    }

    /// The page context reported the descriptor as installed.
    pub fn mark_applied(&mut self, page: PageLoadId) -> Result<()> {
        let record = self
            .records
            .get_mut(&page)
            .ok_or(ShieldError::NoPendingDelivery(page.0))?;
        match record.state {
            DeliveryState::Delivered => {
                record.state = DeliveryState::Applied;
                record.payload = None;
                Ok(())
            }
            DeliveryState::Applied => Ok(()),
            DeliveryState::Expired => Err(ShieldError::DeliveryExpired(page.0)),
            DeliveryState::PendingGeneration => Err(ShieldError::NoPendingDelivery(page.0)),
        }
    }

    /// Expire every non-terminal record whose window has elapsed.
    pub fn expire(&mut self, now_ms: u64) -> Vec<PageLoadId> {
        let window = self.config.validity_window_ms;
        let mut expired = Vec::new();
        for record in self.records.values_mut() {
            if !record.state.is_terminal() && record.is_stale(now_ms, window) {
                record.state = DeliveryState::Expired;
                record.payload = None;
                expired.push(record.page);
            }
        }
        if !expired.is_empty() {
            log::debug!("Expired {} pending deliveries", expired.len());
        }
        expired
    }

    /// Expire in-flight deliveries made for `identity`.
    pub fn invalidate_identity(&mut self, identity: &IdentityId) -> Vec<PageLoadId> {
        let mut invalidated = Vec::new();
        for record in self.records.values_mut() {
            if !record.state.is_terminal() && record.identity.as_ref() == Some(identity) {
                record.state = DeliveryState::Expired;
                record.payload = None;
                invalidated.push(record.page);
            }
        }
        invalidated
    }

    /// The page navigated away or closed; forget it without retrying.
    pub fn abandon(&mut self, page: PageLoadId) -> bool {
        self.records.remove(&page).is_some()
    }

    pub fn state(&self, page: PageLoadId) -> Option<DeliveryState> {
        self.records.get(&page).map(|r| r.state)
    }

    pub fn record(&self, page: PageLoadId) -> Option<&PendingDelivery> {
        self.records.get(&page)
    }

    /// Drop terminal records.
    pub fn prune(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| !r.state.is_terminal());
        before - self.records.len()
    }

    pub fn in_flight(&self) -> usize {
        self.records
            .values()
            .filter(|r| !r.state.is_terminal())
            .count()
    }
}
