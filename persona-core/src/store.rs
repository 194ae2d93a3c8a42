//! Identity storage seam.
//!
//! The profile/cookie layer owns identities and persists descriptors; this
//! crate only needs the handful of reads and writes below. Calls are async
//! and single-threaded, matching the browser extension event loop.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::descriptor::FingerprintDescriptor;
use crate::error::Result;
use crate::policy::ChannelToggles;

/// Opaque identity (profile) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait(?Send)]
pub trait IdentityStore {
    /// Identity currently selected for a normalized origin.
    async fn get_active_identity(&self, origin: &str) -> Result<Option<IdentityId>>;

    async fn get_descriptor(&self, identity: &IdentityId) -> Result<Option<FingerprintDescriptor>>;

    async fn put_descriptor(
        &self,
        identity: &IdentityId,
        descriptor: &FingerprintDescriptor,
    ) -> Result<()>;

    /// Shared descriptor used when an origin has no active identity.
    async fn get_origin_default(&self, origin: &str) -> Result<Option<FingerprintDescriptor>>;

    async fn put_origin_default(&self, origin: &str, descriptor: &FingerprintDescriptor)
        -> Result<()>;

    async fn get_whitelist(&self) -> Result<Vec<String>>;

    async fn get_channel_toggles(&self) -> Result<ChannelToggles>;
}

#[derive(Debug, Default)]
struct MemoryState {
    active: HashMap<String, IdentityId>,
    descriptors: HashMap<IdentityId, FingerprintDescriptor>,
    origin_defaults: HashMap<String, FingerprintDescriptor>,
    whitelist: Vec<String>,
    toggles: ChannelToggles,
    descriptor_writes: usize,
}

/// In-memory store for tests and for hosts that keep state elsewhere.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    state: RefCell<MemoryState>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active_identity(&self, origin: impl Into<String>, identity: IdentityId) {
        self.state.borrow_mut().active.insert(origin.into(), identity);
    }

    pub fn clear_active_identity(&self, origin: &str) {
        self.state.borrow_mut().active.remove(origin);
    }

    pub fn set_whitelist<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.borrow_mut().whitelist = patterns.into_iter().map(Into::into).collect();
    }

    pub fn set_toggles(&self, toggles: ChannelToggles) {
        self.state.borrow_mut().toggles = toggles;
    }

    /// Identity deletion destroys its descriptor.
    pub fn delete_identity(&self, identity: &IdentityId) {
        let mut state = self.state.borrow_mut();
        state.descriptors.remove(identity);
        state.active.retain(|_, id| id != identity);
    }

    pub fn stored_descriptor(&self, identity: &IdentityId) -> Option<FingerprintDescriptor> {
        self.state.borrow().descriptors.get(identity).cloned()
    }

    /// Number of `put_descriptor` + `put_origin_default` calls so far.
    pub fn descriptor_writes(&self) -> usize {
        self.state.borrow().descriptor_writes
    }
}

#[async_trait(?Send)]
impl IdentityStore for MemoryIdentityStore {
    async fn get_active_identity(&self, origin: &str) -> Result<Option<IdentityId>> {
        Ok(self.state.borrow().active.get(origin).cloned())
    }

    async fn get_descriptor(&self, identity: &IdentityId) -> Result<Option<FingerprintDescriptor>> {
        Ok(self.state.borrow().descriptors.get(identity).cloned())
    }

    async fn put_descriptor(
        &self,
        identity: &IdentityId,
        descriptor: &FingerprintDescriptor,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.descriptors.insert(identity.clone(), descriptor.clone());
        state.descriptor_writes += 1;
        Ok(())
    }

    async fn get_origin_default(&self, origin: &str) -> Result<Option<FingerprintDescriptor>> {
        Ok(self.state.borrow().origin_defaults.get(origin).cloned())
    }

    async fn put_origin_default(
        &self,
        origin: &str,
        descriptor: &FingerprintDescriptor,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state
            .origin_defaults
            .insert(origin.to_string(), descriptor.clone());
        state.descriptor_writes += 1;
        Ok(())
    }

    async fn get_whitelist(&self) -> Result<Vec<String>> {
        Ok(self.state.borrow().whitelist.clone())
    }

    async fn get_channel_toggles(&self) -> Result<ChannelToggles> {
        Ok(self.state.borrow().toggles.clone())
    }
}
