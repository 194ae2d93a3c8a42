//! Platform-agnostic core of the fingerprint persona engine.
//!
//! This crate contains NO browser dependencies. The browser bindings crate
//! reads and writes the actual page surfaces and delegates every decision
//! and every perturbation to the code here:
//!
//! - [`generator`]: plausible, internally consistent descriptors
//! - [`prng`]: the seeded noise primitive
//! - [`channels`]: per-channel perturbation algorithms
//! - [`policy`]: which descriptor a page load gets
//! - [`delivery`]: coordinator and page-side handoff state machines
//! - [`interception`]: the install-once table of replaced surfaces

pub mod catalogue;
pub mod channels;
pub mod config;
pub mod coordinator;
pub mod delivery;
pub mod descriptor;
pub mod error;
pub mod generator;
pub mod interception;
pub mod policy;
pub mod prng;
pub mod store;

pub use config::{DeliveryConfig, ShieldConfig};
pub use coordinator::{Coordinator, DeliverySnapshot};
pub use delivery::page::{ApplyOutcome, ChannelHost, HandoffSlot, PageSession, PollStatus};
pub use delivery::{DeliveryPipeline, DeliveryState, PageLoadId};
pub use descriptor::{Channel, ChannelStrength, FingerprintDescriptor};
pub use error::{ErrorCode, ErrorInfo, Result, ShieldError};
pub use generator::DescriptorGenerator;
pub use interception::{InterceptionTable, SurfaceId, SurfaceKind};
pub use policy::{ChannelToggles, PolicyResolver};
pub use prng::{hash_str, seeded_value, SeededStream};
pub use store::{IdentityId, IdentityStore, MemoryIdentityStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
