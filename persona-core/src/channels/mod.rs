//! Per-channel perturbation algorithms.
//!
//! Everything here is pure computation over plain buffers and numbers. The
//! browser layer reads a surface, hands the values to these functions and
//! writes the result back, so the exact same transforms run in native tests
//! and inside a page.

pub mod audio;
pub mod canvas;
pub mod client_rects;
pub mod fonts;
pub mod timezone;
pub mod webgl;
pub mod webgpu;

use crate::descriptor::{Channel, FingerprintDescriptor};

/// Why a channel is left unspoofed for a page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Flag off in the (resolved) descriptor.
    Disabled,
    /// Enabled, but the descriptor carries no derived seed for it.
    MissingSeed,
}

/// What to install for one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    apply: Vec<Channel>,
    skipped: Vec<(Channel, SkipReason)>,
    spoof_gpu_strings: bool,
}

impl ChannelPlan {
    pub fn should_apply(&self, channel: Channel) -> bool {
        self.apply.contains(&channel)
    }

    pub fn applied(&self) -> &[Channel] {
        &self.apply
    }

    pub fn skipped(&self) -> &[(Channel, SkipReason)] {
        &self.skipped
    }

    /// Vendor/renderer strings are replaced whenever the descriptor carries
    /// `gpuInfo`, independently of the WebGL noise flag.
    pub fn spoof_gpu_strings(&self) -> bool {
        self.spoof_gpu_strings
    }
}

/// Decide which channels a descriptor installs.
///
/// A noise channel whose seed is missing is skipped rather than run with a
/// zero seed, which would be a detectable constant transform.
pub fn plan_channels(descriptor: &FingerprintDescriptor) -> ChannelPlan {
    let mut apply = Vec::new();
    let mut skipped = Vec::new();

    for channel in Channel::ALL {
        if !descriptor.is_enabled(channel) {
            skipped.push((channel, SkipReason::Disabled));
            continue;
        }
        if channel.seed_offset().is_some() && descriptor.channel_seed(channel).is_none() {
            log::debug!("Skipping {}: no derived seed", channel.name());
            skipped.push((channel, SkipReason::MissingSeed));
            continue;
        }
        apply.push(channel);
    }

    ChannelPlan {
        apply,
        skipped,
        spoof_gpu_strings: descriptor.gpu_info.is_some(),
    }
}
