//! Page-side bootstrap state machine.
//!
//! One [`PageSession`] per execution context. It accepts a descriptor from
//! whichever path gets there first (ready event, handoff slot poll, direct
//! call), installs every planned channel exactly once behind the context's
//! guard flag, and gives up after the bounded poll budget or the validity
//! window, leaving the page unspoofed.

use std::cell::RefCell;

use crate::channels::{plan_channels, SkipReason};
use crate::config::DeliveryConfig;
use crate::descriptor::{Channel, FingerprintDescriptor};
use crate::error::{Result, ShieldError};

/// The agreed handoff slot a payload is deposited in.
pub trait HandoffSlot {
    fn read(&self) -> Option<String>;

    fn clear(&self);

    /// Read and clear in one step.
    fn take(&self) -> Option<String> {
        let payload = self.read();
        if payload.is_some() {
            self.clear();
        }
        payload
    }
}

/// Installs channel interceptions into one execution context.
pub trait ChannelHost {
    /// Install one channel. An error disables only that channel.
    fn install(&mut self, channel: Channel, descriptor: &FingerprintDescriptor) -> Result<()>;

    /// Whether the context's global guard is already set.
    fn guard_is_set(&self) -> bool;

    fn set_guard(&mut self);
}

#[derive(Debug, Default)]
pub struct MemorySlot {
    payload: RefCell<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, payload: impl Into<String>) {
        *self.payload.borrow_mut() = Some(payload.into());
    }
}

impl HandoffSlot for MemorySlot {
    fn read(&self) -> Option<String> {
        self.payload.borrow().clone()
    }

    fn clear(&self) {
        self.payload.borrow_mut().take();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePhase {
    /// Waiting for a payload.
    Listening,
    /// Hooks installed; terminal.
    Applied,
    /// Window or poll budget exhausted; terminal, page runs unspoofed.
    GaveUp,
}

#[derive(Debug, Default, PartialEq)]
pub struct ApplyReport {
    pub installed: Vec<Channel>,
    pub failed: Vec<(Channel, ShieldError)>,
    pub skipped: Vec<(Channel, SkipReason)>,
}

#[derive(Debug, PartialEq)]
pub enum ApplyOutcome {
    Applied(ApplyReport),
    /// Guard already set; nothing was installed.
    AlreadyApplied,
    /// No payload was available.
    NothingDelivered,
    /// Payload could not be parsed; still listening.
    Rejected(ShieldError),
    /// Window elapsed before a payload arrived.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Continue,
    Done,
}

#[derive(Debug)]
pub struct PageSession {
    config: DeliveryConfig,
    phase: PagePhase,
    started_ms: u64,
    polls: u32,
}

impl PageSession {
    pub fn new(config: DeliveryConfig, now_ms: u64) -> Self {
        Self {
            config,
            phase: PagePhase::Listening,
            started_ms: now_ms,
            polls: 0,
        }
    }

    pub fn phase(&self) -> PagePhase {
        self.phase
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    fn window_elapsed(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.started_ms) >= self.config.validity_window_ms
    }

    /// First look at the handoff slot when the bootstrap starts.
    pub fn bootstrap<H: ChannelHost, S: HandoffSlot>(
        &mut self,
        host: &mut H,
        slot: &S,
        now_ms: u64,
    ) -> ApplyOutcome {
        if host.guard_is_set() {
            self.phase = PagePhase::Applied;
            return ApplyOutcome::AlreadyApplied;
        }
        match slot.take() {
            Some(payload) => self.receive(host, &payload, now_ms),
            None => ApplyOutcome::NothingDelivered,
        }
    }

    /// A payload arrived (ready event or slot poll).
    pub fn receive<H: ChannelHost>(
        &mut self,
        host: &mut H,
        payload: &str,
        now_ms: u64,
    ) -> ApplyOutcome {
        match self.phase {
            PagePhase::Applied => return ApplyOutcome::AlreadyApplied,
            PagePhase::GaveUp => return ApplyOutcome::Expired,
            PagePhase::Listening => {}
        }
        if self.window_elapsed(now_ms) {
            log::debug!("Payload arrived after the validity window");
            self.phase = PagePhase::GaveUp;
            return ApplyOutcome::Expired;
        }
        match FingerprintDescriptor::from_payload(payload) {
            Ok(descriptor) => self.apply(host, &descriptor),
            Err(err) => {
                log::warn!("Discarding handoff payload: {}", err);
                ApplyOutcome::Rejected(err)
            }
        }
    }

    /// Install a descriptor. Used directly by the fallback injection path.
    pub fn apply<H: ChannelHost>(
        &mut self,
        host: &mut H,
        descriptor: &FingerprintDescriptor,
    ) -> ApplyOutcome {
        if self.phase == PagePhase::Applied || host.guard_is_set() {
            self.phase = PagePhase::Applied;
            return ApplyOutcome::AlreadyApplied;
        }
        host.set_guard();
        self.phase = PagePhase::Applied;

        let plan = plan_channels(descriptor);
        let mut report = ApplyReport {
            skipped: plan.skipped().to_vec(),
            ..Default::default()
        };

        for channel in Channel::ALL {
            let wanted = plan.should_apply(channel)
                || (channel == Channel::WebGl && plan.spoof_gpu_strings());
            if !wanted {
                continue;
            }
            match host.install(channel, descriptor) {
                Ok(()) => report.installed.push(channel),
                Err(err) => {
                    if err.is_silent() {
                        log::debug!("{} not installed: {}", channel.name(), err);
                    } else {
                        log::warn!("{} not installed: {}", channel.name(), err);
                    }
                    report.failed.push((channel, err));
                }
            }
        }

        log::info!(
            "Fingerprint applied: {} channels installed, {} failed",
            report.installed.len(),
            report.failed.len()
        );
        ApplyOutcome::Applied(report)
    }

    /// One backup poll of the handoff slot.
    pub fn poll<H: ChannelHost, S: HandoffSlot>(
        &mut self,
        host: &mut H,
        slot: &S,
        now_ms: u64,
    ) -> PollStatus {
        if self.phase != PagePhase::Listening {
            return PollStatus::Done;
        }
        if self.polls >= self.config.poll_attempts || self.window_elapsed(now_ms) {
            log::debug!("No payload after {} polls, running unspoofed", self.polls);
            self.phase = PagePhase::GaveUp;
            return PollStatus::Done;
        }
        self.polls += 1;

        if let Some(payload) = slot.take() {
            self.receive(host, &payload, now_ms);
        }
        if self.phase == PagePhase::Listening {
            PollStatus::Continue
        } else {
            PollStatus::Done
        }
    }
}
