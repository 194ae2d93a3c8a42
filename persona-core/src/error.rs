//! Error types for the fingerprint persona core
//!
//! The taxonomy follows how failures are allowed to surface:
//! - Generation errors are local computation failures and only ever logged
//! - Delivery errors are expected (restricted pages, sandboxed frames) and skipped
//! - Application errors isolate a single channel
//! - Consistency errors mean a malformed descriptor; the affected channel is skipped
//!
//! Nothing in this taxonomy is meant to reach the visited page.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::Channel;

pub type Result<T> = std::result::Result<T, ShieldError>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Generation errors (1xx)
    GenerationFailed = 100,

    // Delivery errors (2xx)
    DeliveryRefused = 200,
    DeliveryExpired = 201,
    NoPendingDelivery = 202,

    // Application errors (3xx)
    InjectionFailed = 300,
    UnsupportedSurface = 301,

    // Consistency errors (4xx)
    MalformedDescriptor = 400,
    MissingSeed = 401,

    // Storage errors (5xx)
    StorageError = 500,

    // Configuration errors (6xx)
    ConfigError = 600,
    InvalidOrigin = 601,

    // Internal errors (9xx)
    InternalError = 900,
}

/// Main error type for the persona subsystem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShieldError {
    // ===== Generation Errors =====
    #[error("Descriptor generation failed: {0}")]
    Generation(String),

    // ===== Delivery Errors =====
    #[error("Delivery refused for {0}")]
    DeliveryRefused(String),

    #[error("Pending delivery for page load {0} expired")]
    DeliveryExpired(u64),

    #[error("No pending delivery for page load {0}")]
    NoPendingDelivery(u64),

    // ===== Application Errors =====
    #[error("Injection failed on {channel:?}: {message}")]
    Injection { channel: Channel, message: String },

    #[error("Surface not available: {0}")]
    UnsupportedSurface(String),

    // ===== Consistency Errors =====
    #[error("Malformed descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("Descriptor has no derived seed for {0:?}")]
    MissingSeed(Channel),

    // ===== Storage Errors =====
    #[error("Storage error: {0}")]
    Storage(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShieldError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            ShieldError::Generation(_) => ErrorCode::GenerationFailed,

            ShieldError::DeliveryRefused(_) => ErrorCode::DeliveryRefused,
            ShieldError::DeliveryExpired(_) => ErrorCode::DeliveryExpired,
            ShieldError::NoPendingDelivery(_) => ErrorCode::NoPendingDelivery,

            ShieldError::Injection { .. } => ErrorCode::InjectionFailed,
            ShieldError::UnsupportedSurface(_) => ErrorCode::UnsupportedSurface,

            ShieldError::MalformedDescriptor(_) => ErrorCode::MalformedDescriptor,
            ShieldError::MissingSeed(_) => ErrorCode::MissingSeed,

            ShieldError::Storage(_) => ErrorCode::StorageError,

            ShieldError::Config(_) => ErrorCode::ConfigError,
            ShieldError::InvalidOrigin(_) => ErrorCode::InvalidOrigin,

            ShieldError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether this error is fatal for the coordinator.
    ///
    /// Only generation failures qualify: generation runs over fixed tables,
    /// so a failure there means resource exhaustion.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShieldError::Generation(_))
    }

    /// Whether this error degrades to unspoofed passthrough without any log
    /// above `debug`. These are the expected, routine failures.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            ShieldError::DeliveryRefused(_)
                | ShieldError::DeliveryExpired(_)
                | ShieldError::NoPendingDelivery(_)
                | ShieldError::UnsupportedSurface(_)
        )
    }

    /// Whether the failure is confined to one channel
    pub fn channel(&self) -> Option<Channel> {
        match self {
            ShieldError::Injection { channel, .. } => Some(*channel),
            ShieldError::MissingSeed(channel) => Some(*channel),
            _ => None,
        }
    }

    pub fn injection(channel: Channel, message: impl Into<String>) -> Self {
        ShieldError::Injection {
            channel,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ShieldError {
    fn from(err: serde_json::Error) -> Self {
        ShieldError::MalformedDescriptor(err.to_string())
    }
}

/// Error information for host consumption
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
    pub is_fatal: bool,
    pub is_silent: bool,
}

impl From<&ShieldError> for ErrorInfo {
    fn from(err: &ShieldError) -> Self {
        ErrorInfo {
            code: err.code() as u32,
            message: err.to_string(),
            is_fatal: err.is_fatal(),
            is_silent: err.is_silent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(ShieldError::Generation("oom".into()).is_fatal());

        assert!(!ShieldError::Storage("quota".into()).is_fatal());
        assert!(!ShieldError::DeliveryExpired(7).is_fatal());
        assert!(!ShieldError::MissingSeed(Channel::Canvas).is_fatal());
    }

    #[test]
    fn test_silent_errors() {
        assert!(ShieldError::DeliveryRefused("chrome://settings".into()).is_silent());
        assert!(ShieldError::UnsupportedSurface("GPUAdapter".into()).is_silent());

        assert!(!ShieldError::Storage("quota".into()).is_silent());
        assert!(!ShieldError::injection(Channel::Audio, "boom").is_silent());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ShieldError::MissingSeed(Channel::WebGl).code(),
            ErrorCode::MissingSeed
        );
        assert_eq!(ShieldError::DeliveryExpired(1).code(), ErrorCode::DeliveryExpired);
        assert_eq!(
            ShieldError::injection(Channel::Font, "x").code(),
            ErrorCode::InjectionFailed
        );
    }

    #[test]
    fn test_channel_scope() {
        assert_eq!(
            ShieldError::injection(Channel::DomRect, "x").channel(),
            Some(Channel::DomRect)
        );
        assert_eq!(ShieldError::Storage("x".into()).channel(), None);
    }

    #[test]
    fn test_error_info() {
        let info = ErrorInfo::from(&ShieldError::MissingSeed(Channel::Audio));
        assert_eq!(info.code, 401);
        assert!(!info.is_fatal);
        assert!(info.message.contains("Audio"));
    }
}
