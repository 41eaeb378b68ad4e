//! # Driven Ports
//!
//! Interfaces the overlay requires from its host.

use crate::domain::{ConfigError, OverlayConfig, Timestamp};

/// Wall clock in milliseconds.
///
/// Tests substitute a controllable clock to exercise blocklist decay without
/// sleeping.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Source of the overlay configuration.
pub trait ConfigProvider: Send + Sync {
    /// Load and validate the current configuration.
    fn overlay_config(&self) -> Result<OverlayConfig, ConfigError>;
}
