//! # Overlay Configuration
//!
//! Every field has a default so a partial `[gossip]` table is enough. Durations
//! are in milliseconds.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::admission::MAX_HARDNESS;
use super::errors::ConfigError;

/// Runtime configuration of one overlay node.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Listen address of the local-module channel.
    pub api_address: String,
    /// Listen address of the peer channel; also advertised to peers and
    /// compared against when refusing self-connections.
    pub p2p_address: String,
    /// Fallback address dialed when no candidates are known.
    pub bootstrapper: Option<String>,
    /// Target number of connected peers.
    pub degree: usize,
    /// Upper bound on neighbours shared with a newly enrolled peer.
    pub max_neighbours_to_share: usize,
    /// Message cache bound.
    pub cache_size: usize,
    /// Hop budget of locally announced items; zero means unlimited.
    pub default_ttl: u8,
    /// Time a connection gets to answer its enrollment challenge.
    pub enroll_timeout_ms: u64,
    /// Base proof-of-work hardness (leading zero hex digits).
    pub enroll_hardness: u8,
    /// Nonces tried before giving up on a challenge.
    pub pow_max_attempts: u64,
    /// Membership maintenance period.
    pub retry_duration_ms: u64,
    /// Rate counters are cleared at this period.
    pub counter_reset_interval_ms: u64,
    /// Messages per key allowed in one counter window.
    pub counter_limit: u32,
    /// Blocklist cleanup period.
    pub block_list_update_duration_ms: u64,
    /// Age after which a blocklist entry expires.
    pub block_list_removal_duration_ms: u64,
    /// PKCS#8 PEM private key; a fresh key is generated when unset.
    pub hostkey: Option<PathBuf>,
    /// Verbose logging.
    pub debug: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            api_address: "127.0.0.1:7001".to_string(),
            p2p_address: "127.0.0.1:4002".to_string(),
            bootstrapper: Some("127.0.0.1:4002".to_string()),
            degree: 30,
            max_neighbours_to_share: 3,
            cache_size: 1_000,
            default_ttl: 10,
            enroll_timeout_ms: 15_000,
            enroll_hardness: 1,
            pow_max_attempts: 10_000_000,
            retry_duration_ms: 1_000,
            counter_reset_interval_ms: 60_000,
            counter_limit: 1_000,
            block_list_update_duration_ms: 10_000,
            block_list_removal_duration_ms: 300_000,
            hostkey: None,
            debug: true,
        }
    }
}

impl OverlayConfig {
    /// Small timeouts and instant maintenance for tests.
    pub fn for_testing() -> Self {
        Self {
            api_address: "127.0.0.1:0".to_string(),
            p2p_address: "127.0.0.1:0".to_string(),
            bootstrapper: None,
            degree: 4,
            cache_size: 64,
            enroll_timeout_ms: 2_000,
            pow_max_attempts: 1_000_000,
            retry_duration_ms: 100,
            counter_reset_interval_ms: 1_000,
            counter_limit: 10,
            block_list_update_duration_ms: 100,
            block_list_removal_duration_ms: 1_000,
            ..Self::default()
        }
    }

    /// Reject values the overlay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enroll_hardness == 0 || self.enroll_hardness > MAX_HARDNESS {
            return Err(ConfigError::Invalid {
                field: "enroll_hardness",
                reason: format!("must be within 1..={MAX_HARDNESS}"),
            });
        }
        if self.cache_size == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_size",
                reason: "must be positive".to_string(),
            });
        }
        if self.degree == 0 {
            return Err(ConfigError::Invalid {
                field: "degree",
                reason: "must be positive".to_string(),
            });
        }
        if self.pow_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "pow_max_attempts",
                reason: "must be positive".to_string(),
            });
        }
        for (field, value) in [
            ("retry_duration_ms", self.retry_duration_ms),
            ("counter_reset_interval_ms", self.counter_reset_interval_ms),
            ("block_list_update_duration_ms", self.block_list_update_duration_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "timer period must be positive".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn enroll_timeout(&self) -> Duration {
        Duration::from_millis(self.enroll_timeout_ms)
    }

    pub fn retry_duration(&self) -> Duration {
        Duration::from_millis(self.retry_duration_ms)
    }

    pub fn counter_reset_interval(&self) -> Duration {
        Duration::from_millis(self.counter_reset_interval_ms)
    }

    pub fn block_list_update_duration(&self) -> Duration {
        Duration::from_millis(self.block_list_update_duration_ms)
    }
}
