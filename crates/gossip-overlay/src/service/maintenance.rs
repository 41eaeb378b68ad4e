use tracing::{debug, info};

use crate::service::OverlayService;

impl OverlayService {
    /// Start a new rate-limit window.
    ///
    /// Call from a timer at `counter_reset_interval`.
    pub fn reset_counters(&self) {
        self.counters.lock().reset();
        debug!("Rate counters reset");
    }

    /// Drop blocklist entries older than `block_list_removal_duration`.
    ///
    /// Call from a timer at `block_list_update_duration`. Returns how many
    /// keys were released.
    pub fn gc_block_list(&self) -> usize {
        let now = self.now();
        let removal_ms = self.config.read().block_list_removal_duration_ms;
        let released = self.block_list.lock().gc_expired(now, removal_ms);
        if released > 0 {
            info!(released, "Blocklist entries expired");
        }
        released
    }
}
