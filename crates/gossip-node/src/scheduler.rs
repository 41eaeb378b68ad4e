//! # Periodic Tasks
//!
//! | Task | Period | Action |
//! |------|--------|--------|
//! | maintenance | `retry_duration` | dial toward the target degree |
//! | counter reset | `counter_reset_interval` | start a new rate-limit window |
//! | blocklist cleanup | `block_list_update_duration` | release expired keys |
//!
//! Each task first fires one period after it starts. Restarting replaces all
//! three, which is how new periods take effect.

use std::sync::Arc;
use std::time::Duration;

use gossip_overlay::{OverlayConfig, OverlayService, P2pTransport};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Owner of the node's timer tasks.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) all periodic tasks with the periods in `config`.
    pub fn start(
        &mut self,
        config: &OverlayConfig,
        service: Arc<OverlayService>,
        transport: P2pTransport,
    ) {
        self.stop();

        self.tasks.push(every(config.retry_duration(), move || {
            let started = transport.maintain();
            if started > 0 {
                debug!(started, "Maintenance dials started");
            }
        }));

        let counters = Arc::clone(&service);
        self.tasks.push(every(config.counter_reset_interval(), move || {
            counters.reset_counters();
        }));

        self.tasks.push(every(config.block_list_update_duration(), move || {
            service.gc_block_list();
        }));
    }

    /// Cancel every running task.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn every<F>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            tick();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_every_first_fires_after_one_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = every(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(260)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_tasks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        let counter = Arc::clone(&ticks);
        scheduler.tasks.push(every(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(scheduler.is_running());

        scheduler.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_running());
    }
}
