//! The tick loop that fires due alerts and wakeups.
//!
//! Each tick claims due items while holding the store locks, then delivers
//! them after the locks are released. Delivery failures are logged and
//! swallowed; they never stop the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::alert::Alert;
use crate::channel::ChannelSender;
use crate::clock::Clock;
use crate::store::TaskStore;
use crate::task::{Schedule, Task};
use crate::wakeup::Wakeup;

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub fired: usize,
    /// One-off alerts whose window closed before they could fire.
    pub expired: usize,
    pub digests: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

pub struct Scheduler {
    store: Arc<TaskStore>,
    clock: Clock,
    sender: Arc<dyn ChannelSender>,
    tick: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("store", &self.store)
            .field("clock", &self.clock)
            .field("tick", &self.tick)
            .finish()
    }
}

impl Scheduler {
    pub fn new(store: Arc<TaskStore>, clock: Clock, sender: Arc<dyn ChannelSender>) -> Self {
        Self {
            store,
            clock,
            sender,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Fire everything due at `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let mut due: Vec<Alert> = Vec::new();

        self.store.retain(|alert| {
            if alert.claim(now) {
                due.push(alert.clone());
                return alert.is_repeatable();
            }
            if alert.timing.is_expired(now) {
                warn!(
                    alert = alert.id,
                    user = %alert.user,
                    "dropping reminder that missed its window"
                );
                report.expired += 1;
                return false;
            }
            true
        });
        let wakeups: Vec<Wakeup> = self
            .store
            .sweep_wakeups(|w| w.claim(now).then(|| w.clone()));

        for alert in due {
            report.fired += 1;
            match alert.deliver(self.sender.as_ref()).await {
                Some(handle) => self.store.record_reminder_message(&handle, alert),
                None => report.failed += 1,
            }
        }

        for wakeup in wakeups {
            let todos = self.store.todos_for(&wakeup.user);
            let Some(text) = wakeup.digest(&todos) else {
                debug!(user = %wakeup.user, "empty todo list, skipping wakeup");
                continue;
            };
            match self.sender.send(&wakeup.channel, &text).await {
                Ok(_) => report.digests += 1,
                Err(e) => {
                    warn!(user = %wakeup.user, "wakeup delivery failed: {e}");
                    report.failed += 1;
                }
            }
        }

        if !report.is_idle() {
            info!(
                fired = report.fired,
                expired = report.expired,
                digests = report.digests,
                failed = report.failed,
                "sweep"
            );
        }
        report
    }

    /// Sweep every tick, forever. Persistence failures are logged.
    pub async fn run(&self) {
        info!(tick_ms = self.tick.as_millis() as u64, "scheduler started");
        loop {
            let started = Instant::now();
            self.sweep(self.clock.now()).await;
            if let Err(e) = self.store.save() {
                error!("failed to persist store: {e}");
            }
            tokio::time::sleep(self.tick.saturating_sub(started.elapsed())).await;
        }
    }
}
