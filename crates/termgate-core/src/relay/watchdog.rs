//! Activity tracking and idle detection

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Monotonic timestamp of the last transferred byte or received frame
///
/// Stored as milliseconds since the clock was created so it can be updated
/// from any relay task without a lock.
#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    last_millis: AtomicU64,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    /// Start the clock, counting now as activity
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_millis: AtomicU64::new(0),
        }
    }

    /// Record activity now
    pub fn touch(&self) {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_millis.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time of the last recorded activity
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_millis.load(Ordering::Relaxed))
    }

    /// Time since the last recorded activity
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity())
    }
}

/// Periodically checks an [`ActivityClock`] against an idle timeout
#[derive(Debug, Clone, Copy)]
pub struct IdleWatchdog {
    idle_timeout: Duration,
    tick: Duration,
}

impl IdleWatchdog {
    /// Watchdog firing once `idle_timeout` has passed without activity
    #[must_use]
    pub fn new(idle_timeout: Duration, tick: Duration) -> Self {
        Self {
            idle_timeout,
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    /// Resolve once the clock has been idle for longer than the timeout
    ///
    /// Returns the observed idle period. The breach is detected on the first
    /// tick after the deadline.
    pub async fn breached(&self, activity: &ActivityClock) -> Duration {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let idle = activity.idle_for();
            if idle > self.idle_timeout {
                debug!(
                    idle_secs = idle.as_secs(),
                    timeout_secs = self.idle_timeout.as_secs(),
                    "Idle timeout reached"
                );
                return idle;
            }
        }
    }
}
