//! Active session accounting and the idle self-shutdown watchdog.
//!
//! The countdown only advances while no session is active, and every new
//! session resets it to zero. The watchdog therefore only ever fires when
//! there is nothing left to interrupt; it never looks at sessions itself.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::common::format_duration;

/// Period of the idle watchdog.
pub const IDLE_CHECK_PERIOD: Duration = Duration::from_secs(1);

/// Shared counters for one server run.
#[derive(Debug, Default)]
pub struct SessionTracker {
    active: AtomicUsize,
    idle_nanos: AtomicU64,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly accepted session and resets the idle countdown.
    ///
    /// The session stays counted until the returned guard is dropped.
    pub fn session_opened(self: &Arc<Self>) -> SessionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.idle_nanos.store(0, Ordering::SeqCst);
        SessionGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Number of sessions currently being handled.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Time accumulated on the idle countdown.
    pub fn idle_elapsed(&self) -> Duration {
        Duration::from_nanos(self.idle_nanos.load(Ordering::SeqCst))
    }

    /// Advances the countdown by `period` if no session is active.
    ///
    /// Returns the new countdown value, or `None` if sessions are active.
    pub fn advance_idle(&self, period: Duration) -> Option<Duration> {
        if self.active_sessions() != 0 {
            return None;
        }
        let step = u64::try_from(period.as_nanos()).unwrap_or(u64::MAX);
        let previous = self.idle_nanos.fetch_add(step, Ordering::SeqCst);
        Some(Duration::from_nanos(previous.saturating_add(step)))
    }
}

/// Keeps one session counted as active while alive.
#[derive(Debug)]
pub struct SessionGuard {
    tracker: Arc<SessionTracker>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.tracker.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cancels `shutdown` once the server has been idle for `timeout`.
///
/// Returns when it fires or when `shutdown` is cancelled by someone else.
pub async fn run_idle_watchdog(
    tracker: Arc<SessionTracker>,
    timeout: Duration,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let Some(idle) = tracker.advance_idle(period) else {
            continue;
        };

        if idle >= timeout {
            tracing::info!(idle = %format_duration(idle), "idle timeout reached, shutting down");
            shutdown.cancel();
            return;
        }
        tracing::debug!(
            "idle countdown: {}/{}",
            format_duration(idle),
            format_duration(timeout)
        );
    }
}
