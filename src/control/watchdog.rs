// Command watchdog
// If the controller goes quiet while the robot is moving, force a stop once the
// last accepted command is older than the timeout.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::messages::{MovementIntent, RuntimeHealth};

/// Stateless watchdog check
///
/// Returns `Some(Stop)` when `now - last_accepted > timeout`. Never touches the clock.
pub fn tick(now: Instant, last_accepted: Instant, timeout: Duration) -> Option<MovementIntent> {
    (now.saturating_duration_since(last_accepted) > timeout).then_some(MovementIntent::Stop)
}

/// Watchdog clock plus transition tracking for logging and health
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    last_accepted: Instant,
    stale: bool,
}

impl Watchdog {
    /// Starts stale: nothing has been accepted yet
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_accepted: now,
            stale: true,
        }
    }

    /// Record an accepted movement command
    pub fn refresh(&mut self, now: Instant) {
        if self.stale {
            info!("Command stream active");
        }
        self.last_accepted = now;
        self.stale = false;
    }

    /// Check once per cycle; `Some(Stop)` must be applied
    pub fn check(&mut self, now: Instant) -> Option<MovementIntent> {
        let forced = tick(now, self.last_accepted, self.timeout);
        if forced.is_some() && !self.stale {
            warn!(
                "Command stale ({:?} old), stopping robot",
                now.saturating_duration_since(self.last_accepted)
            );
            self.stale = true;
        }
        forced
    }

    pub fn health(&self) -> RuntimeHealth {
        if self.stale {
            RuntimeHealth::CmdStale
        } else {
            RuntimeHealth::Ok
        }
    }

    pub fn last_accepted(&self) -> Instant {
        self.last_accepted
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
