// Obstacle status notifications

use std::time::{Duration, Instant};

use crate::messages::{ObstacleState, StatusPayload};

/// Encode each blocked zone into its fixed bit
pub fn build_payload(obstacles: &ObstacleState) -> StatusPayload {
    StatusPayload(
        obstacles
            .blocked()
            .fold(0u8, |bits, zone| bits | (1 << zone.bit())),
    )
}

/// Emits a status payload on a fixed cadence while a peer is connected
#[derive(Debug, Clone)]
pub struct StatusReporter {
    period: Duration,
    last_emit: Option<Instant>,
}

impl StatusReporter {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_emit: None,
        }
    }

    /// Payload to send this cycle, if any
    pub fn poll(
        &mut self,
        now: Instant,
        connected: bool,
        obstacles: &ObstacleState,
    ) -> Option<StatusPayload> {
        if !connected {
            // Next peer gets a report right away
            self.last_emit = None;
            return None;
        }

        let due = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if !due {
            return None;
        }

        self.last_emit = Some(now);
        Some(build_payload(obstacles))
    }
}
