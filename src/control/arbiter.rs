// Movement arbitration
//
// Turns a movement intent plus the current obstacle snapshot into per-channel
// power. Pure: no hardware access, no clock.

use crate::config::{RuntimeConfig, TurnPolicy};
use crate::messages::{MotorCommand, MovementIntent, ObstacleState, SensorLayout, Zone};

/// Outcome of arbitrating one movement command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Motion allowed; apply `command` and refresh the watchdog
    Accepted {
        intent: MovementIntent,
        command: MotorCommand,
    },
    /// Motion refused because `zone` is blocked
    Vetoed { intent: MovementIntent, zone: Zone },
    /// Unknown command byte
    Invalid { byte: u8 },
}

impl Verdict {
    /// Power to apply; all-zero unless accepted
    pub fn command(&self) -> MotorCommand {
        match self {
            Verdict::Accepted { command, .. } => *command,
            _ => MotorCommand::STOP,
        }
    }

    pub fn accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arbiter {
    max_power: i16,
    turn_power: i16,
    turn_policy: TurnPolicy,
}

impl Arbiter {
    pub fn new(max_power: i16, turn_power: i16, turn_policy: TurnPolicy) -> Self {
        let max_power = max_power.max(1);
        Self {
            max_power,
            turn_power: turn_power.clamp(0, max_power),
            turn_policy,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            config.drive.max_power,
            config.turn_power(),
            config.capabilities().turn_policy,
        )
    }

    pub fn turn_policy(&self) -> TurnPolicy {
        self.turn_policy
    }

    /// Arbitrate a raw command byte
    pub fn decide_raw(&self, byte: u8, obstacles: &ObstacleState) -> Verdict {
        match MovementIntent::try_from(byte) {
            Ok(intent) => self.decide(intent, obstacles),
            Err(_) => Verdict::Invalid { byte },
        }
    }

    pub fn decide(&self, intent: MovementIntent, obstacles: &ObstacleState) -> Verdict {
        let max = self.max_power;
        let turn = self.turn_power;

        let blocker = match intent {
            MovementIntent::Stop => None,
            MovementIntent::Forward => obstacles.front_blocker(),
            MovementIntent::Backward => obstacles.rear_blocker(),
            MovementIntent::TurnLeft | MovementIntent::TurnRight => match self.turn_policy {
                TurnPolicy::Pivot => None,
                TurnPolicy::Differential => {
                    let zone = turn_guard(intent, obstacles.layout());
                    obstacles.is_blocked(zone).then_some(zone)
                }
            },
        };
        if let Some(zone) = blocker {
            return Verdict::Vetoed { intent, zone };
        }

        let command = match (intent, self.turn_policy) {
            (MovementIntent::Stop, _) => MotorCommand::STOP,
            (MovementIntent::Forward, _) => MotorCommand::new(max, max),
            (MovementIntent::Backward, _) => MotorCommand::new(-max, -max),
            (MovementIntent::TurnLeft, TurnPolicy::Differential) => MotorCommand::new(0, turn),
            (MovementIntent::TurnRight, TurnPolicy::Differential) => MotorCommand::new(turn, 0),
            (MovementIntent::TurnLeft, TurnPolicy::Pivot) => MotorCommand::new(-turn, turn),
            (MovementIntent::TurnRight, TurnPolicy::Pivot) => MotorCommand::new(turn, -turn),
        };
        Verdict::Accepted { intent, command }
    }
}

/// Front zone that has to be clear for a differential turn
fn turn_guard(intent: MovementIntent, layout: SensorLayout) -> Zone {
    match (layout, intent) {
        (SensorLayout::FrontBack, _) => Zone::Front,
        (SensorLayout::Corners, MovementIntent::TurnRight) => Zone::FrontRight,
        (SensorLayout::Corners, _) => Zone::FrontLeft,
    }
}
