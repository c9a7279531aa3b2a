// Control loop for the Wall base
//
// One cycle, in order:
//   1. sample obstacle sensors
//   2. arbitrate the pending movement command (if any) and actuate
//   3. run the watchdog; a forced stop overrides step 2
//   4. emit the status payload on cadence while a peer is connected
//   5. drive lighting
//
// Inbound commands land in single-slot mailboxes through `LinkHandler` and are
// drained once per cycle.

pub mod arbiter;
mod mailbox;
pub mod reporter;
pub mod watchdog;

use std::time::Instant;

use rgb::RGB8;
use tracing::{debug, info, trace, warn};

use crate::config::{EffectKind, RuntimeConfig};
use crate::hw::lighting::EFFECT_STEP;
use crate::hw::{ColorCycle, Drive, LightOutput, ObstacleSource};
use crate::messages::{self, MotorCommand, ObstacleState, RuntimeHealth, StatusPayload};

pub use arbiter::{Arbiter, Verdict};
pub use mailbox::Mailbox;
pub use reporter::{StatusReporter, build_payload};
pub use watchdog::Watchdog;

/// Link-side events, called by the transport adapter
pub trait LinkHandler {
    fn on_connect(&mut self);
    fn on_disconnect(&mut self);
    /// Movement payload; only the first byte is used
    fn on_command(&mut self, payload: &[u8]);
    /// Lighting payload: red, green, blue
    fn on_lighting_command(&mut self, payload: &[u8]);
}

/// What happened during one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub obstacles: ObstacleState,
    /// Arbitration result, when a movement command was pending
    pub verdict: Option<Verdict>,
    /// The watchdog forced a stop this cycle
    pub forced_stop: bool,
    pub status: Option<StatusPayload>,
    /// Motor command in effect after the cycle
    pub motors: MotorCommand,
    pub health: RuntimeHealth,
    /// Color pushed to the lights this cycle
    pub color: Option<RGB8>,
}

enum Effect {
    Solid,
    Cycle { cycle: ColorCycle, next_step: Instant },
}

pub struct ControlLoop<D, S, L> {
    arbiter: Arbiter,
    watchdog: Watchdog,
    reporter: StatusReporter,
    drive: D,
    sensors: S,
    lights: L,
    movement: Mailbox<u8>,
    lighting: Mailbox<Vec<u8>>,
    peers: usize,
    obstacles: ObstacleState,
    motors: MotorCommand,
    /// A drive write failed part way: pin state unknown until a stop succeeds
    motors_unknown: bool,
    effect: Effect,
}

impl<D, S, L> ControlLoop<D, S, L>
where
    D: Drive,
    S: ObstacleSource,
    L: LightOutput,
{
    /// Build the loop and put the motors into the stopped state
    pub fn new(config: &RuntimeConfig, drive: D, sensors: S, lights: L, now: Instant) -> Self {
        let caps = config.capabilities();
        let effect = match config.lighting.effect {
            EffectKind::Solid => Effect::Solid,
            EffectKind::Cycle => Effect::Cycle {
                cycle: ColorCycle::new(),
                next_step: now,
            },
        };

        let mut control = Self {
            arbiter: Arbiter::from_config(config),
            watchdog: Watchdog::new(config.watchdog_timeout(), now),
            reporter: StatusReporter::new(config.status_period()),
            drive,
            sensors,
            lights,
            movement: Mailbox::new(),
            lighting: Mailbox::new(),
            peers: 0,
            obstacles: ObstacleState::clear(caps.layout),
            motors: MotorCommand::STOP,
            motors_unknown: false,
            effect,
        };
        control.actuate(MotorCommand::STOP);
        control
    }

    /// Run one control cycle
    pub fn cycle(&mut self, now: Instant) -> CycleReport {
        // 1. Fresh obstacle snapshot before any decision
        self.obstacles = self.sensors.sample();

        // 2. Pending movement command
        let verdict = self.movement.take().map(|byte| {
            let verdict = self.arbiter.decide_raw(byte, &self.obstacles);
            match verdict {
                Verdict::Accepted { intent, command } => {
                    trace!("Accepted {:?} -> {:?}", intent, command);
                    if self.actuate(command) {
                        self.watchdog.refresh(now);
                    }
                }
                Verdict::Vetoed { intent, zone } => {
                    debug!("Vetoed {:?}: {:?} blocked", intent, zone);
                    self.actuate(verdict.command());
                }
                Verdict::Invalid { byte } => {
                    warn!("Strange movement command {} (0x{:02X}), ignored", byte, byte);
                }
            }
            verdict
        });

        // 3. Watchdog, every cycle; a failed write is retried as a stop until it sticks
        let forced_stop = self.watchdog.check(now).is_some();
        if self.motors_unknown || (forced_stop && !self.motors.is_stop()) {
            self.actuate(MotorCommand::STOP);
        }

        // 4. Status on cadence
        let status = self.reporter.poll(now, self.is_connected(), &self.obstacles);

        // 5. Lighting
        let color = self.drive_lighting(now);

        CycleReport {
            obstacles: self.obstacles,
            verdict,
            forced_stop,
            status,
            motors: self.motors,
            health: self.watchdog.health(),
            color,
        }
    }

    /// Release the motors before shutting down
    pub fn shutdown(&mut self) {
        info!("Stopping motors");
        self.actuate(MotorCommand::STOP);
        if let Err(e) = self.drive.coast() {
            warn!("Failed to release motors: {}", e);
        }
        self.motors = MotorCommand::STOP;
    }

    pub fn is_connected(&self) -> bool {
        self.peers > 0
    }

    /// Obstacle snapshot from the most recent cycle
    pub fn obstacles(&self) -> &ObstacleState {
        &self.obstacles
    }

    /// Motor command currently in effect
    pub fn motors(&self) -> MotorCommand {
        self.motors
    }

    pub fn health(&self) -> RuntimeHealth {
        self.watchdog.health()
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Write `command` to the drive; on failure fall back to a stop
    fn actuate(&mut self, command: MotorCommand) -> bool {
        match self.drive.apply(command) {
            Ok(()) => {
                self.motors = command;
                self.motors_unknown = false;
                return true;
            }
            Err(e) => warn!("Failed to apply {:?}: {}", command, e),
        }

        self.motors = MotorCommand::STOP;
        self.motors_unknown = true;
        if !command.is_stop() {
            match self.drive.apply(MotorCommand::STOP) {
                Ok(()) => self.motors_unknown = false,
                Err(e) => warn!("Failed to stop motors: {}", e),
            }
        }
        false
    }

    fn drive_lighting(&mut self, now: Instant) -> Option<RGB8> {
        let color = match self.lighting.take() {
            Some(payload) => match messages::parse_color(&payload) {
                Ok(color) => {
                    self.effect = Effect::Solid;
                    Some(color)
                }
                Err(e) => {
                    debug!("Ignoring lighting command: {}", e);
                    None
                }
            },
            None => match &mut self.effect {
                Effect::Solid => None,
                Effect::Cycle { cycle, next_step } => {
                    if now >= *next_step {
                        *next_step = now + EFFECT_STEP;
                        Some(cycle.step())
                    } else {
                        None
                    }
                }
            },
        };

        let color = color?;
        match self.lights.show(color) {
            Ok(()) => Some(color),
            Err(e) => {
                warn!("Failed to show color {:?}: {}", color, e);
                None
            }
        }
    }
}

impl<D, S, L> LinkHandler for ControlLoop<D, S, L>
where
    D: Drive,
    S: ObstacleSource,
    L: LightOutput,
{
    fn on_connect(&mut self) {
        self.peers += 1;
        info!("Connected! ({} peer(s))", self.peers);
    }

    fn on_disconnect(&mut self) {
        self.peers = self.peers.saturating_sub(1);
        info!("Disconnected! ({} peer(s) left)", self.peers);
    }

    fn on_command(&mut self, payload: &[u8]) {
        let byte = match messages::movement_byte(payload) {
            Ok(byte) => byte,
            Err(e) => {
                debug!("Movement payload dropped: {}", e);
                return;
            }
        };
        if let Some(old) = self.movement.post(byte) {
            trace!("Movement command {} superseded by {}", old, byte);
        }
    }

    fn on_lighting_command(&mut self, payload: &[u8]) {
        if self.lighting.post(payload.to_vec()).is_some() {
            trace!("Lighting command superseded");
        }
    }
}
