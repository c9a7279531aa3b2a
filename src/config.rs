// Timeouts, topics, hardware variants
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::messages::SensorLayout;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(500);

// Obstacle status notification cadence
pub const STATUS_PERIOD: Duration = Duration::from_millis(2000);

// Full-scale motor power
pub const MAX_POWER: i16 = 255;

// Pixels on the addressable strip
pub const STRIP_LEN: usize = 8;

// Zenoh topics
pub const TOPIC_CMD_DIRECTION: &str = "wall/cmd/direction"; // movement byte
pub const TOPIC_CMD_RGB: &str = "wall/cmd/rgb"; // color triple
pub const TOPIC_STATUS: &str = "wall/state/obstacles"; // obstacle bitmask
pub const TOPIC_HEALTH: &str = "wall/state/health"; // health status
pub const TOPIC_RT_DRIVE: &str = "wall/rt/drive"; // applied motor command
pub const TOPIC_PEERS: &str = "wall/peer/**"; // controller liveliness tokens
pub const TOPIC_SIM_OBSTACLES: &str = "wall/sim/obstacles"; // simulated sensor mask

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Robot hardware revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HardwareVariant {
    /// Corner sensors, differential turns, PWM drive, LED strip
    Corners,
    /// Front/back sensors, pivot turns, full-speed drive, complementary fixtures
    FrontBack,
}

/// How turn intents are mapped onto the two channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPolicy {
    /// Outer channel forward, inner channel held; vetoed by the matching front zone
    Differential,
    /// Channels at opposite signs; never vetoed
    Pivot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingKind {
    /// Two RGB fixtures, the second showing the complement of the first
    Complementary,
    /// Addressable strip, one color for every pixel
    Strip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    #[default]
    Solid,
    Cycle,
}

/// Everything the control loop needs to know about the hardware revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub layout: SensorLayout,
    pub turn_policy: TurnPolicy,
    pub pwm: bool,
    pub lighting: LightingKind,
}

impl HardwareVariant {
    pub fn capabilities(self) -> Capabilities {
        match self {
            HardwareVariant::Corners => Capabilities {
                layout: SensorLayout::Corners,
                turn_policy: TurnPolicy::Differential,
                pwm: true,
                lighting: LightingKind::Strip,
            },
            HardwareVariant::FrontBack => Capabilities {
                layout: SensorLayout::FrontBack,
                turn_policy: TurnPolicy::Pivot,
                pwm: false,
                lighting: LightingKind::Complementary,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub max_power: i16,
    /// Power used for turns, defaults to `max_power`
    pub turn_power: Option<i16>,
    /// Override the variant's PWM capability
    pub pwm: Option<bool>,
    /// Override the variant's turn policy
    pub turn_policy: Option<TurnPolicy>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_power: MAX_POWER,
            turn_power: None,
            pwm: None,
            turn_policy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Sensors pull low when something is in range
    pub active_low: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { active_low: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Override the variant's lighting hardware
    pub kind: Option<LightingKind>,
    pub strip_len: usize,
    pub effect: EffectKind,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            kind: None,
            strip_len: STRIP_LEN,
            effect: EffectKind::Solid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    pub direction: String,
    pub rgb: String,
    pub status: String,
    pub health: String,
    pub drive: String,
    pub peers: String,
    pub sim_obstacles: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            direction: TOPIC_CMD_DIRECTION.into(),
            rgb: TOPIC_CMD_RGB.into(),
            status: TOPIC_STATUS.into(),
            health: TOPIC_HEALTH.into(),
            drive: TOPIC_RT_DRIVE.into(),
            peers: TOPIC_PEERS.into(),
            sim_obstacles: TOPIC_SIM_OBSTACLES.into(),
        }
    }
}

/// Runtime configuration, loaded from JSON; every field has a default
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub variant: HardwareVariant,
    pub loop_hz: u64,
    pub watchdog_ms: u64,
    pub status_period_ms: u64,
    pub drive: DriveConfig,
    pub sensors: SensorConfig,
    pub lighting: LightingConfig,
    pub topics: Topics,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            variant: HardwareVariant::Corners,
            loop_hz: LOOP_HZ,
            watchdog_ms: CMD_TIMEOUT.as_millis() as u64,
            status_period_ms: STATUS_PERIOD.as_millis() as u64,
            drive: DriveConfig::default(),
            sensors: SensorConfig::default(),
            lighting: LightingConfig::default(),
            topics: Topics::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults for a hardware revision
    pub fn for_variant(variant: HardwareVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_hz == 0 || self.loop_hz > 1000 {
            return Err(ConfigError::Invalid(format!(
                "loop_hz must be in 1..=1000, got {}",
                self.loop_hz
            )));
        }
        if self.watchdog_ms == 0 {
            return Err(ConfigError::Invalid("watchdog_ms must be positive".into()));
        }
        if self.status_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "status_period_ms must be positive".into(),
            ));
        }
        if self.drive.max_power <= 0 {
            return Err(ConfigError::Invalid(format!(
                "drive.max_power must be positive, got {}",
                self.drive.max_power
            )));
        }
        if let Some(turn) = self.drive.turn_power {
            if turn <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "drive.turn_power must be positive, got {}",
                    turn
                )));
            }
        }
        if self.lighting.strip_len == 0 {
            return Err(ConfigError::Invalid(
                "lighting.strip_len must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Variant capabilities with config overrides applied
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = self.variant.capabilities();
        if let Some(pwm) = self.drive.pwm {
            caps.pwm = pwm;
        }
        if let Some(policy) = self.drive.turn_policy {
            caps.turn_policy = policy;
        }
        if let Some(kind) = self.lighting.kind {
            caps.lighting = kind;
        }
        caps
    }

    /// Turn power, clamped to full scale
    pub fn turn_power(&self) -> i16 {
        self.drive
            .turn_power
            .unwrap_or(self.drive.max_power)
            .min(self.drive.max_power)
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.loop_hz)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn status_period(&self) -> Duration {
        Duration::from_millis(self.status_period_ms)
    }
}
