// Message types exchanged between the link, the control loop and the hardware

use rgb::RGB8;
use serde::{Deserialize, Serialize};

/// Errors raised while decoding inbound command payloads
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command payload")]
    EmptyPayload,

    #[error("Unknown movement command byte {byte} (0x{byte:02X})")]
    InvalidMovement { byte: u8 },

    #[error("Lighting payload too short: expected 3 bytes, got {len}")]
    ShortLighting { len: usize },
}

/// Requested movement category, before obstacle arbitration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementIntent {
    Stop = 0,
    Forward = 1,
    TurnLeft = 2,
    TurnRight = 3,
    Backward = 4,
}

impl TryFrom<u8> for MovementIntent {
    type Error = CommandError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Self::Stop),
            1 => Ok(Self::Forward),
            2 => Ok(Self::TurnLeft),
            3 => Ok(Self::TurnRight),
            4 => Ok(Self::Backward),
            byte => Err(CommandError::InvalidMovement { byte }),
        }
    }
}

/// First byte of a direction payload; the rest is ignored
///
/// The byte is not decoded here so an unknown value still reaches arbitration
/// and comes out as `Verdict::Invalid`.
pub fn movement_byte(payload: &[u8]) -> Result<u8, CommandError> {
    payload.first().copied().ok_or(CommandError::EmptyPayload)
}

/// Which proximity sensors a hardware revision carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorLayout {
    /// One sensor facing forward, one facing back
    FrontBack,
    /// One sensor per corner
    Corners,
}

impl SensorLayout {
    /// Monitored zones, in status bit order
    pub fn zones(self) -> &'static [Zone] {
        match self {
            SensorLayout::FrontBack => &[Zone::Front, Zone::Back],
            SensorLayout::Corners => &[
                Zone::FrontLeft,
                Zone::FrontRight,
                Zone::BackLeft,
                Zone::BackRight,
            ],
        }
    }

    fn mask(self) -> u8 {
        (1u8 << self.zones().len()) - 1
    }
}

/// A monitored direction around the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Front,
    Back,
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
}

impl Zone {
    /// Bit position of this zone in the status payload
    pub fn bit(self) -> u8 {
        match self {
            Zone::Front | Zone::FrontLeft => 0,
            Zone::Back | Zone::FrontRight => 1,
            Zone::BackLeft => 2,
            Zone::BackRight => 3,
        }
    }

    pub fn layout(self) -> SensorLayout {
        match self {
            Zone::Front | Zone::Back => SensorLayout::FrontBack,
            _ => SensorLayout::Corners,
        }
    }

    pub fn is_front(self) -> bool {
        matches!(self, Zone::Front | Zone::FrontLeft | Zone::FrontRight)
    }

    pub fn is_rear(self) -> bool {
        !self.is_front()
    }
}

/// Snapshot of the proximity sensors for one control cycle
///
/// `true` always means blocked; polarity is resolved by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObstacleState {
    layout: SensorLayout,
    mask: u8,
}

impl ObstacleState {
    /// All zones clear
    pub fn clear(layout: SensorLayout) -> Self {
        Self { layout, mask: 0 }
    }

    /// Build from a status-style bitmask; bits outside the layout are dropped
    pub fn from_mask(layout: SensorLayout, mask: u8) -> Self {
        Self {
            layout,
            mask: mask & layout.mask(),
        }
    }

    /// Returns a copy with `zone` set; zones from another layout are ignored
    pub fn with(mut self, zone: Zone, blocked: bool) -> Self {
        self.set(zone, blocked);
        self
    }

    pub fn set(&mut self, zone: Zone, blocked: bool) {
        if zone.layout() != self.layout {
            return;
        }
        if blocked {
            self.mask |= 1 << zone.bit();
        } else {
            self.mask &= !(1 << zone.bit());
        }
    }

    pub fn is_blocked(&self, zone: Zone) -> bool {
        zone.layout() == self.layout && self.mask & (1 << zone.bit()) != 0
    }

    pub fn layout(&self) -> SensorLayout {
        self.layout
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Iterate over the blocked zones in bit order
    pub fn blocked(&self) -> impl Iterator<Item = Zone> + '_ {
        self.layout
            .zones()
            .iter()
            .copied()
            .filter(|&zone| self.is_blocked(zone))
    }

    /// First blocked front-facing zone, if any
    pub fn front_blocker(&self) -> Option<Zone> {
        self.blocked().find(|zone| zone.is_front())
    }

    /// First blocked rear-facing zone, if any
    pub fn rear_blocker(&self) -> Option<Zone> {
        self.blocked().find(|zone| zone.is_rear())
    }
}

/// Signed power for the left and right drive channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorCommand {
    pub left: i16,
    pub right: i16,
}

impl MotorCommand {
    pub const STOP: MotorCommand = MotorCommand { left: 0, right: 0 };

    pub fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::STOP
    }
}

/// One-byte obstacle bitmask sent to connected peers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPayload(pub u8);

impl StatusPayload {
    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn to_bytes(self) -> Vec<u8> {
        vec![self.0]
    }
}

/// Decode a lighting payload: red, green, blue; trailing bytes are ignored
///
/// Longer payloads are accepted because browser clients may pack the color into a
/// 4-byte word; only a payload too short to hold three channels is rejected.
pub fn parse_color(payload: &[u8]) -> Result<RGB8, CommandError> {
    match payload {
        [r, g, b, ..] => Ok(RGB8::new(*r, *g, *b)),
        _ => Err(CommandError::ShortLighting { len: payload.len() }),
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_wire_values() {
        assert_eq!(MovementIntent::try_from(0), Ok(MovementIntent::Stop));
        assert_eq!(MovementIntent::try_from(1), Ok(MovementIntent::Forward));
        assert_eq!(MovementIntent::try_from(2), Ok(MovementIntent::TurnLeft));
        assert_eq!(MovementIntent::try_from(3), Ok(MovementIntent::TurnRight));
        assert_eq!(MovementIntent::try_from(4), Ok(MovementIntent::Backward));
        assert_eq!(
            MovementIntent::try_from(99),
            Err(CommandError::InvalidMovement { byte: 99 })
        );
    }

    #[test]
    fn test_movement_payload_uses_first_byte() {
        assert_eq!(movement_byte(&[4, 0, 0]), Ok(4));
        assert_eq!(movement_byte(&[99]), Ok(99));
        assert_eq!(movement_byte(&[]), Err(CommandError::EmptyPayload));
    }

    #[test]
    fn test_obstacle_bits_follow_layout() {
        let state = ObstacleState::clear(SensorLayout::Corners)
            .with(Zone::FrontRight, true)
            .with(Zone::BackLeft, true);
        assert_eq!(state.mask(), 0b0110);
        assert!(state.is_blocked(Zone::FrontRight));
        assert!(!state.is_blocked(Zone::FrontLeft));
        assert_eq!(state.front_blocker(), Some(Zone::FrontRight));
        assert_eq!(state.rear_blocker(), Some(Zone::BackLeft));
    }

    #[test]
    fn test_foreign_zone_is_ignored() {
        // Front/Back zones do not exist on corner hardware
        let state = ObstacleState::clear(SensorLayout::Corners).with(Zone::Front, true);
        assert_eq!(state.mask(), 0);
        assert!(!state.is_blocked(Zone::Front));
    }

    #[test]
    fn test_from_mask_drops_unused_bits() {
        let state = ObstacleState::from_mask(SensorLayout::FrontBack, 0xFF);
        assert_eq!(state.mask(), 0b11);
        assert_eq!(
            state.blocked().collect::<Vec<_>>(),
            vec![Zone::Front, Zone::Back]
        );
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color(&[10, 20, 30]), Ok(RGB8::new(10, 20, 30)));
        assert_eq!(parse_color(&[10, 20, 30, 0]), Ok(RGB8::new(10, 20, 30)));
        assert_eq!(
            parse_color(&[10, 20]),
            Err(CommandError::ShortLighting { len: 2 })
        );
    }

    #[test]
    fn test_motor_command_json() {
        let json = serde_json::to_string(&MotorCommand::new(255, -255)).unwrap();
        assert_eq!(json, r#"{"left":255,"right":-255}"#);
    }
}
