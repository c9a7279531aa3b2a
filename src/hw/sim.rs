// Simulated Wall hardware
//
// Implements the embedded-hal traits over shared atomics so the runtime can run
// on a host. A `SimProbe` keeps handles to every pin for inspection and for
// injecting sensor levels.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use rgb::RGB8;
use tracing::{debug, info};

use super::driver::{Channel, Drive, DriveChannel, DriveTrain, FullSpeed};
use super::lighting::{ComplementaryPair, LedStrip, LightOutput, LightingError, PixelWriter, RgbFixture};
use super::sensors::ObstacleSensors;
use crate::config::{LightingKind, RuntimeConfig};
use crate::messages::{ObstacleState, SensorLayout, Zone};

/// Resolution of simulated PWM outputs
pub const SIM_DUTY_MAX: u16 = 1000;

/// Simulated push-pull output
#[derive(Debug, Clone, Default)]
pub struct SimOutput {
    level: Arc<AtomicBool>,
}

impl SimOutput {
    pub fn is_set_high(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

impl digital::ErrorType for SimOutput {
    type Error = Infallible;
}

impl OutputPin for SimOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Simulated input whose level is set through the probe
#[derive(Debug, Clone, Default)]
pub struct SimInput {
    level: Arc<AtomicBool>,
}

impl SimInput {
    pub fn drive(&self, high: bool) {
        self.level.store(high, Ordering::Relaxed);
    }
}

impl digital::ErrorType for SimInput {
    type Error = Infallible;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.load(Ordering::Relaxed))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.load(Ordering::Relaxed))
    }
}

/// Simulated PWM output
#[derive(Debug, Clone, Default)]
pub struct SimPwm {
    duty: Arc<AtomicU16>,
}

impl SimPwm {
    pub fn duty(&self) -> u16 {
        self.duty.load(Ordering::Relaxed)
    }
}

impl pwm::ErrorType for SimPwm {
    type Error = Infallible;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        SIM_DUTY_MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty.store(duty, Ordering::Relaxed);
        Ok(())
    }
}

/// Simulated addressable strip; keeps the last frame written
#[derive(Debug, Clone, Default)]
pub struct SimPixels {
    frame: Arc<Mutex<Vec<RGB8>>>,
}

impl SimPixels {
    pub fn frame(&self) -> Vec<RGB8> {
        self.frame.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl PixelWriter for SimPixels {
    fn write(&mut self, pixels: &[RGB8]) -> Result<(), LightingError> {
        debug!("Strip frame: {} pixels of {:?}", pixels.len(), pixels.first());
        let mut frame = self.frame.lock().map_err(|_| LightingError::WriteFailed)?;
        frame.clear();
        frame.extend_from_slice(pixels);
        Ok(())
    }
}

/// Pin levels of one simulated drive channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSignal {
    pub forward: bool,
    pub reverse: bool,
    /// `None` on revisions without PWM
    pub duty: Option<u16>,
}

#[derive(Debug, Clone, Default)]
struct ChannelPins {
    forward: SimOutput,
    reverse: SimOutput,
    duty: SimPwm,
}

/// Handles onto every simulated pin
#[derive(Debug, Clone)]
pub struct SimProbe {
    left: ChannelPins,
    right: ChannelPins,
    pwm: bool,
    sensors: Vec<(Zone, SimInput)>,
    active_low: bool,
    layout: SensorLayout,
    fixtures: Option<[[SimPwm; 3]; 2]>,
    strip: Option<SimPixels>,
}

impl SimProbe {
    pub fn channel(&self, channel: Channel) -> ChannelSignal {
        let pins = match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        };
        ChannelSignal {
            forward: pins.forward.is_set_high(),
            reverse: pins.reverse.is_set_high(),
            duty: self.pwm.then(|| pins.duty.duty()),
        }
    }

    /// Drive the sensor inputs so the sampler sees `mask` (status bit layout)
    pub fn set_obstacles(&self, mask: u8) {
        let state = ObstacleState::from_mask(self.layout, mask);
        for (zone, input) in &self.sensors {
            let blocked = state.is_blocked(*zone);
            input.drive(blocked != self.active_low);
        }
        info!("Simulated obstacles set to {:#06b}", state.mask());
    }

    /// Colors shown by the primary and secondary fixtures, as 0..=255
    pub fn fixture_colors(&self) -> Option<[RGB8; 2]> {
        let scale = |pwm: &SimPwm| (pwm.duty() as u32 * 255 / SIM_DUTY_MAX as u32) as u8;
        self.fixtures.as_ref().map(|[a, b]| {
            [
                RGB8::new(scale(&a[0]), scale(&a[1]), scale(&a[2])),
                RGB8::new(scale(&b[0]), scale(&b[1]), scale(&b[2])),
            ]
        })
    }

    /// Last frame written to the strip
    pub fn strip_frame(&self) -> Option<Vec<RGB8>> {
        self.strip.as_ref().map(SimPixels::frame)
    }
}

/// Simulated peripherals for one hardware revision
pub struct SimHardware {
    pub drive: Box<dyn Drive + Send>,
    pub sensors: ObstacleSensors<SimInput>,
    pub lights: Box<dyn LightOutput + Send>,
    pub probe: SimProbe,
}

impl SimHardware {
    pub fn new(config: &RuntimeConfig) -> Self {
        let caps = config.capabilities();
        let max_power = config.drive.max_power;
        info!(
            "Simulated hardware: {:?} sensors, {:?} turns, pwm={}, {:?} lighting",
            caps.layout, caps.turn_policy, caps.pwm, caps.lighting
        );

        let left = ChannelPins::default();
        let right = ChannelPins::default();
        let drive: Box<dyn Drive + Send> = if caps.pwm {
            Box::new(DriveTrain::new(
                DriveChannel::new(
                    Channel::Left,
                    left.forward.clone(),
                    left.reverse.clone(),
                    left.duty.clone(),
                    max_power,
                ),
                DriveChannel::new(
                    Channel::Right,
                    right.forward.clone(),
                    right.reverse.clone(),
                    right.duty.clone(),
                    max_power,
                ),
            ))
        } else {
            Box::new(DriveTrain::new(
                DriveChannel::new(
                    Channel::Left,
                    left.forward.clone(),
                    left.reverse.clone(),
                    FullSpeed,
                    max_power,
                ),
                DriveChannel::new(
                    Channel::Right,
                    right.forward.clone(),
                    right.reverse.clone(),
                    FullSpeed,
                    max_power,
                ),
            ))
        };

        let active_low = config.sensors.active_low;
        let mut sensors = ObstacleSensors::new(caps.layout, active_low);
        let mut inputs = Vec::new();
        for &zone in caps.layout.zones() {
            let input = SimInput::default();
            // Start clear
            input.drive(active_low);
            sensors.attach(zone, input.clone());
            inputs.push((zone, input));
        }

        let (lights, fixtures, strip) = match caps.lighting {
            LightingKind::Complementary => {
                let outputs: [[SimPwm; 3]; 2] = Default::default();
                let [a, b] = outputs.clone();
                let fixture = |[red, green, blue]: [SimPwm; 3]| RgbFixture::new(red, green, blue);
                let pair = ComplementaryPair::new(fixture(a), fixture(b));
                (Box::new(pair) as Box<dyn LightOutput + Send>, Some(outputs), None)
            }
            LightingKind::Strip => {
                let pixels = SimPixels::default();
                let strip = LedStrip::new(pixels.clone(), config.lighting.strip_len);
                (Box::new(strip) as Box<dyn LightOutput + Send>, None, Some(pixels))
            }
        };

        Self {
            drive,
            sensors,
            lights,
            probe: SimProbe {
                left,
                right,
                pwm: caps.pwm,
                sensors: inputs,
                active_low,
                layout: caps.layout,
                fixtures,
                strip,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HardwareVariant;
    use crate::hw::ObstacleSource;
    use crate::messages::MotorCommand;

    #[test]
    fn test_obstacle_injection_round_trips_polarity() {
        for active_low in [true, false] {
            let mut config = RuntimeConfig::for_variant(HardwareVariant::Corners);
            config.sensors.active_low = active_low;
            let mut hw = SimHardware::new(&config);

            assert_eq!(hw.sensors.sample().mask(), 0);
            hw.probe.set_obstacles(0b0101);
            assert_eq!(hw.sensors.sample().mask(), 0b0101);
        }
    }

    #[test]
    fn test_drive_without_pwm_reports_no_duty() {
        let config = RuntimeConfig::for_variant(HardwareVariant::FrontBack);
        let mut hw = SimHardware::new(&config);
        hw.drive.apply(MotorCommand::new(-255, 255)).unwrap();

        let left = hw.probe.channel(Channel::Left);
        assert_eq!(
            left,
            ChannelSignal {
                forward: false,
                reverse: true,
                duty: None
            }
        );
    }

    #[test]
    fn test_fixture_readback() {
        let config = RuntimeConfig::for_variant(HardwareVariant::FrontBack);
        let mut hw = SimHardware::new(&config);
        hw.lights.show(RGB8::new(255, 0, 0)).unwrap();
        assert_eq!(
            hw.probe.fixture_colors(),
            Some([RGB8::new(255, 0, 0), RGB8::new(0, 255, 255)])
        );
        assert!(hw.probe.strip_frame().is_none());
    }
}
