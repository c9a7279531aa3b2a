// Two-pin H-bridge drive channels for the Wall base
//
// Each channel has two direction outputs plus an enable/duty output:
//   power > 0  -> forward pin active, reverse pin idle, duty = |power|
//   power < 0  -> forward pin idle, reverse pin active, duty = |power|
//   power == 0 -> both pins active, duty full (locked bridge, electrical brake)

use std::cmp::Ordering;
use std::convert::Infallible;

use embedded_hal::digital::{self, Error as _, OutputPin, PinState};
use embedded_hal::pwm::{self, Error as _, SetDutyCycle};
use tracing::{debug, trace, warn};

use crate::messages::MotorCommand;

/// Drive channel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// Error types for drive actuation
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("{channel:?} channel direction pin fault: {kind:?}")]
    Pin {
        channel: Channel,
        kind: digital::ErrorKind,
    },

    #[error("{channel:?} channel duty output fault: {kind:?}")]
    Duty { channel: Channel, kind: pwm::ErrorKind },
}

/// Something that can turn a `MotorCommand` into motion
pub trait Drive {
    /// Apply signed power to both channels
    fn apply(&mut self, command: MotorCommand) -> Result<(), ActuatorError>;

    /// Release both channels (free-wheel)
    fn coast(&mut self) -> Result<(), ActuatorError>;
}

impl<T: Drive + ?Sized> Drive for Box<T> {
    fn apply(&mut self, command: MotorCommand) -> Result<(), ActuatorError> {
        (**self).apply(command)
    }

    fn coast(&mut self) -> Result<(), ActuatorError> {
        (**self).coast()
    }
}

/// Duty output for revisions wired without PWM: the bridge always runs at full speed
#[derive(Debug, Clone, Copy, Default)]
pub struct FullSpeed;

impl pwm::ErrorType for FullSpeed {
    type Error = Infallible;
}

impl SetDutyCycle for FullSpeed {
    fn max_duty_cycle(&self) -> u16 {
        1
    }

    fn set_duty_cycle(&mut self, _duty: u16) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// One drive channel: two direction pins and a duty output
pub struct DriveChannel<A, B, P> {
    channel: Channel,
    forward: A,
    reverse: B,
    duty: P,
    max_power: i16,
    power: i16,
}

impl<A, B, P> DriveChannel<A, B, P>
where
    A: OutputPin,
    B: OutputPin,
    P: SetDutyCycle,
{
    pub fn new(channel: Channel, forward: A, reverse: B, duty: P, max_power: i16) -> Self {
        Self {
            channel,
            forward,
            reverse,
            duty,
            max_power: max_power.max(1),
            power: 0,
        }
    }

    /// Drive the channel at signed power, clamped to `[-max_power, max_power]`
    pub fn set_power(&mut self, power: i16) -> Result<(), ActuatorError> {
        let power = power.clamp(-self.max_power, self.max_power);
        trace!("{:?} channel power {}", self.channel, power);

        match power.cmp(&0) {
            Ordering::Equal => {
                self.set_pins(PinState::High, PinState::High)?;
                self.duty_result(|duty| duty.set_duty_cycle_fully_on())?;
            }
            Ordering::Greater => {
                self.set_pins(PinState::High, PinState::Low)?;
                self.set_magnitude(power.unsigned_abs())?;
            }
            Ordering::Less => {
                self.set_pins(PinState::Low, PinState::High)?;
                self.set_magnitude(power.unsigned_abs())?;
            }
        }

        self.power = power;
        Ok(())
    }

    /// Both pins idle and duty off: the motor spins freely
    pub fn coast(&mut self) -> Result<(), ActuatorError> {
        debug!("{:?} channel coasting", self.channel);
        self.set_pins(PinState::Low, PinState::Low)?;
        self.duty_result(|duty| duty.set_duty_cycle_fully_off())?;
        self.power = 0;
        Ok(())
    }

    /// Last power successfully applied
    pub fn power(&self) -> i16 {
        self.power
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    fn set_pins(&mut self, forward: PinState, reverse: PinState) -> Result<(), ActuatorError> {
        let channel = self.channel;
        self.forward
            .set_state(forward)
            .map_err(|e| ActuatorError::Pin {
                channel,
                kind: e.kind(),
            })?;
        self.reverse
            .set_state(reverse)
            .map_err(|e| ActuatorError::Pin {
                channel,
                kind: e.kind(),
            })
    }

    fn set_magnitude(&mut self, magnitude: u16) -> Result<(), ActuatorError> {
        let full_scale = self.max_power as u16;
        self.duty_result(|duty| duty.set_duty_cycle_fraction(magnitude, full_scale))
    }

    fn duty_result(
        &mut self,
        op: impl FnOnce(&mut P) -> Result<(), P::Error>,
    ) -> Result<(), ActuatorError> {
        let channel = self.channel;
        op(&mut self.duty).map_err(|e| ActuatorError::Duty {
            channel,
            kind: e.kind(),
        })
    }
}

/// Left and right channels of the base
pub struct DriveTrain<A, B, P>
where
    A: OutputPin,
    B: OutputPin,
    P: SetDutyCycle,
{
    left: DriveChannel<A, B, P>,
    right: DriveChannel<A, B, P>,
    released: bool,
}

impl<A, B, P> DriveTrain<A, B, P>
where
    A: OutputPin,
    B: OutputPin,
    P: SetDutyCycle,
{
    pub fn new(left: DriveChannel<A, B, P>, right: DriveChannel<A, B, P>) -> Self {
        Self {
            left,
            right,
            released: false,
        }
    }

    /// Drive a single channel
    pub fn apply_channel(&mut self, channel: Channel, power: i16) -> Result<(), ActuatorError> {
        match channel {
            Channel::Left => self.left.set_power(power),
            Channel::Right => self.right.set_power(power),
        }
    }

    /// Currently applied powers
    pub fn command(&self) -> MotorCommand {
        MotorCommand::new(self.left.power(), self.right.power())
    }
}

impl<A, B, P> Drive for DriveTrain<A, B, P>
where
    A: OutputPin,
    B: OutputPin,
    P: SetDutyCycle,
{
    fn apply(&mut self, command: MotorCommand) -> Result<(), ActuatorError> {
        // Both sides are always attempted; first error wins
        self.released = false;
        let left = self.apply_channel(Channel::Left, command.left);
        let right = self.apply_channel(Channel::Right, command.right);
        left.and(right)
    }

    fn coast(&mut self) -> Result<(), ActuatorError> {
        self.released = true;
        let left = self.left.coast();
        let right = self.right.coast();
        left.and(right)
    }
}

impl<A, B, P> Drop for DriveTrain<A, B, P>
where
    A: OutputPin,
    B: OutputPin,
    P: SetDutyCycle,
{
    fn drop(&mut self) {
        // Brake unless the motors were released on purpose
        if self.released {
            return;
        }
        if let Err(e) = self.apply(MotorCommand::STOP) {
            warn!("Failed to brake motors on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Pin(Rc<Cell<bool>>);

    impl digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.set(true);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Duty(Rc<Cell<u16>>);

    impl pwm::ErrorType for Duty {
        type Error = Infallible;
    }

    impl SetDutyCycle for Duty {
        fn max_duty_cycle(&self) -> u16 {
            1000
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.0.set(duty);
            Ok(())
        }
    }

    struct FaultyPin;

    impl digital::ErrorType for FaultyPin {
        type Error = digital::ErrorKind;
    }

    impl OutputPin for FaultyPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(digital::ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(digital::ErrorKind::Other)
        }
    }

    fn channel() -> (DriveChannel<Pin, Pin, Duty>, Pin, Pin, Duty) {
        let (fwd, rev, duty) = (Pin::default(), Pin::default(), Duty::default());
        let ch = DriveChannel::new(Channel::Left, fwd.clone(), rev.clone(), duty.clone(), 255);
        (ch, fwd, rev, duty)
    }

    #[test]
    fn test_forward_drives_one_pin() {
        let (mut ch, fwd, rev, duty) = channel();
        ch.set_power(255).unwrap();
        assert!(fwd.0.get());
        assert!(!rev.0.get());
        assert_eq!(duty.0.get(), 1000);
    }

    #[test]
    fn test_reverse_scales_duty() {
        let (mut ch, fwd, rev, duty) = channel();
        ch.set_power(-51).unwrap();
        assert!(!fwd.0.get());
        assert!(rev.0.get());
        // 51/255 of 1000
        assert_eq!(duty.0.get(), 200);
    }

    #[test]
    fn test_zero_power_brakes() {
        let (mut ch, fwd, rev, duty) = channel();
        ch.set_power(100).unwrap();
        ch.set_power(0).unwrap();
        assert!(fwd.0.get() && rev.0.get(), "both pins active while braking");
        assert_eq!(duty.0.get(), 1000);
        assert_eq!(ch.power(), 0);
    }

    #[test]
    fn test_coast_releases_bridge() {
        let (mut ch, fwd, rev, duty) = channel();
        ch.set_power(100).unwrap();
        ch.coast().unwrap();
        assert!(!fwd.0.get() && !rev.0.get());
        assert_eq!(duty.0.get(), 0);
    }

    #[test]
    fn test_power_is_clamped() {
        let (mut ch, _, _, duty) = channel();
        ch.set_power(i16::MIN).unwrap();
        assert_eq!(ch.power(), -255);
        assert_eq!(duty.0.get(), 1000);
    }

    #[test]
    fn test_repeated_apply_is_stable() {
        let (mut ch, fwd, rev, duty) = channel();
        for _ in 0..3 {
            ch.set_power(128).unwrap();
            assert!(fwd.0.get());
            assert!(!rev.0.get());
            assert_eq!(duty.0.get(), 501);
        }
    }

    #[test]
    fn test_full_speed_tolerates_any_power() {
        let (fwd, rev) = (Pin::default(), Pin::default());
        let mut ch = DriveChannel::new(Channel::Right, fwd.clone(), rev.clone(), FullSpeed, 255);
        ch.set_power(-10).unwrap();
        assert!(!fwd.0.get());
        assert!(rev.0.get());
    }

    #[test]
    fn test_channel_reports_pin_fault() {
        let mut ch = DriveChannel::new(Channel::Right, FaultyPin, FaultyPin, FullSpeed, 255);
        let err = ch.set_power(10).unwrap_err();
        assert!(matches!(
            err,
            ActuatorError::Pin {
                channel: Channel::Right,
                ..
            }
        ));
    }

    #[test]
    fn test_drive_train_apply_and_drop_brakes() {
        let (left, lf, lr, _) = channel();
        let (rf, rr, rd) = (Pin::default(), Pin::default(), Duty::default());
        let right = DriveChannel::new(Channel::Right, rf.clone(), rr.clone(), rd, 255);
        let mut train = DriveTrain::new(left, right);

        train.apply(MotorCommand::new(255, -255)).unwrap();
        assert_eq!(train.command(), MotorCommand::new(255, -255));
        assert!(lf.0.get() && !lr.0.get());
        assert!(!rf.0.get() && rr.0.get());

        drop(train);
        assert!(lf.0.get() && lr.0.get());
        assert!(rf.0.get() && rr.0.get());
    }

    #[test]
    fn test_released_train_stays_released_on_drop() {
        let (left, lf, lr, _) = channel();
        let (right, rf, rr, _) = channel();
        let mut train = DriveTrain::new(left, right);

        train.apply(MotorCommand::new(100, 100)).unwrap();
        train.coast().unwrap();
        drop(train);
        assert!(!lf.0.get() && !lr.0.get());
        assert!(!rf.0.get() && !rr.0.get());
    }

    #[test]
    fn test_single_channel_leaves_other_untouched() {
        let (left, lf, lr, ld) = channel();
        let (rf, rr, rd) = (Pin::default(), Pin::default(), Duty::default());
        let right = DriveChannel::new(Channel::Right, rf.clone(), rr.clone(), rd.clone(), 255);
        let mut train = DriveTrain::new(left, right);

        train.apply_channel(Channel::Right, -255).unwrap();
        assert!(!rf.0.get() && rr.0.get());
        assert_eq!(rd.0.get(), 1000);
        assert!(!lf.0.get() && !lr.0.get());
        assert_eq!(ld.0.get(), 0);
        assert_eq!(train.command(), MotorCommand::new(0, -255));
    }
}
