// End-to-end control cycles over the simulated hardware

use std::time::{Duration, Instant};

use rgb::RGB8;
use wall_zenoh_runtime::config::{HardwareVariant, RuntimeConfig};
use wall_zenoh_runtime::control::{ControlLoop, LinkHandler, Verdict};
use wall_zenoh_runtime::hw::sim::SimInput;
use wall_zenoh_runtime::hw::{
    Channel, ChannelSignal, Drive, LightOutput, ObstacleSensors, SimHardware, SimProbe,
};
use wall_zenoh_runtime::messages::{MotorCommand, StatusPayload};

type SimLoop =
    ControlLoop<Box<dyn Drive + Send>, ObstacleSensors<SimInput>, Box<dyn LightOutput + Send>>;

fn setup(config: RuntimeConfig) -> (SimLoop, SimProbe, Instant) {
    let t0 = Instant::now();
    let hw = SimHardware::new(&config);
    let probe = hw.probe.clone();
    let control = ControlLoop::new(&config, hw.drive, hw.sensors, hw.lights, t0);
    (control, probe, t0)
}

fn ms(t0: Instant, ms: u64) -> Instant {
    t0 + Duration::from_millis(ms)
}

const BRAKE_PWM: ChannelSignal = ChannelSignal {
    forward: true,
    reverse: true,
    duty: Some(1000),
};

#[test]
fn test_forward_then_watchdog_stop() {
    let config = RuntimeConfig::for_variant(HardwareVariant::Corners);
    let (mut control, probe, t0) = setup(config);

    control.on_command(&[1]);
    let report = control.cycle(t0);
    assert_eq!(report.motors, MotorCommand::new(255, 255));
    let left = probe.channel(Channel::Left);
    assert!(left.forward && !left.reverse);
    assert_eq!(left.duty, Some(1000));

    // No new command: still driving at 500ms, stopped at 600ms
    assert!(!control.cycle(ms(t0, 500)).forced_stop);
    let report = control.cycle(ms(t0, 600));
    assert!(report.forced_stop);
    assert_eq!(report.motors, MotorCommand::STOP);
    assert_eq!(probe.channel(Channel::Left), BRAKE_PWM);
    assert_eq!(probe.channel(Channel::Right), BRAKE_PWM);
}

#[test]
fn test_front_left_obstacle_vetoes_forward() {
    let config = RuntimeConfig::for_variant(HardwareVariant::Corners);
    let (mut control, probe, t0) = setup(config);

    probe.set_obstacles(0b0001); // front-left
    control.on_command(&[1]);
    let report = control.cycle(ms(t0, 20));

    assert!(matches!(report.verdict, Some(Verdict::Vetoed { .. })));
    assert!(!report.verdict.unwrap().accepted());
    assert_eq!(probe.channel(Channel::Left), BRAKE_PWM);
    assert_eq!(probe.channel(Channel::Right), BRAKE_PWM);
}

#[test]
fn test_turn_left_policies_by_variant() {
    let (mut corners, probe, t0) = setup(RuntimeConfig::for_variant(HardwareVariant::Corners));
    probe.set_obstacles(0b0001);
    corners.on_command(&[2]);
    assert!(!corners.cycle(ms(t0, 20)).verdict.unwrap().accepted());

    let (mut front_back, probe, t0) =
        setup(RuntimeConfig::for_variant(HardwareVariant::FrontBack));
    front_back.on_command(&[2]);
    let report = front_back.cycle(ms(t0, 20));
    assert_eq!(report.motors, MotorCommand::new(-255, 255));

    // No PWM on this revision: direction pins only
    assert_eq!(
        probe.channel(Channel::Left),
        ChannelSignal {
            forward: false,
            reverse: true,
            duty: None
        }
    );
    assert_eq!(
        probe.channel(Channel::Right),
        ChannelSignal {
            forward: true,
            reverse: false,
            duty: None
        }
    );
}

#[test]
fn test_status_payload_after_period() {
    let config = RuntimeConfig::for_variant(HardwareVariant::FrontBack);
    let (mut control, probe, t0) = setup(config);

    control.on_connect();
    assert!(control.cycle(t0).status.is_some());

    probe.set_obstacles(0b01); // front blocked, back clear
    assert_eq!(control.cycle(ms(t0, 1000)).status, None);
    let status = control.cycle(ms(t0, 2000)).status.unwrap();
    assert_eq!(status, StatusPayload(0b01));
    assert_eq!(status.bits() & 1, 1);
    assert_eq!(status.bits() >> 1 & 1, 0);
}

#[test]
fn test_invalid_byte_changes_nothing() {
    let config = RuntimeConfig::for_variant(HardwareVariant::Corners);
    let (mut control, probe, t0) = setup(config);

    control.on_command(&[4]);
    control.cycle(ms(t0, 20));
    let before = (probe.channel(Channel::Left), probe.channel(Channel::Right));

    control.on_command(&[99]);
    let report = control.cycle(ms(t0, 40));
    assert_eq!(report.verdict, Some(Verdict::Invalid { byte: 99 }));
    assert_eq!(report.motors, MotorCommand::new(-255, -255));
    assert_eq!(
        (probe.channel(Channel::Left), probe.channel(Channel::Right)),
        before
    );
}

#[test]
fn test_repeated_command_is_idempotent() {
    let config = RuntimeConfig::for_variant(HardwareVariant::Corners);
    let (mut control, probe, t0) = setup(config);

    let mut signals = Vec::new();
    for i in 0..3 {
        control.on_command(&[3]);
        control.cycle(ms(t0, 20 * i));
        signals.push((probe.channel(Channel::Left), probe.channel(Channel::Right)));
    }
    assert!(signals.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_lighting_variants() {
    let (mut pair, probe, t0) = setup(RuntimeConfig::for_variant(HardwareVariant::FrontBack));
    pair.on_lighting_command(&[255, 255, 0]);
    pair.cycle(t0);
    assert_eq!(
        probe.fixture_colors(),
        Some([RGB8::new(255, 255, 0), RGB8::new(0, 0, 255)])
    );

    let (mut strip, probe, t0) = setup(RuntimeConfig::for_variant(HardwareVariant::Corners));
    strip.on_lighting_command(&[0, 128, 0]);
    strip.cycle(t0);
    assert_eq!(probe.strip_frame(), Some(vec![RGB8::new(0, 128, 0); 8]));
}

#[test]
fn test_shutdown_releases_motors() {
    let config = RuntimeConfig::for_variant(HardwareVariant::Corners);
    let (mut control, probe, t0) = setup(config);
    control.on_command(&[1]);
    control.cycle(t0);

    control.shutdown();
    assert_eq!(control.motors(), MotorCommand::STOP);
    assert_eq!(
        probe.channel(Channel::Left),
        ChannelSignal {
            forward: false,
            reverse: false,
            duty: Some(0)
        }
    );
}
