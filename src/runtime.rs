// Zenoh runtime: fixed-rate control loop with watchdog
// Note: the watchdog forces a stop if the controller goes quiet, e.g. the teleop
// crashed or the link dropped while the robot was moving

use std::time::Instant;

use tokio::time::{MissedTickBehavior, interval}; // tokio is an async runtime for Rust
use tracing::{debug, info, warn};
use zenoh::sample::SampleKind;

// local imports
use crate::config::RuntimeConfig;
use crate::control::{ControlLoop, LinkHandler, build_payload};
use crate::hw::SimHardware;
use crate::messages::{MotorCommand, RuntimeHealth};

pub async fn run(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let topics = &config.topics;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_direction = session.declare_subscriber(topics.direction.as_str()).await?;
    let sub_rgb = session.declare_subscriber(topics.rgb.as_str()).await?;
    let sub_sim = session
        .declare_subscriber(topics.sim_obstacles.as_str())
        .await?;
    // Controllers announce themselves with a liveliness token; history replays
    // tokens that already exist
    let sub_peers = session
        .liveliness()
        .declare_subscriber(topics.peers.as_str())
        .history(true)
        .await?;
    let status_queries = session.declare_queryable(topics.status.as_str()).await?;
    let pub_status = session.declare_publisher(topics.status.as_str()).await?;
    let pub_health = session.declare_publisher(topics.health.as_str()).await?;
    let pub_drive = session.declare_publisher(topics.drive.as_str()).await?;

    let hardware = SimHardware::new(&config);
    let probe = hardware.probe.clone();
    let mut control = ControlLoop::new(
        &config,
        hardware.drive,
        hardware.sensors,
        hardware.lights,
        Instant::now(),
    );

    let mut tick = interval(config.loop_period());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Runtime started: {}Hz loop, {:?} watchdog timeout, {}ms status period, {:?} hardware",
        config.loop_hz,
        control.watchdog().timeout(),
        config.status_period_ms,
        config.variant
    );
    info!("Subscribed to: {}, {}", topics.direction, topics.rgb);
    info!(
        "Publishing to: {}, {}, {}",
        topics.status, topics.health, topics.drive
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_health: Option<RuntimeHealth> = None;
    let mut last_motors: Option<MotorCommand> = None;

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }

        // 1. Drain link events (non-blocking); mailboxes keep the latest command
        while let Ok(Some(sample)) = sub_peers.try_recv() {
            match sample.kind() {
                SampleKind::Put => {
                    debug!("Peer token {}", sample.key_expr());
                    control.on_connect();
                }
                SampleKind::Delete => {
                    debug!("Peer token {} gone", sample.key_expr());
                    control.on_disconnect();
                }
            }
        }
        while let Ok(Some(sample)) = sub_direction.try_recv() {
            control.on_command(&sample.payload().to_bytes());
        }
        while let Ok(Some(sample)) = sub_rgb.try_recv() {
            control.on_lighting_command(&sample.payload().to_bytes());
        }
        while let Ok(Some(sample)) = sub_sim.try_recv() {
            match sample.payload().to_bytes().first() {
                Some(&mask) => probe.set_obstacles(mask),
                None => warn!("Empty simulated obstacle payload"),
            }
        }

        // 2. Run the control cycle (sensors, arbiter, watchdog, status, lighting)
        let report = control.cycle(Instant::now());

        // 3. Publish status notification
        if let Some(status) = report.status {
            debug!("Status {:#04b}", status.bits());
            if let Err(e) = pub_status.put(status.to_bytes()).await {
                warn!("Failed to publish status: {}", e);
            }
        }

        // 4. Answer status reads with the current snapshot
        while let Ok(Some(query)) = status_queries.try_recv() {
            let payload = build_payload(control.obstacles());
            if let Err(e) = query
                .reply(topics.status.as_str(), payload.to_bytes())
                .await
            {
                warn!("Failed to answer status query: {}", e);
            }
        }

        // 5. Publish applied drive command and health on change
        if last_motors != Some(report.motors) {
            let drive_json = serde_json::to_string(&report.motors)?;
            if let Err(e) = pub_drive.put(drive_json).await {
                warn!("Failed to publish drive command: {}", e);
            }
            last_motors = Some(report.motors);
        }
        if last_health != Some(report.health) {
            let health_json = serde_json::to_string(&report.health)?;
            if let Err(e) = pub_health.put(health_json).await {
                warn!("Failed to publish health: {}", e);
            }
            last_health = Some(report.health);
        }
    }

    control.shutdown();
    Ok(())
}
