// Keyboard teleop: WASD move, Space stop, 1-4 colors, Q quit
// Holds a liveliness token so the robot sees a connected peer, re-sends the held
// direction every 200ms and prints obstacle notifications. Turns open with a
// single forward byte, then repeat the turn, like the browser remote.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use wall_zenoh_runtime::config::{TOPIC_CMD_DIRECTION, TOPIC_CMD_RGB, TOPIC_STATUS};
use wall_zenoh_runtime::messages::MovementIntent;

const RESEND_INTERVAL: Duration = Duration::from_millis(200);
const RELEASE_TIMEOUT_MS: u64 = 150; // Terminal key repeat keeps the direction held
const COLORS: [[u8; 3]; 4] = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [0, 0, 0]];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let _token = session.liveliness().declare_token("wall/peer/teleop").await?;

    info!("Controls: WASD=move, Space=stop, 1-4=color, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&session).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    session: &zenoh::Session,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let direction = session.declare_publisher(TOPIC_CMD_DIRECTION).await?;
    let rgb = session.declare_publisher(TOPIC_CMD_RGB).await?;
    let status = session.declare_subscriber(TOPIC_STATUS).await?;

    let mut held: Option<MovementIntent> = None;
    let mut last_input = Instant::now();
    let mut last_send = Instant::now();

    loop {
        // Poll for key with 20ms timeout
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                let intent = match code {
                    KeyCode::Char('w') if pressed => Some(MovementIntent::Forward),
                    KeyCode::Char('s') if pressed => Some(MovementIntent::Backward),
                    KeyCode::Char('a') if pressed => Some(MovementIntent::TurnLeft),
                    KeyCode::Char('d') if pressed => Some(MovementIntent::TurnRight),
                    KeyCode::Char(' ') if pressed => {
                        held = None;
                        direction.put(vec![MovementIntent::Stop as u8]).await?;
                        None
                    }
                    KeyCode::Char(c @ '1'..='4') if pressed => {
                        let color = COLORS[(c as u8 - b'1') as usize];
                        rgb.put(color.to_vec()).await?;
                        info!("Color: {:?}", color);
                        None
                    }
                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,
                    _ => None,
                };

                if let Some(intent) = intent {
                    if held != Some(intent) {
                        let first = opening_intent(intent);
                        direction.put(vec![first as u8]).await?;
                        last_send = Instant::now();
                    }
                    held = Some(intent);
                    last_input = Instant::now();
                }
            }
        }

        // Key released: stop sending and let the robot's watchdog take over
        if held.is_some() && last_input.elapsed() > Duration::from_millis(RELEASE_TIMEOUT_MS) {
            held = None;
            direction.put(vec![MovementIntent::Stop as u8]).await?;
        }

        if let Some(intent) = held {
            if last_send.elapsed() >= RESEND_INTERVAL {
                direction.put(vec![intent as u8]).await?;
                last_send = Instant::now();
            }
        }

        while let Ok(Some(sample)) = status.try_recv() {
            match sample.payload().to_bytes().first() {
                Some(&flags) => print_status(flags),
                None => warn!("Empty status notification"),
            }
        }
    }

    direction.put(vec![MovementIntent::Stop as u8]).await?;
    Ok(())
}

/// First byte sent when a direction key goes down
fn opening_intent(intent: MovementIntent) -> MovementIntent {
    match intent {
        MovementIntent::TurnLeft | MovementIntent::TurnRight => MovementIntent::Forward,
        other => other,
    }
}

fn print_status(flags: u8) {
    if flags == 0 {
        info!("Path clear");
        return;
    }
    // Bit layout depends on the robot revision; show the raw mask too
    info!("Blocked: {:#06b}", flags);
}
