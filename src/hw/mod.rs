// Hardware layer for the Wall base
//
// Provides:
// - H-bridge drive channels (drive, brake, coast) over embedded-hal pins
// - Proximity sensor sampling with polarity correction
// - Complementary RGB fixtures and addressable LED strip output
// - A simulated backend for host runs and tests

mod driver;
pub mod lighting;
mod sensors;
pub mod sim;

pub use driver::{ActuatorError, Channel, Drive, DriveChannel, DriveTrain, FullSpeed};
pub use lighting::{ColorCycle, ComplementaryPair, LedStrip, LightOutput, LightingError, PixelWriter, RgbFixture};
pub use sensors::{ObstacleSensors, ObstacleSource};
pub use sim::{ChannelSignal, SimHardware, SimProbe};
