// Proximity sensor sampling
//
// Sensors are plain digital inputs read once per control cycle. There is no
// debouncing: whatever level the pin shows right now is the obstacle state.

use embedded_hal::digital::{Error as _, InputPin};
use tracing::{info, warn};

use crate::messages::{ObstacleState, SensorLayout, Zone};

/// Source of one obstacle snapshot per cycle
pub trait ObstacleSource {
    fn sample(&mut self) -> ObstacleState;
}

struct ProximitySensor<P> {
    zone: Zone,
    pin: P,
    faulted: bool,
}

/// Digital proximity sensors with polarity correction
pub struct ObstacleSensors<P> {
    layout: SensorLayout,
    active_low: bool,
    sensors: Vec<ProximitySensor<P>>,
}

impl<P: InputPin> ObstacleSensors<P> {
    /// `active_low`: the pin reads low when something is in range
    pub fn new(layout: SensorLayout, active_low: bool) -> Self {
        Self {
            layout,
            active_low,
            sensors: Vec::with_capacity(layout.zones().len()),
        }
    }

    /// Attach the input watching `zone`. Zones foreign to the layout are rejected.
    pub fn attach(&mut self, zone: Zone, pin: P) -> bool {
        if zone.layout() != self.layout {
            warn!("Sensor zone {:?} does not exist on {:?} hardware", zone, self.layout);
            return false;
        }
        self.sensors.push(ProximitySensor {
            zone,
            pin,
            faulted: false,
        });
        true
    }

    pub fn layout(&self) -> SensorLayout {
        self.layout
    }
}

impl<P: InputPin> ObstacleSource for ObstacleSensors<P> {
    fn sample(&mut self) -> ObstacleState {
        let mut state = ObstacleState::clear(self.layout);

        for sensor in &mut self.sensors {
            let blocked = match sensor.pin.is_high() {
                Ok(high) => {
                    if sensor.faulted {
                        info!("Sensor {:?} readable again", sensor.zone);
                        sensor.faulted = false;
                    }
                    high != self.active_low
                }
                Err(e) => {
                    // An unreadable sensor counts as blocked
                    if !sensor.faulted {
                        warn!("Sensor {:?} read failed: {:?}", sensor.zone, e.kind());
                        sensor.faulted = true;
                    }
                    true
                }
            };
            state.set(sensor.zone, blocked);
        }

        state
    }
}
