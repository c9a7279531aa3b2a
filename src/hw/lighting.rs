// Lighting outputs: complementary RGB fixtures or an addressable strip

use std::f32::consts::PI;
use std::time::Duration;

use embedded_hal::pwm::{self, Error as _, SetDutyCycle};
use rgb::RGB8;

/// Time between color cycle steps
pub const EFFECT_STEP: Duration = Duration::from_millis(40);

/// Phase advance per color cycle step
const CYCLE_PHASE_STEP: f32 = PI * 0.01;
/// Last step index of a sweep; step `CYCLE_STEPS` lands exactly on pi
const CYCLE_STEPS: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LightingError {
    #[error("Fixture duty output fault: {0:?}")]
    Duty(pwm::ErrorKind),

    #[error("Pixel write failed")]
    WriteFailed,
}

/// Anything that can show a single color
pub trait LightOutput {
    fn show(&mut self, color: RGB8) -> Result<(), LightingError>;
}

impl<T: LightOutput + ?Sized> LightOutput for Box<T> {
    fn show(&mut self, color: RGB8) -> Result<(), LightingError> {
        (**self).show(color)
    }
}

/// Photometric complement of a color
pub fn complement(color: RGB8) -> RGB8 {
    RGB8::new(!color.r, !color.g, !color.b)
}

/// One RGB fixture on three PWM outputs
pub struct RgbFixture<P> {
    red: P,
    green: P,
    blue: P,
}

impl<P: SetDutyCycle> RgbFixture<P> {
    pub fn new(red: P, green: P, blue: P) -> Self {
        Self { red, green, blue }
    }

    pub fn set(&mut self, color: RGB8) -> Result<(), LightingError> {
        for (output, value) in [
            (&mut self.red, color.r),
            (&mut self.green, color.g),
            (&mut self.blue, color.b),
        ] {
            output
                .set_duty_cycle_fraction(value as u16, u8::MAX as u16)
                .map_err(|e| LightingError::Duty(e.kind()))?;
        }
        Ok(())
    }
}

/// Two fixtures; the second always glows in the complement of the first
pub struct ComplementaryPair<P> {
    primary: RgbFixture<P>,
    secondary: RgbFixture<P>,
}

impl<P: SetDutyCycle> ComplementaryPair<P> {
    pub fn new(primary: RgbFixture<P>, secondary: RgbFixture<P>) -> Self {
        Self { primary, secondary }
    }
}

impl<P: SetDutyCycle> LightOutput for ComplementaryPair<P> {
    fn show(&mut self, color: RGB8) -> Result<(), LightingError> {
        self.primary.set(color)?;
        self.secondary.set(complement(color))
    }
}

/// Low-level pixel sink for an addressable LED run
pub trait PixelWriter {
    fn write(&mut self, pixels: &[RGB8]) -> Result<(), LightingError>;
}

/// Addressable strip showing one uniform color
pub struct LedStrip<W> {
    writer: W,
    pixels: Vec<RGB8>,
}

impl<W: PixelWriter> LedStrip<W> {
    pub fn new(writer: W, len: usize) -> Self {
        Self {
            writer,
            pixels: vec![RGB8::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

impl<W: PixelWriter> LightOutput for LedStrip<W> {
    fn show(&mut self, color: RGB8) -> Result<(), LightingError> {
        self.pixels.fill(color);
        self.writer.write(&self.pixels)
    }
}

/// Slow red -> green -> blue sweep, restarting after a half turn of phase
#[derive(Debug, Clone, Default)]
pub struct ColorCycle {
    step: u16,
}

impl ColorCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color at the current phase, then advance
    pub fn step(&mut self) -> RGB8 {
        let color = Self::color_at(f32::from(self.step) * CYCLE_PHASE_STEP);
        self.step = if self.step >= CYCLE_STEPS {
            0
        } else {
            self.step + 1
        };
        color
    }

    fn color_at(phase: f32) -> RGB8 {
        let channel = |offset: f32| ((phase - offset).cos() * 255.0).max(0.0).floor() as u8;
        RGB8::new(channel(0.0), channel(PI / 2.0), channel(PI))
    }
}
