//! 5x5 LED bar-graph.
//!
//! The level maps to a lit-cell count and a color through a fixed band
//! table. The table is not smooth: the color flips from red to blue between
//! 30% and 31% and back to red above 70%, and the cell count jumps in steps
//! of five.
//!
//! | percent | lit cells | color |
//! |---------|-----------|-------|
//! | < 20    | 0         | -     |
//! | 20..=30 | 5         | red   |
//! | 31..=39 | 5         | blue  |
//! | 40..=59 | 10        | blue  |
//! | 60..=70 | 15        | blue  |
//! | 71..=79 | 15        | red   |
//! | 80..=99 | 20        | red   |
//! | >= 100  | 25        | red   |

use core::fmt::Debug;

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

pub const LED_COUNT: usize = 25;

/// Channel intensity for lit cells.
const LED_INTENSITY: u8 = 32;

pub type LedFrame = [Rgb888; LED_COUNT];

/// LED strip collaborator.
pub trait PixelStrip {
    type Error: Debug;

    fn write_frame(&mut self, frame: &LedFrame) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarColor {
    Red,
    Blue,
}

impl BarColor {
    pub const fn rgb(self) -> Rgb888 {
        match self {
            Self::Red => Rgb888::new(LED_INTENSITY, 0, 0),
            Self::Blue => Rgb888::new(0, 0, LED_INTENSITY),
        }
    }
}

/// One row of the band table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedBand {
    pub lit: usize,
    pub color: Option<BarColor>,
}

impl LedBand {
    const fn new(lit: usize, color: Option<BarColor>) -> Self {
        Self { lit, color }
    }
}

/// Look up the band for `percent`.
///
/// Fractional levels between two integer rows fall into the upper row
/// (30.5 is blue, 70.5 is red). NaN shows nothing.
pub fn band_for(percent: f32) -> LedBand {
    use BarColor::{Blue, Red};

    if percent >= 100.0 {
        LedBand::new(25, Some(Red))
    } else if percent >= 80.0 {
        LedBand::new(20, Some(Red))
    } else if percent > 70.0 {
        LedBand::new(15, Some(Red))
    } else if percent >= 60.0 {
        LedBand::new(15, Some(Blue))
    } else if percent >= 40.0 {
        LedBand::new(10, Some(Blue))
    } else if percent > 30.0 {
        LedBand::new(5, Some(Blue))
    } else if percent >= 20.0 {
        LedBand::new(5, Some(Red))
    } else {
        LedBand::new(0, None)
    }
}

/// Build the strip frame: the first `lit` cells in the band color, the rest dark.
pub fn bar_frame(percent: f32) -> LedFrame {
    let band = band_for(percent);
    let mut frame = [Rgb888::BLACK; LED_COUNT];
    if let Some(color) = band.color {
        for cell in frame.iter_mut().take(band.lit) {
            *cell = color.rgb();
        }
    }
    frame
}
