//! RAM framebuffer for the 128x64 monochrome status display.
//!
//! Used wherever there is no panel: host tests, and the simulator, which
//! dumps it as text. Pixel writes only mark the frame dirty when a pixel
//! actually changes, and [`StatusDisplay::flush`] commits the frame.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::convert::Infallible;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PointsIter, Rectangle};
use log::debug;

use crate::feedback::display::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX, StatusDisplay};

const PIXEL_COUNT: usize = DISPLAY_WIDTH_PX as usize * DISPLAY_HEIGHT_PX as usize;

/// Bounding box of pixels that have changed since the last flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl DirtyRect {
    fn expand(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn from_point(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }
}

/// In-memory `DrawTarget<Color = BinaryColor>`.
pub struct FrameBuffer {
    pixels: Vec<BinaryColor>,
    dirty: Option<DirtyRect>,
    /// Region committed by the most recent flush.
    last_flushed: Option<DirtyRect>,
    flush_count: u32,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Allocate a blank (all off) framebuffer.
    pub fn new() -> Self {
        Self {
            pixels: vec![BinaryColor::Off; PIXEL_COUNT],
            dirty: None,
            last_flushed: None,
            flush_count: 0,
        }
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: BinaryColor) {
        let idx = y * DISPLAY_WIDTH_PX as usize + x;
        if self.pixels[idx] != color {
            self.pixels[idx] = color;
            match &mut self.dirty {
                Some(rect) => rect.expand(x, y),
                None => self.dirty = Some(DirtyRect::from_point(x, y)),
            }
        }
    }

    /// Color at `(x, y)`; off-screen coordinates read as off.
    pub fn pixel(&self, x: i32, y: i32) -> BinaryColor {
        if x < 0 || y < 0 || x >= DISPLAY_WIDTH_PX as i32 || y >= DISPLAY_HEIGHT_PX as i32 {
            return BinaryColor::Off;
        }
        self.pixels[y as usize * DISPLAY_WIDTH_PX as usize + x as usize]
    }

    /// Number of lit pixels inside `area`.
    pub fn lit_in(&self, area: &Rectangle) -> usize {
        area.points()
            .filter(|p| self.pixel(p.x, p.y) == BinaryColor::On)
            .count()
    }

    /// Pending (unflushed) changes.
    pub fn dirty(&self) -> Option<DirtyRect> {
        self.dirty
    }

    pub fn last_flushed(&self) -> Option<DirtyRect> {
        self.last_flushed
    }

    pub fn flush_count(&self) -> u32 {
        self.flush_count
    }

    /// Render the frame as text, two pixel rows per line (`#` on, `.` off
    /// for either pixel of the pair).
    pub fn to_ascii(&self) -> String {
        let w = DISPLAY_WIDTH_PX as i32;
        let h = DISPLAY_HEIGHT_PX as i32;
        let mut out = String::with_capacity((w as usize + 1) * (h as usize / 2));
        for y in (0..h).step_by(2) {
            for x in 0..w {
                let on = self.pixel(x, y) == BinaryColor::On
                    || self.pixel(x, y + 1) == BinaryColor::On;
                out.push(if on { '#' } else { '.' });
            }
            out.push('\n');
        }
        out
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = DISPLAY_WIDTH_PX as usize;
        let h = DISPLAY_HEIGHT_PX as usize;

        for Pixel(coord, color) in pixels {
            let x = coord.x;
            let y = coord.y;
            if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h {
                self.set_pixel(x as usize, y as usize, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let w = DISPLAY_WIDTH_PX as usize;
        let h = DISPLAY_HEIGHT_PX as usize;

        let x_start = (area.top_left.x.max(0) as usize).min(w);
        let y_start = (area.top_left.y.max(0) as usize).min(h);
        // End is measured from the unclipped origin.
        let x_end = (i64::from(area.top_left.x) + i64::from(area.size.width)).clamp(0, w as i64) as usize;
        let y_end = (i64::from(area.top_left.y) + i64::from(area.size.height)).clamp(0, h as i64) as usize;

        for y in y_start..y_end {
            for x in x_start..x_end {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let w = DISPLAY_WIDTH_PX as usize;
        let h = DISPLAY_HEIGHT_PX as usize;

        for y in 0..h {
            for x in 0..w {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }
}

impl StatusDisplay for FrameBuffer {
    fn flush(&mut self) -> Result<(), Self::Error> {
        let dirty = self.dirty.take();
        if let Some(rect) = dirty {
            debug!(
                "Flushing {}x{} dirty region at ({}, {})",
                rect.max_x - rect.min_x + 1,
                rect.max_y - rect.min_y + 1,
                rect.min_x,
                rect.min_y
            );
        }
        self.last_flushed = dirty;
        self.flush_count += 1;
        Ok(())
    }
}
