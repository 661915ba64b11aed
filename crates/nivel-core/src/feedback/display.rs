//! Status screen layout for the 128x64 monochrome display.
//!
//! Every tick redraws the whole frame (clear, border, text) and then
//! flushes it, so a refresh never shows half of the previous frame.

use core::fmt::Write;

use embedded_graphics::{
    Drawable as EgDrawable,
    mono_font::{MonoTextStyle, ascii::FONT_6X10},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use heapless::String;

use crate::pump::PumpState;
use crate::sensors::LevelReading;

pub const DISPLAY_WIDTH_PX: u32 = 128;
pub const DISPLAY_HEIGHT_PX: u32 = 64;

/// Text display collaborator: an embedded-graphics target plus a flush that
/// pushes the drawn frame to the panel.
pub trait StatusDisplay: DrawTarget<Color = BinaryColor> {
    fn flush(&mut self) -> Result<(), Self::Error>;
}

const BORDER_ORIGIN: Point = Point::new(3, 3);
const BORDER_SIZE: Size = Size::new(122, 60);

const TITLE_POS: Point = Point::new(8, 6);
const PERCENT_POS: Point = Point::new(8, 22);
const RAW_LABEL_POS: Point = Point::new(8, 41);
const RAW_VALUE_POS: Point = Point::new(40, 41);
const PUMP_POS: Point = Point::new(8, 52);

/// Vertical positions of message lines (boot and failure screens).
const MESSAGE_LINES_Y: [i32; 3] = [6, 22, 38];

const TITLE: &str = "Nivel de Agua:";

fn text_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyle::new(&FONT_6X10, BinaryColor::On)
}

fn draw_text<D: DrawTarget<Color = BinaryColor>>(
    display: &mut D,
    text: &str,
    position: Point,
) -> Result<(), D::Error> {
    EgDrawable::draw(
        &Text::with_baseline(text, position, text_style(), Baseline::Top),
        display,
    )?;
    Ok(())
}

/// Label shown for the pump latch.
pub const fn pump_label(pump: PumpState) -> &'static str {
    if pump.engaged { "Bomba: ON" } else { "Bomba: OFF" }
}

/// Redraw the status screen from scratch and flush it.
pub fn draw_status<D: StatusDisplay>(
    display: &mut D,
    reading: &LevelReading,
    pump: PumpState,
) -> Result<(), D::Error> {
    display.clear(BinaryColor::Off)?;

    Rectangle::new(BORDER_ORIGIN, BORDER_SIZE)
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
        .draw(display)?;

    draw_text(display, TITLE, TITLE_POS)?;

    // Fixed capacity is far above the longest value ("100", "4095").
    let mut value: String<12> = String::new();
    let _ = write!(value, "{:.0}", reading.percent);
    draw_text(display, &value, PERCENT_POS)?;

    draw_text(display, "ADC:", RAW_LABEL_POS)?;
    value.clear();
    let _ = write!(value, "{}", reading.raw);
    draw_text(display, &value, RAW_VALUE_POS)?;

    draw_text(display, pump_label(pump), PUMP_POS)?;

    display.flush()
}

/// Full-screen message of up to three lines (extra lines are dropped).
pub fn draw_message<D: StatusDisplay>(display: &mut D, lines: &[&str]) -> Result<(), D::Error> {
    display.clear(BinaryColor::Off)?;
    for (line, y) in lines.iter().zip(MESSAGE_LINES_Y) {
        draw_text(display, line, Point::new(TITLE_POS.x, y))?;
    }
    display.flush()
}
