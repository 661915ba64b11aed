//! Peripheral adapters for the `nivel-core` collaborator traits.
//!
//! | trait                       | adapter          | peripheral            |
//! |-----------------------------|------------------|-----------------------|
//! | `AnalogInput`               | [`LevelAdc`]     | ADC1 oneshot          |
//! | `SetDutyCycle`              | [`LedcBuzzer`]   | LEDC low-speed channel|
//! | `PixelStrip`                | [`LedMatrix`]    | WS2812 over RMT       |
//! | `StatusDisplay`             | [`OledDisplay`]  | SSD1306 over I2C      |
//!
//! The relay needs no adapter: `esp_hal::gpio::Output` already implements
//! `OutputPin`.

use core::fmt::Debug;

use embedded_graphics::Pixel;
use embedded_graphics::pixelcolor::{BinaryColor, RgbColor};
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Size};
use embedded_hal::pwm::{self, ErrorType, SetDutyCycle};
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcChannel, AdcPin};
use esp_hal::ledc::LowSpeed;
use esp_hal::ledc::channel::{self as ledc_channel, ChannelIFace as _};
use esp_hal::peripherals::ADC1;
use log::{error, warn};
use nivel_core::app_state::AppError;
use nivel_core::feedback::LedFrame;
use nivel_core::feedback::display::StatusDisplay;
use nivel_core::feedback::led_bar::PixelStrip;
use nivel_core::sensors::AnalogInput;
use smart_leds::{RGB8, SmartLedsWrite};
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};

/// The level probe on a single ADC1 pin.
///
/// The board wires exactly one analog input, so the channel number is only
/// logged.
pub struct LevelAdc<'d, PIN> {
    adc: Adc<'d, ADC1<'d>, Blocking>,
    pin: AdcPin<PIN, ADC1<'d>>,
}

impl<'d, PIN: AdcChannel> LevelAdc<'d, PIN> {
    pub fn new(adc: Adc<'d, ADC1<'d>, Blocking>, pin: AdcPin<PIN, ADC1<'d>>) -> Self {
        Self { adc, pin }
    }
}

impl<PIN: AdcChannel> AnalogInput for LevelAdc<'_, PIN> {
    fn read(&mut self, channel: u8) -> u16 {
        loop {
            match self.adc.read_oneshot(&mut self.pin) {
                Ok(raw) => return raw,
                Err(nb::Error::WouldBlock) => continue,
                Err(nb::Error::Other(_)) => {
                    warn!("ADC read on channel {} failed, reporting empty tank", channel);
                    return 0;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct BuzzerError(ledc_channel::Error);

impl pwm::Error for BuzzerError {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// Buzzer on a low-speed LEDC channel. Duty is expressed in whole percent.
pub struct LedcBuzzer {
    channel: &'static ledc_channel::Channel<'static, LowSpeed>,
}

impl LedcBuzzer {
    pub fn new(channel: &'static ledc_channel::Channel<'static, LowSpeed>) -> Self {
        Self { channel }
    }
}

impl ErrorType for LedcBuzzer {
    type Error = BuzzerError;
}

impl SetDutyCycle for LedcBuzzer {
    fn max_duty_cycle(&self) -> u16 {
        100
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let pct = duty.min(100) as u8;
        self.channel.set_duty(pct).map_err(BuzzerError)
    }
}

/// The 5x5 WS2812 matrix, driven through any `smart-leds` writer.
pub struct LedMatrix<W> {
    writer: W,
}

impl<W> LedMatrix<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W> PixelStrip for LedMatrix<W>
where
    W: SmartLedsWrite<Color = RGB8>,
    W::Error: Debug,
{
    type Error = W::Error;

    fn write_frame(&mut self, frame: &LedFrame) -> Result<(), Self::Error> {
        self.writer
            .write(frame.iter().map(|c| RGB8::new(c.r(), c.g(), c.b())))
    }
}

type Oled<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// SSD1306 in buffered mode. Drawing goes to RAM; `flush` pushes it out.
pub struct OledDisplay<I2C> {
    inner: Oled<I2C>,
}

impl<I2C: embedded_hal::i2c::I2c> OledDisplay<I2C> {
    pub fn new(i2c: I2C) -> Result<Self, AppError> {
        let interface = I2CDisplayInterface::new(i2c);
        let mut inner = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        inner.init().map_err(|e| {
            error!("OLED init failed: {:?}", e);
            AppError::Display
        })?;
        Ok(Self { inner })
    }
}

impl<I2C: embedded_hal::i2c::I2c> OriginDimensions for OledDisplay<I2C> {
    fn size(&self) -> Size {
        self.inner.size()
    }
}

impl<I2C: embedded_hal::i2c::I2c> DrawTarget for OledDisplay<I2C> {
    type Color = BinaryColor;
    type Error = <Oled<I2C> as DrawTarget>::Error;

    fn draw_iter<P>(&mut self, pixels: P) -> Result<(), Self::Error>
    where
        P: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.inner.draw_iter(pixels)
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.inner.clear(color)
    }
}

impl<I2C: embedded_hal::i2c::I2c> StatusDisplay for OledDisplay<I2C> {
    fn flush(&mut self) -> Result<(), Self::Error> {
        self.inner.flush()
    }
}
