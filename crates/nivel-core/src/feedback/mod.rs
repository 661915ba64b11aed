//! Per-tick status feedback: display, LED bar-graph and alarm buzzer.

pub mod buzzer;
pub mod display;
pub mod led_bar;

use core::fmt::Debug;

use embedded_hal::pwm::SetDutyCycle;
use log::{debug, warn};

use crate::app_state::{AppError, AppState};
use buzzer::AlarmBuzzer;
use display::StatusDisplay;
use led_bar::PixelStrip;

pub use buzzer::alarm_sounding;
pub use display::{draw_message, draw_status};
pub use led_bar::{LED_COUNT, LedFrame, band_for, bar_frame};

/// Owns the three feedback outputs.
pub struct FeedbackRenderer<D, S, B> {
    display: D,
    strip: S,
    buzzer: AlarmBuzzer<B>,
}

impl<D, S, B> FeedbackRenderer<D, S, B>
where
    D: StatusDisplay,
    D::Error: Debug,
    S: PixelStrip,
    B: SetDutyCycle,
{
    pub fn new(display: D, strip: S, buzzer: B) -> Self {
        Self {
            display,
            strip,
            buzzer: AlarmBuzzer::new(buzzer),
        }
    }

    /// Drive all outputs from the current state.
    ///
    /// Outputs are independent: a failing display does not keep the LEDs or
    /// the buzzer from updating. The first error is returned after all three
    /// have been attempted.
    pub fn render(&mut self, state: &AppState, tick_phase: u8) -> Result<(), AppError> {
        let reading = state.reading;
        let mut first_error = None;

        if let Err(e) = draw_status(&mut self.display, &reading, state.pump) {
            warn!("Display update failed: {:?}", e);
            first_error.get_or_insert(AppError::Display);
        }

        if let Err(e) = self.strip.write_frame(&bar_frame(reading.percent)) {
            warn!("LED strip update failed: {:?}", e);
            first_error.get_or_insert(AppError::LedStrip);
        }

        match self.buzzer.update(reading.percent, &state.thresholds, tick_phase) {
            Ok(sounding) => debug!("Buzzer sounding={} phase={}", sounding, tick_phase),
            Err(e) => {
                warn!("Buzzer update failed: {:?}", e);
                first_error.get_or_insert(AppError::Buzzer);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Replace the status screen with a message (boot and failure screens).
    pub fn show_message(&mut self, lines: &[&str]) -> Result<(), AppError> {
        draw_message(&mut self.display, lines).map_err(|e| {
            warn!("Display message failed: {:?}", e);
            AppError::Display
        })
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn strip(&self) -> &S {
        &self.strip
    }

    pub fn buzzer(&self) -> &AlarmBuzzer<B> {
        &self.buzzer
    }

    pub fn buzzer_mut(&mut self) -> &mut AlarmBuzzer<B> {
        &mut self.buzzer
    }
}
