//! Application-wide state and error types for nivel
//!
//! [`AppState`] is the configuration store: the thresholds written by the
//! configuration service, the latched pump state and the reading of the
//! current tick. It is owned by the main cycle and lent by reference to
//! whoever needs it during a tick; nothing here is a global.

use heapless::String;
use log::info;
use thiserror_no_std::Error;

use crate::config::ThresholdConfig;
use crate::pump::PumpState;
use crate::sensors::LevelReading;

/// Shared controller state.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppState {
    pub thresholds: ThresholdConfig,
    pub pump: PumpState,
    pub reading: LevelReading,
}

impl AppState {
    /// Fresh boot state: default thresholds, pump released, zero reading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the default thresholds. The pump state stays latched.
    pub fn reset_thresholds(&mut self) {
        self.thresholds = ThresholdConfig::default();
        info!(
            "Thresholds reset to defaults (min={}, max={})",
            self.thresholds.min_percent, self.thresholds.max_percent
        );
    }

    /// Overwrite both thresholds as received, without validation.
    pub fn set_thresholds(&mut self, thresholds: ThresholdConfig) {
        self.thresholds = thresholds;
        info!(
            "Thresholds updated (min={}, max={})",
            thresholds.min_percent, thresholds.max_percent
        );
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network init failed: {0}")]
    NetworkInit(String<64>),
    #[error("Display error")]
    Display,
    #[error("Relay output error")]
    Relay,
    #[error("LED strip error")]
    LedStrip,
    #[error("Buzzer error")]
    Buzzer,
}

impl AppError {
    /// Build a [`AppError::NetworkInit`], truncating the message to fit.
    pub fn network_init(message: &str) -> Self {
        let mut text = String::new();
        for ch in message.chars() {
            if text.push(ch).is_err() {
                break;
            }
        }
        Self::NetworkInit(text)
    }
}
