//! Compile-time configuration and process-wide defaults.
//!
//! Nothing here is read at runtime: thresholds boot to their defaults and
//! return to them on a reset event, and network credentials are baked into
//! the firmware image by its build script.

/// Pump engages below this level (percent) after boot or a reset.
pub const DEFAULT_MIN_PERCENT: f32 = 30.0;

/// Pump releases above this level (percent) after boot or a reset.
pub const DEFAULT_MAX_PERCENT: f32 = 70.0;

/// Main cycle cadence.
pub const TICK_PERIOD_MS: u32 = 500;

/// Primary button edges closer than this to the last accepted edge are dropped.
pub const DEBOUNCE_WINDOW_MS: u32 = 200;

/// Full-scale value of the 12-bit level ADC.
pub const ADC_MAX_RAW: u16 = 4095;

/// Analog channel wired to the level sensor.
pub const LEVEL_SENSOR_CHANNEL: u8 = 2;

/// Port of the configuration service.
pub const HTTP_PORT: u16 = 80;

/// Upper bound for network bring-up (association + DHCP lease).
pub const NETWORK_INIT_TIMEOUT_MS: u32 = 10_000;

/// How long the assigned address stays on screen before the first tick.
pub const IP_SPLASH_MS: u32 = 2_000;

/// Buzzer duty while the alarm is sounding.
pub const BUZZER_ON_DUTY_PERCENT: u8 = 50;

/// Alarm pattern period in ticks; the first half of the period sounds.
pub const BUZZER_PERIOD_TICKS: u8 = 4;

/// Pump thresholds shared by the actuator, the alarm and the configuration
/// service.
///
/// `min_percent < max_percent` is the intended invariant but it is not
/// enforced on write: the configuration service stores whatever the client
/// sends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdConfig {
    pub min_percent: f32,
    pub max_percent: f32,
}

impl ThresholdConfig {
    pub const fn new(min_percent: f32, max_percent: f32) -> Self {
        Self {
            min_percent,
            max_percent,
        }
    }

    /// Whether `percent` lies inside the inclusive dead band.
    pub fn contains(&self, percent: f32) -> bool {
        percent >= self.min_percent && percent <= self.max_percent
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PERCENT, DEFAULT_MAX_PERCENT)
    }
}

/// Station credentials handed to the radio at boot.
#[derive(Debug, Default, Clone, Copy)]
pub struct WifiCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}
