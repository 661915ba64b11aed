//! Level sensing.
//!
//! The level probe is an analog voltage read through a 12-bit ADC. There is
//! no filtering: each tick's raw sample goes straight to the actuator and
//! the display. A disconnected probe reads as zero and is indistinguishable
//! from an empty tank.

use log::debug;

use crate::config::{ADC_MAX_RAW, LEVEL_SENSOR_CHANNEL};

/// Analog input collaborator.
pub trait AnalogInput {
    /// Read one conversion from `channel`, in `0..=4095`.
    fn read(&mut self, channel: u8) -> u16;
}

/// One tick's level measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelReading {
    /// Raw ADC counts, clamped to the 12-bit range.
    pub raw: u16,
    /// Fill level in percent of full scale.
    pub percent: f32,
}

impl LevelReading {
    pub fn from_raw(raw: u16) -> Self {
        let raw = raw.min(ADC_MAX_RAW);
        Self {
            raw,
            percent: raw_to_percent(raw),
        }
    }
}

/// Convert raw counts to percent using truncating integer division, so the
/// result is always a whole number.
pub fn raw_to_percent(raw: u16) -> f32 {
    let raw = u32::from(raw.min(ADC_MAX_RAW));
    (raw * 100 / u32::from(ADC_MAX_RAW)) as f32
}

/// Samples the level probe on its fixed channel.
pub struct LevelSampler<A> {
    adc: A,
    channel: u8,
}

impl<A: AnalogInput> LevelSampler<A> {
    pub fn new(adc: A) -> Self {
        Self::with_channel(adc, LEVEL_SENSOR_CHANNEL)
    }

    pub fn with_channel(adc: A, channel: u8) -> Self {
        Self { adc, channel }
    }

    /// Take one reading.
    pub fn sample(&mut self) -> LevelReading {
        let reading = LevelReading::from_raw(self.adc.read(self.channel));
        debug!("Level sample raw={} percent={}", reading.raw, reading.percent);
        reading
    }

    pub fn inner_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAdc;

    #[test]
    fn test_percent_endpoints() {
        assert_eq!(raw_to_percent(0), 0.0);
        assert_eq!(raw_to_percent(4095), 100.0);
    }

    #[test]
    fn test_percent_truncates() {
        // 1023 * 100 / 4095 = 24.98...
        assert_eq!(raw_to_percent(1023), 24.0);
        // 1024 * 100 / 4095 = 25.006...
        assert_eq!(raw_to_percent(1024), 25.0);
        assert_eq!(raw_to_percent(4094), 99.0);
    }

    #[test]
    fn test_out_of_range_raw_is_clamped() {
        let reading = LevelReading::from_raw(u16::MAX);
        assert_eq!(reading.raw, 4095);
        assert_eq!(reading.percent, 100.0);
    }

    #[test]
    fn test_sampler_reads_fixed_channel() {
        let mut sampler = LevelSampler::new(FakeAdc::new(2048));
        let reading = sampler.sample();

        assert_eq!(reading.raw, 2048);
        assert_eq!(reading.percent, 50.0);
        assert_eq!(
            sampler.inner_mut().last_channel,
            Some(LEVEL_SENSOR_CHANNEL),
            "sampler must read the level channel"
        );
    }
}
