//! Out-of-range alarm.
//!
//! While the level is outside `[min, max]` the buzzer beeps on a four-tick
//! pattern: two ticks on, two ticks off. Inside the band it is silent.

use embedded_hal::pwm::SetDutyCycle;

use crate::config::{BUZZER_ON_DUTY_PERCENT, BUZZER_PERIOD_TICKS, ThresholdConfig};

/// Whether the buzzer sounds on the tick with the given phase.
pub fn alarm_sounding(percent: f32, config: &ThresholdConfig, tick_phase: u8) -> bool {
    !config.contains(percent) && tick_phase % BUZZER_PERIOD_TICKS < BUZZER_PERIOD_TICKS / 2
}

/// PWM buzzer driven once per tick.
pub struct AlarmBuzzer<P> {
    pwm: P,
    sounding: bool,
}

impl<P: SetDutyCycle> AlarmBuzzer<P> {
    pub fn new(pwm: P) -> Self {
        Self {
            pwm,
            sounding: false,
        }
    }

    /// Apply this tick's duty. The duty is rewritten every tick so a failed
    /// write is corrected on the next one.
    pub fn update(
        &mut self,
        percent: f32,
        config: &ThresholdConfig,
        tick_phase: u8,
    ) -> Result<bool, P::Error> {
        let sounding = alarm_sounding(percent, config, tick_phase);
        if sounding {
            self.pwm.set_duty_cycle_percent(BUZZER_ON_DUTY_PERCENT)?;
        } else {
            self.pwm.set_duty_cycle_fully_off()?;
        }
        self.sounding = sounding;
        Ok(sounding)
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding
    }

    pub fn pwm_mut(&mut self) -> &mut P {
        &mut self.pwm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePwm;

    #[test]
    fn test_silent_inside_band() {
        let config = ThresholdConfig::default();
        for phase in 0..8 {
            assert!(!alarm_sounding(50.0, &config, phase));
            assert!(!alarm_sounding(30.0, &config, phase), "bounds are inside");
            assert!(!alarm_sounding(70.0, &config, phase), "bounds are inside");
        }
    }

    #[test]
    fn test_pattern_outside_band() {
        let config = ThresholdConfig::default();
        let pattern: [bool; 8] = core::array::from_fn(|t| alarm_sounding(10.0, &config, t as u8));
        assert_eq!(pattern, [true, true, false, false, true, true, false, false]);
    }

    #[test]
    fn test_pwm_duty_follows_pattern() {
        let config = ThresholdConfig::default();
        let mut buzzer = AlarmBuzzer::new(FakePwm::new());

        let max = buzzer.pwm_mut().max;
        assert!(buzzer.update(90.0, &config, 0).unwrap());
        assert_eq!(buzzer.pwm_mut().duty, max / 2);

        assert!(!buzzer.update(90.0, &config, 2).unwrap());
        assert_eq!(buzzer.pwm_mut().duty, 0, "off phase is fully silent");

        assert!(!buzzer.update(50.0, &config, 0).unwrap());
        assert_eq!(buzzer.pwm_mut().duty, 0);
        assert!(!buzzer.is_sounding());
    }
}
