//! Hysteresis pump actuator.
//!
//! The pump is a two-state latch driven through an active-low relay:
//! pulling the control line low engages the pump. The latch only moves when
//! the level leaves the dead band, so noise around a threshold never makes
//! the relay chatter.

use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::app_state::AppError;
use crate::config::ThresholdConfig;

/// Latched pump state. Only [`next_pump_state`] decides when it changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpState {
    pub engaged: bool,
}

impl PumpState {
    pub const OFF: Self = Self { engaged: false };
    pub const ON: Self = Self { engaged: true };
}

/// A change of the pump latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpTransition {
    Engaged,
    Released,
}

/// Transition rule: OFF→ON iff `percent < min`, ON→OFF iff `percent > max`,
/// otherwise the prior state is kept.
pub fn next_pump_state(percent: f32, config: &ThresholdConfig, prior: PumpState) -> PumpState {
    if !prior.engaged && percent < config.min_percent {
        PumpState::ON
    } else if prior.engaged && percent > config.max_percent {
        PumpState::OFF
    } else {
        prior
    }
}

/// Relay driver applying [`next_pump_state`] to the latched state.
pub struct PumpActuator<R> {
    relay: R,
}

impl<R: OutputPin> PumpActuator<R> {
    /// Take ownership of the relay line and release the pump.
    pub fn new(mut relay: R) -> Result<Self, AppError> {
        relay.set_high().map_err(|e| {
            error!("Relay release at boot failed: {:?}", e);
            AppError::Relay
        })?;
        Ok(Self { relay })
    }

    /// Evaluate the transition rule and drive the relay if the latch moves.
    ///
    /// The relay is only written on a transition. If the write fails the
    /// latched state is left untouched, so the next tick retries.
    pub fn update(
        &mut self,
        percent: f32,
        config: &ThresholdConfig,
        pump: &mut PumpState,
    ) -> Result<Option<PumpTransition>, AppError> {
        let next = next_pump_state(percent, config, *pump);
        if next == *pump {
            return Ok(None);
        }

        let result = if next.engaged {
            self.relay.set_low()
        } else {
            self.relay.set_high()
        };
        result.map_err(|e| {
            error!("Relay write failed: {:?}", e);
            AppError::Relay
        })?;

        *pump = next;
        let transition = if next.engaged {
            PumpTransition::Engaged
        } else {
            PumpTransition::Released
        };
        info!("Pump {:?} at {}%", transition, percent);
        Ok(Some(transition))
    }

    pub fn relay_mut(&mut self) -> &mut R {
        &mut self.relay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePin;

    fn defaults() -> ThresholdConfig {
        ThresholdConfig::default()
    }

    #[test]
    fn test_off_to_on_only_below_min() {
        let config = defaults();
        assert_eq!(next_pump_state(29.0, &config, PumpState::OFF), PumpState::ON);
        assert_eq!(next_pump_state(30.0, &config, PumpState::OFF), PumpState::OFF);
        assert_eq!(next_pump_state(50.0, &config, PumpState::OFF), PumpState::OFF);
        assert_eq!(next_pump_state(90.0, &config, PumpState::OFF), PumpState::OFF);
    }

    #[test]
    fn test_on_to_off_only_above_max() {
        let config = defaults();
        assert_eq!(next_pump_state(71.0, &config, PumpState::ON), PumpState::OFF);
        assert_eq!(next_pump_state(70.0, &config, PumpState::ON), PumpState::ON);
        assert_eq!(next_pump_state(50.0, &config, PumpState::ON), PumpState::ON);
        assert_eq!(next_pump_state(5.0, &config, PumpState::ON), PumpState::ON);
    }

    #[test]
    fn test_dead_band_keeps_both_states() {
        let config = defaults();
        for p in 30..=70 {
            let percent = p as f32;
            assert_eq!(next_pump_state(percent, &config, PumpState::OFF), PumpState::OFF);
            assert_eq!(next_pump_state(percent, &config, PumpState::ON), PumpState::ON);
        }
    }

    #[test]
    fn test_inverted_thresholds_degenerate() {
        // min > max: a released pump engages below 80 and an engaged pump
        // releases above 20, so 50% toggles every evaluation.
        let config = ThresholdConfig::new(80.0, 20.0);
        assert_eq!(next_pump_state(50.0, &config, PumpState::OFF), PumpState::ON);
        assert_eq!(next_pump_state(50.0, &config, PumpState::ON), PumpState::OFF);
    }

    #[test]
    fn test_relay_released_at_construction() {
        let actuator = PumpActuator::new(FakePin::new()).unwrap();
        assert_eq!(actuator.relay.level, Some(true), "relay idles high");
        assert_eq!(actuator.relay.writes, 1);
    }

    #[test]
    fn test_relay_active_low_on_transition() {
        let mut actuator = PumpActuator::new(FakePin::new()).unwrap();
        let mut pump = PumpState::OFF;

        let t = actuator.update(10.0, &defaults(), &mut pump).unwrap();
        assert_eq!(t, Some(PumpTransition::Engaged));
        assert!(pump.engaged);
        assert_eq!(actuator.relay.level, Some(false), "engaged pump drives line low");

        let t = actuator.update(95.0, &defaults(), &mut pump).unwrap();
        assert_eq!(t, Some(PumpTransition::Released));
        assert!(!pump.engaged);
        assert_eq!(actuator.relay.level, Some(true));
    }

    #[test]
    fn test_update_idempotent_without_transition() {
        let mut actuator = PumpActuator::new(FakePin::new()).unwrap();
        let mut pump = PumpState::OFF;

        actuator.update(10.0, &defaults(), &mut pump).unwrap();
        let writes = actuator.relay.writes;
        for _ in 0..5 {
            assert_eq!(actuator.update(10.0, &defaults(), &mut pump).unwrap(), None);
        }
        assert_eq!(actuator.relay.writes, writes, "no relay writes without a transition");
        assert!(pump.engaged);
    }

    #[test]
    fn test_failed_write_keeps_latch() {
        let mut actuator = PumpActuator::new(FakePin::new()).unwrap();
        actuator.relay.fail = true;
        let mut pump = PumpState::OFF;

        let result = actuator.update(10.0, &defaults(), &mut pump);
        assert!(matches!(result, Err(AppError::Relay)));
        assert!(!pump.engaged, "latch must not move when the relay write fails");
    }
}
