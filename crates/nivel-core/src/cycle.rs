//! The main control cycle.
//!
//! One [`MainCycle::tick`] is one iteration, strictly in this order:
//!
//! 1. poll the transport and serve the configuration service,
//! 2. apply and clear a pending reset request,
//! 3. sample the level,
//! 4. run the hysteresis actuator,
//! 5. render feedback (display, LED bar, buzzer).
//!
//! The cycle never sleeps itself. The caller owns the clock and uses
//! [`Cadence`] to wait for the next tick, so tests can run any number of
//! ticks against a simulated clock.

use core::fmt::Debug;

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::{debug, info};

use crate::app_state::{AppError, AppState};
use crate::config::BUZZER_PERIOD_TICKS;
use crate::feedback::FeedbackRenderer;
use crate::feedback::display::StatusDisplay;
use crate::feedback::led_bar::PixelStrip;
use crate::http::{ConfigService, Transport};
use crate::input::InputHandler;
use crate::pump::{PumpActuator, PumpState, PumpTransition};
use crate::sensors::{AnalogInput, LevelReading, LevelSampler};

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Iteration number, starting at zero.
    pub tick: u32,
    pub reading: LevelReading,
    pub pump: PumpState,
    pub transition: Option<PumpTransition>,
    pub reset_applied: bool,
    pub alarm: bool,
    /// Transport events handled during the poll.
    pub events: usize,
}

pub struct MainCycle<'a, A, R, D, S, B, T> {
    input: &'a InputHandler,
    sampler: LevelSampler<A>,
    actuator: PumpActuator<R>,
    feedback: FeedbackRenderer<D, S, B>,
    service: ConfigService,
    transport: T,
    state: AppState,
    ticks: u32,
}

impl<'a, A, R, D, S, B, T> MainCycle<'a, A, R, D, S, B, T>
where
    A: AnalogInput,
    R: OutputPin,
    D: StatusDisplay,
    D::Error: Debug,
    S: PixelStrip,
    B: SetDutyCycle,
    T: Transport,
{
    pub fn new(
        input: &'a InputHandler,
        sampler: LevelSampler<A>,
        actuator: PumpActuator<R>,
        feedback: FeedbackRenderer<D, S, B>,
        transport: T,
    ) -> Self {
        Self {
            input,
            sampler,
            actuator,
            feedback,
            service: ConfigService::new(),
            transport,
            state: AppState::new(),
            ticks: 0,
        }
    }

    /// Run one iteration at `now_ms`.
    ///
    /// Feedback failures are logged and do not stop the iteration. A relay
    /// failure leaves the pump latch where it was; feedback is still
    /// rendered and the error is returned at the end.
    pub fn tick(&mut self, now_ms: u32) -> Result<TickReport, AppError> {
        let events = self
            .service
            .poll(&mut self.transport, &mut self.state, now_ms);

        let reset_applied = self.input.take_reset();
        if reset_applied {
            info!("Reset request applied");
            self.state.reset_thresholds();
        }

        let reading = self.sampler.sample();
        self.state.reading = reading;

        let actuation =
            self.actuator
                .update(reading.percent, &self.state.thresholds, &mut self.state.pump);

        let tick_phase = (self.ticks % u32::from(BUZZER_PERIOD_TICKS)) as u8;
        // Errors are already logged per output.
        let _ = self.feedback.render(&self.state, tick_phase);

        let tick = self.ticks;
        self.ticks = self.ticks.wrapping_add(1);

        let transition = actuation?;
        let report = TickReport {
            tick,
            reading,
            pump: self.state.pump,
            transition,
            reset_applied,
            alarm: self.feedback.buzzer().is_sounding(),
            events,
        };
        debug!("Tick {:?}", report);
        Ok(report)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    /// Iterations completed so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn sampler_mut(&mut self) -> &mut LevelSampler<A> {
        &mut self.sampler
    }

    pub fn actuator_mut(&mut self) -> &mut PumpActuator<R> {
        &mut self.actuator
    }

    pub fn feedback(&self) -> &FeedbackRenderer<D, S, B> {
        &self.feedback
    }

    pub fn feedback_mut(&mut self) -> &mut FeedbackRenderer<D, S, B> {
        &mut self.feedback
    }

    pub fn service(&self) -> &ConfigService {
        &self.service
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

/// Fixed-period tick scheduling.
///
/// Call [`Cadence::begin`] when an iteration starts and sleep for
/// [`Cadence::remaining`] after it ends. An iteration that overruns the
/// period gets no sleep and the next period starts from its end.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    period_ms: u32,
    started_ms: u32,
}

impl Cadence {
    pub const fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            started_ms: 0,
        }
    }

    pub fn begin(&mut self, now_ms: u32) {
        self.started_ms = now_ms;
    }

    /// Milliseconds left until the next tick is due.
    pub fn remaining(&self, now_ms: u32) -> u32 {
        self.period_ms
            .saturating_sub(now_ms.wrapping_sub(self.started_ms))
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }
}
