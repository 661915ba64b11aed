//! In-memory collaborators for host tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::string::String;
use std::vec::Vec;

use embedded_hal::digital::{self, ErrorType as DigitalErrorType, OutputPin};
use embedded_hal::pwm::{self, ErrorType as PwmErrorType, SetDutyCycle};

use crate::feedback::LedFrame;
use crate::feedback::led_bar::PixelStrip;
use crate::http::{ConnectionId, EventQueue, Transport, TransportError, TransportEvent};
use crate::sensors::AnalogInput;

/// ADC returning a settable value.
pub struct FakeAdc {
    pub value: u16,
    pub last_channel: Option<u8>,
}

impl FakeAdc {
    pub fn new(value: u16) -> Self {
        Self {
            value,
            last_channel: None,
        }
    }
}

impl AnalogInput for FakeAdc {
    fn read(&mut self, channel: u8) -> u16 {
        self.last_channel = Some(channel);
        self.value
    }
}

/// Output pin recording its level; `level` is `None` until first written.
#[derive(Default)]
pub struct FakePin {
    pub level: Option<bool>,
    pub writes: usize,
    pub fail: bool,
}

impl FakePin {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&mut self, high: bool) -> Result<(), digital::ErrorKind> {
        if self.fail {
            return Err(digital::ErrorKind::Other);
        }
        self.level = Some(high);
        self.writes += 1;
        Ok(())
    }
}

impl DigitalErrorType for FakePin {
    type Error = digital::ErrorKind;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

/// PWM channel with a 1000-step duty range.
pub struct FakePwm {
    pub duty: u16,
    pub max: u16,
    pub fail: bool,
}

impl FakePwm {
    pub fn new() -> Self {
        Self {
            duty: 0,
            max: 1000,
            fail: false,
        }
    }
}

impl PwmErrorType for FakePwm {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for FakePwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if self.fail {
            return Err(pwm::ErrorKind::Other);
        }
        self.duty = duty;
        Ok(())
    }
}

/// LED strip keeping every frame written to it.
#[derive(Default)]
pub struct FakeStrip {
    pub frames: Vec<LedFrame>,
    pub fail: bool,
}

impl FakeStrip {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PixelStrip for FakeStrip {
    type Error = ();

    fn write_frame(&mut self, frame: &LedFrame) -> Result<(), Self::Error> {
        if self.fail {
            return Err(());
        }
        self.frames.push(*frame);
        Ok(())
    }
}

/// Scripted transport.
///
/// Client actions (`connect`, `send`, `ack_all`, `peer_close`) are queued
/// and surface as events on the next `poll`. Written bytes accumulate per
/// connection; unacknowledged bytes count against `write_limit`, which
/// models the stack's send buffer.
#[derive(Default)]
pub struct FakeTransport {
    pending: VecDeque<TransportEvent>,
    written: BTreeMap<ConnectionId, Vec<u8>>,
    unacked: BTreeMap<ConnectionId, usize>,
    closed: BTreeSet<ConnectionId>,
    next_id: ConnectionId,
    pub write_limit: Option<usize>,
    pub fail_writes: bool,
    pub write_calls: usize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self) -> ConnectionId {
        let conn = self.next_id;
        self.next_id += 1;
        self.pending.push_back(TransportEvent::Accepted(conn));
        conn
    }

    pub fn send(&mut self, conn: ConnectionId, data: &[u8]) {
        self.pending.push_back(TransportEvent::Received {
            conn,
            payload: data.to_vec(),
        });
    }

    /// Report everything written so far as transmitted.
    pub fn ack_all(&mut self, conn: ConnectionId) {
        let len = self.unacked.remove(&conn).unwrap_or(0);
        if len > 0 {
            self.pending.push_back(TransportEvent::Sent { conn, len });
        }
    }

    pub fn peer_close(&mut self, conn: ConnectionId) {
        self.pending.push_back(TransportEvent::PeerClosed(conn));
    }

    pub fn response(&self, conn: ConnectionId) -> String {
        self.written
            .get(&conn)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    pub fn unacked(&self, conn: ConnectionId) -> usize {
        self.unacked.get(&conn).copied().unwrap_or(0)
    }

    pub fn is_closed(&self, conn: ConnectionId) -> bool {
        self.closed.contains(&conn)
    }
}

impl Transport for FakeTransport {
    fn poll(&mut self, _now_ms: u32, events: &mut EventQueue) {
        while !events.is_full() {
            let Some(event) = self.pending.pop_front() else {
                break;
            };
            if self.closed.contains(&event.connection()) {
                continue;
            }
            // Capacity checked above.
            let _ = events.push_back(event);
        }
    }

    fn write(&mut self, conn: ConnectionId, data: &[u8]) -> Result<usize, TransportError> {
        self.write_calls += 1;
        if self.fail_writes {
            return Err(TransportError::Stack);
        }
        if self.closed.contains(&conn) {
            return Err(TransportError::Closed);
        }
        let in_flight = self.unacked(conn);
        let room = match self.write_limit {
            Some(limit) => limit.saturating_sub(in_flight),
            None => usize::MAX,
        };
        let len = data.len().min(room);
        if len > 0 {
            self.written.entry(conn).or_default().extend_from_slice(&data[..len]);
            *self.unacked.entry(conn).or_insert(0) += len;
        }
        Ok(len)
    }

    fn close(&mut self, conn: ConnectionId) {
        self.closed.insert(conn);
    }
}
