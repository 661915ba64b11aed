//! Desktop simulator for the nivel-rs tank level controller.
//!
//! Runs the real main cycle from `nivel-core` against a simulated tank: the
//! level drains slowly and fills while the pump is engaged. The
//! configuration service listens on a real host socket, so the control page
//! can be opened in a browser.
//!
//! # Commands (stdin, one per line)
//!
//! | Command | Action                                    |
//! |---------|-------------------------------------------|
//! | r       | Press the primary button (reset limits)   |
//! | b       | Press the secondary button (exits)        |
//! | s       | Print the display contents                |
//! | +N / -N | Add or remove N percent of water          |
//! | q       | Quit                                      |
//!
//! With the `window` feature the display is also mirrored into an SDL2
//! window, where R, B and Q do the same as above.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::io::{self, BufRead, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::RgbColor;
use embedded_hal::digital::{ErrorType as DigitalErrorType, OutputPin};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};
use log::{debug, info, warn};

use nivel_core::config::{ADC_MAX_RAW, TICK_PERIOD_MS};
use nivel_core::cycle::{Cadence, MainCycle};
use nivel_core::feedback::led_bar::PixelStrip;
use nivel_core::feedback::{FeedbackRenderer, LED_COUNT, LedFrame};
use nivel_core::framebuffer::FrameBuffer;
use nivel_core::http::{ConnectionId, EventQueue, Transport, TransportError, TransportEvent};
use nivel_core::input::{BootloaderControl, Button, InputAction, InputHandler};
use nivel_core::pump::PumpActuator;
use nivel_core::sensors::{AnalogInput, LevelSampler};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Address of the configuration service; override with `NIVEL_SIM_ADDR`.
const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

/// Level at start-up, in percent.
const INITIAL_LEVEL: f32 = 50.0;

/// Level gained per tick while the pump runs.
const FILL_PER_TICK: f32 = 2.5;

/// Level lost per tick to consumption.
const DRAIN_PER_TICK: f32 = 0.8;

/// Ticks between display dumps in the log.
const DUMP_EVERY_TICKS: u32 = 20;

static INPUT: InputHandler = InputHandler::new();

// ---------------------------------------------------------------------------
// Simulated hardware
// ---------------------------------------------------------------------------

/// Tank model. The relay drives `pump_on`; every ADC read advances the model
/// by one tick.
struct SimulatedTank {
    level: f32,
    pump_on: Rc<Cell<bool>>,
}

impl SimulatedTank {
    fn new(pump_on: Rc<Cell<bool>>) -> Self {
        Self {
            level: INITIAL_LEVEL,
            pump_on,
        }
    }

    fn adjust(&mut self, delta: f32) {
        self.level = (self.level + delta).clamp(0.0, 100.0);
        info!("Tank level set to {:.1}%", self.level);
    }
}

impl AnalogInput for SimulatedTank {
    fn read(&mut self, _channel: u8) -> u16 {
        let inflow = if self.pump_on.get() { FILL_PER_TICK } else { 0.0 };
        self.level = (self.level + inflow - DRAIN_PER_TICK).clamp(0.0, 100.0);
        (self.level / 100.0 * f32::from(ADC_MAX_RAW)).round() as u16
    }
}

/// Active-low relay feeding the tank model.
struct SimRelay {
    pump_on: Rc<Cell<bool>>,
}

impl DigitalErrorType for SimRelay {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimRelay {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pump_on.set(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pump_on.set(false);
        Ok(())
    }
}

/// Buzzer that logs when it starts and stops sounding.
#[derive(Default)]
struct SimBuzzer {
    duty: u16,
}

impl PwmErrorType for SimBuzzer {
    type Error = core::convert::Infallible;
}

impl SetDutyCycle for SimBuzzer {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if (duty > 0) != (self.duty > 0) {
            debug!("Buzzer {}", if duty > 0 { "beep" } else { "off" });
        }
        self.duty = duty;
        Ok(())
    }
}

/// LED matrix rendered as a one-line bar in the log.
#[derive(Default)]
struct SimStrip {
    last: Option<LedFrame>,
}

impl SimStrip {
    fn render(frame: &LedFrame) -> String {
        frame
            .iter()
            .map(|c| match (c.r() > 0, c.b() > 0) {
                (true, _) => 'R',
                (_, true) => 'B',
                _ => '.',
            })
            .collect()
    }
}

impl PixelStrip for SimStrip {
    type Error = core::convert::Infallible;

    fn write_frame(&mut self, frame: &LedFrame) -> Result<(), Self::Error> {
        if self.last.as_ref() != Some(frame) {
            debug!("LEDs [{}] ({} cells)", Self::render(frame), LED_COUNT);
            self.last = Some(*frame);
        }
        Ok(())
    }
}

struct SimBootloader;

impl BootloaderControl for SimBootloader {
    fn reboot_to_bootloader(&mut self) -> ! {
        info!("Secondary button: rebooting into the bootloader (simulator exits)");
        std::process::exit(0)
    }
}

// ---------------------------------------------------------------------------
// Host TCP transport
// ---------------------------------------------------------------------------

struct HostConnection {
    stream: TcpStream,
    /// Bytes accepted by the kernel and not yet reported as sent.
    unreported: usize,
    peer_closed: bool,
}

/// Non-blocking `std` listener behind the core [`Transport`] trait.
///
/// A write counts as sent once the kernel has accepted it.
struct HostTransport {
    listener: TcpListener,
    connections: BTreeMap<ConnectionId, HostConnection>,
    next_id: ConnectionId,
}

impl HostTransport {
    fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            connections: BTreeMap::new(),
            next_id: 0,
        })
    }

    fn accept_pending(&mut self, events: &mut EventQueue) {
        while !events.is_full() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!("Dropping {}: {}", peer, e);
                        continue;
                    }
                    let id = self.next_id;
                    self.next_id = self.next_id.wrapping_add(1);
                    debug!("Accepted {} as connection {}", peer, id);
                    self.connections.insert(
                        id,
                        HostConnection {
                            stream,
                            unreported: 0,
                            peer_closed: false,
                        },
                    );
                    let _ = events.push_back(TransportEvent::Accepted(id));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    break;
                }
            }
        }
    }
}

impl Transport for HostTransport {
    fn poll(&mut self, _now_ms: u32, events: &mut EventQueue) {
        self.accept_pending(events);

        let mut buf = [0u8; 1024];
        for (&id, conn) in self.connections.iter_mut() {
            if events.is_full() {
                break;
            }
            if conn.unreported > 0 {
                let len = std::mem::take(&mut conn.unreported);
                let _ = events.push_back(TransportEvent::Sent { conn: id, len });
            }
            if conn.peer_closed || events.is_full() {
                continue;
            }
            match conn.stream.read(&mut buf) {
                Ok(0) => {
                    conn.peer_closed = true;
                    let _ = events.push_back(TransportEvent::PeerClosed(id));
                }
                Ok(n) => {
                    let _ = events.push_back(TransportEvent::Received {
                        conn: id,
                        payload: buf[..n].to_vec(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => {
                    debug!("Read on connection {} failed: {}", id, e);
                    conn.peer_closed = true;
                    let _ = events.push_back(TransportEvent::PeerClosed(id));
                }
            }
        }
    }

    fn write(&mut self, conn: ConnectionId, data: &[u8]) -> Result<usize, TransportError> {
        let connection = self
            .connections
            .get_mut(&conn)
            .ok_or(TransportError::UnknownConnection)?;
        match connection.stream.write(data) {
            Ok(n) => {
                connection.unreported += n;
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                debug!("Write on connection {} failed: {}", conn, e);
                Err(TransportError::Closed)
            }
        }
    }

    fn close(&mut self, conn: ConnectionId) {
        if let Some(connection) = self.connections.remove(&conn) {
            let _ = connection.stream.shutdown(Shutdown::Both);
        }
    }
}

// ---------------------------------------------------------------------------
// Operator input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Press(Button),
    ShowDisplay,
    Adjust(f32),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    match line {
        "r" | "R" => Some(Command::Press(Button::Primary)),
        "b" | "B" => Some(Command::Press(Button::Secondary)),
        "s" | "S" => Some(Command::ShowDisplay),
        "q" | "Q" => Some(Command::Quit),
        _ if line.starts_with('+') || line.starts_with('-') => {
            line.parse::<f32>().ok().map(Command::Adjust)
        }
        _ => None,
    }
}

fn spawn_stdin_reader() -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => warn!("Unknown command {:?} (r, b, s, +N, -N, q)", line.trim()),
            }
        }
    });
    rx
}

// ---------------------------------------------------------------------------
// Optional SDL window
// ---------------------------------------------------------------------------

#[cfg(feature = "window")]
mod window {
    use embedded_graphics::pixelcolor::BinaryColor;
    use embedded_graphics::prelude::*;
    use embedded_graphics_simulator::{
        BinaryColorTheme, OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window,
        sdl2::Keycode,
    };
    use nivel_core::feedback::display::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX};
    use nivel_core::framebuffer::FrameBuffer;

    use super::Command;
    use nivel_core::input::Button;

    const WINDOW_SCALE: u32 = 4;

    pub struct OledWindow {
        display: SimulatorDisplay<BinaryColor>,
        window: Window,
    }

    impl OledWindow {
        pub fn new() -> Self {
            let display =
                SimulatorDisplay::new(Size::new(DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX));
            let settings = OutputSettingsBuilder::new()
                .theme(BinaryColorTheme::OledBlue)
                .scale(WINDOW_SCALE)
                .build();
            let mut window = Window::new("Nivel Simulator", &settings);
            // The SDL window must be updated once before events() is called.
            window.update(&display);
            Self { display, window }
        }

        pub fn mirror(&mut self, frame: &FrameBuffer) {
            let pixels = (0..DISPLAY_HEIGHT_PX as i32).flat_map(|y| {
                (0..DISPLAY_WIDTH_PX as i32)
                    .map(move |x| Pixel(Point::new(x, y), frame.pixel(x, y)))
            });
            let _ = self.display.draw_iter(pixels);
            self.window.update(&self.display);
        }

        pub fn commands(&mut self) -> Vec<Command> {
            self.window
                .events()
                .filter_map(|event| match event {
                    SimulatorEvent::Quit => Some(Command::Quit),
                    SimulatorEvent::KeyDown { keycode, .. } => match keycode {
                        Keycode::R => Some(Command::Press(Button::Primary)),
                        Keycode::B => Some(Command::Press(Button::Secondary)),
                        Keycode::Q | Keycode::Escape => Some(Command::Quit),
                        _ => None,
                    },
                    _ => None,
                })
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting nivel-rs simulator");

    let addr = std::env::var("NIVEL_SIM_ADDR").unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string());
    let transport = match HostTransport::bind(&addr) {
        Ok(transport) => transport,
        Err(e) => {
            log::error!("Cannot listen on {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Configuration service on http://{}/", addr);
    info!("Commands: r=reset limits  b=bootloader  s=show display  +N/-N=adjust level  q=quit");

    let pump_on = Rc::new(Cell::new(false));
    let sampler = LevelSampler::new(SimulatedTank::new(Rc::clone(&pump_on)));
    let actuator = match PumpActuator::new(SimRelay {
        pump_on: Rc::clone(&pump_on),
    }) {
        Ok(actuator) => actuator,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut feedback =
        FeedbackRenderer::new(FrameBuffer::new(), SimStrip::default(), SimBuzzer::default());
    let _ = feedback.show_message(&["IP:", &addr]);

    let mut cycle = MainCycle::new(&INPUT, sampler, actuator, feedback, transport);
    let mut cadence = Cadence::new(TICK_PERIOD_MS);
    let commands = spawn_stdin_reader();

    #[cfg(feature = "window")]
    let mut window = window::OledWindow::new();

    let epoch = Instant::now();
    let now_ms = || epoch.elapsed().as_millis() as u32;

    'running: loop {
        let now = now_ms();
        cadence.begin(now);

        let mut pending: Vec<Command> = Vec::new();
        loop {
            match commands.try_recv() {
                Ok(command) => pending.push(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        #[cfg(feature = "window")]
        pending.extend(window.commands());

        for command in pending {
            match command {
                Command::Press(button) => {
                    if INPUT.on_edge(button, now) == InputAction::RebootToBootloader {
                        SimBootloader.reboot_to_bootloader();
                    }
                }
                Command::ShowDisplay => {
                    println!("{}", cycle.feedback().display().to_ascii());
                }
                Command::Adjust(delta) => cycle.sampler_mut().inner_mut().adjust(delta),
                Command::Quit => break 'running,
            }
        }

        match cycle.tick(now) {
            Ok(report) => {
                if report.tick % DUMP_EVERY_TICKS == 0 {
                    info!(
                        "Level {:.0}% (raw {}), pump {}, limits {:.1}..{:.1}",
                        report.reading.percent,
                        report.reading.raw,
                        if report.pump.engaged { "ON" } else { "OFF" },
                        cycle.state().thresholds.min_percent,
                        cycle.state().thresholds.max_percent,
                    );
                }
            }
            Err(e) => warn!("Tick failed: {}", e),
        }

        #[cfg(feature = "window")]
        window.mirror(cycle.feedback().display());

        let _ = io::stdout().flush();
        thread::sleep(Duration::from_millis(u64::from(cadence.remaining(now_ms()))));
    }

    info!("Simulator exiting");
}
