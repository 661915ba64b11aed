//! Debounced button handling.
//!
//! [`InputHandler::on_edge`] is the only code that runs in interrupt
//! context. It classifies the edge and, for the primary button, posts a
//! reset request into a single-slot mailbox. The main cycle drains the
//! mailbox once per tick with [`InputHandler::take_reset`]. Bursts coalesce:
//! however many edges arrive between two ticks, at most one reset is
//! pending.
//!
//! The pending flag and the debounce timestamp change together, so both
//! live in one cell guarded by a critical section.

use core::cell::Cell;

use critical_section::Mutex;

use crate::config::DEBOUNCE_WINDOW_MS;

/// Physical buttons wired to the interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Restores the default thresholds.
    Primary,
    /// Reboots into the bootloader for reflashing.
    Secondary,
}

/// What the interrupt shell has to do after an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Reboot into the bootloader immediately.
    RebootToBootloader,
    /// A reset was posted to the mailbox.
    ResetRequested,
    /// The edge fell inside the debounce window and was dropped.
    Ignored,
}

/// Restart into the reflash bootloader.
pub trait BootloaderControl {
    fn reboot_to_bootloader(&mut self) -> !;
}

#[derive(Debug, Clone, Copy)]
struct MailboxState {
    pending: bool,
    /// Time of the last accepted primary edge. `None` until the first one,
    /// so an edge right after boot is never mistaken for a bounce.
    last_trigger_ms: Option<u32>,
}

/// Interrupt-to-main handoff for button events.
///
/// Designed to live in a `static`:
///
/// ```rust,ignore
/// static INPUT: InputHandler = InputHandler::new();
///
/// // in the GPIO interrupt
/// if INPUT.on_edge(Button::Secondary, now_ms) == InputAction::RebootToBootloader {
///     bootloader.reboot_to_bootloader();
/// }
///
/// // once per tick
/// if INPUT.take_reset() { state.reset_thresholds(); }
/// ```
pub struct InputHandler {
    state: Mutex<Cell<MailboxState>>,
    debounce_ms: u32,
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHandler {
    pub const fn new() -> Self {
        Self::with_debounce(DEBOUNCE_WINDOW_MS)
    }

    pub const fn with_debounce(debounce_ms: u32) -> Self {
        Self {
            state: Mutex::new(Cell::new(MailboxState {
                pending: false,
                last_trigger_ms: None,
            })),
            debounce_ms,
        }
    }

    /// Handle one edge. Called from interrupt context with a monotonic
    /// millisecond timestamp; wrapping of the counter is tolerated.
    pub fn on_edge(&self, button: Button, now_ms: u32) -> InputAction {
        match button {
            Button::Secondary => InputAction::RebootToBootloader,
            Button::Primary => critical_section::with(|cs| {
                let cell = self.state.borrow(cs);
                let mut state = cell.get();

                let bouncing = state
                    .last_trigger_ms
                    .is_some_and(|last| now_ms.wrapping_sub(last) < self.debounce_ms);
                if bouncing {
                    return InputAction::Ignored;
                }

                state.pending = true;
                state.last_trigger_ms = Some(now_ms);
                cell.set(state);
                InputAction::ResetRequested
            }),
        }
    }

    /// Consume the pending reset, if any. Called by the main cycle.
    pub fn take_reset(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let pending = state.pending;
            state.pending = false;
            cell.set(state);
            pending
        })
    }

    /// Whether a reset is waiting for the next tick.
    pub fn is_reset_pending(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).get().pending)
    }
}
