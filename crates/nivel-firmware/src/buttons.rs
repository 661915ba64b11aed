//! GPIO interrupt wiring for the two buttons.
//!
//! The handler only timestamps the edge and forwards it to [`INPUT`]; the
//! main cycle drains the reset mailbox on its next tick. The secondary
//! button reboots straight into download mode from interrupt context.

use core::cell::RefCell;

use critical_section::Mutex;
use esp_hal::gpio::{Event, Input, Io};
use esp_hal::{handler, ram};
use nivel_core::input::{BootloaderControl, Button, InputAction, InputHandler};

use crate::bootloader::RomBootloader;

/// Mailbox shared between the GPIO interrupt and the main cycle.
pub static INPUT: InputHandler = InputHandler::new();

struct Buttons {
    primary: Input<'static>,
    secondary: Input<'static>,
}

static BUTTONS: Mutex<RefCell<Option<Buttons>>> = Mutex::new(RefCell::new(None));

/// Milliseconds since boot, wrapping.
pub fn now_ms() -> u32 {
    embassy_time::Instant::now().as_millis() as u32
}

/// Register the handler and arm falling-edge interrupts on both buttons.
pub fn install(io: &mut Io<'_>, mut primary: Input<'static>, mut secondary: Input<'static>) {
    io.set_interrupt_handler(on_gpio);
    critical_section::with(|cs| {
        primary.listen(Event::FallingEdge);
        secondary.listen(Event::FallingEdge);
        BUTTONS
            .borrow_ref_mut(cs)
            .replace(Buttons { primary, secondary });
    });
}

#[handler]
#[ram]
fn on_gpio() {
    let now = now_ms();
    let mut reboot = false;

    critical_section::with(|cs| {
        let mut buttons = BUTTONS.borrow_ref_mut(cs);
        let Some(buttons) = buttons.as_mut() else {
            return;
        };

        if buttons.secondary.is_interrupt_set() {
            buttons.secondary.clear_interrupt();
            reboot = INPUT.on_edge(Button::Secondary, now) == InputAction::RebootToBootloader;
        }
        if buttons.primary.is_interrupt_set() {
            buttons.primary.clear_interrupt();
            INPUT.on_edge(Button::Primary, now);
        }
    });

    if reboot {
        RomBootloader.reboot_to_bootloader();
    }
}
