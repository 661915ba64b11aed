//! Reboot into the ROM serial bootloader.
//!
//! Setting `FORCE_DOWNLOAD_BOOT` in `RTC_CNTL_OPTION1_REG` makes the ROM
//! enter download mode on the next reset instead of booting the app, so the
//! board can be reflashed without holding the BOOT strap.

use core::ptr::write_volatile;

use log::warn;
use nivel_core::input::BootloaderControl;

// ESP32-S3 RTC control register
const RTC_CNTL_OPTION1_REG: u32 = 0x6000_812C;
const FORCE_DOWNLOAD_BOOT: u32 = 1 << 0;

/// The chip's ROM download mode.
pub struct RomBootloader;

impl BootloaderControl for RomBootloader {
    fn reboot_to_bootloader(&mut self) -> ! {
        warn!("Rebooting into download mode");
        critical_section::with(|_| unsafe {
            write_volatile(RTC_CNTL_OPTION1_REG as *mut u32, FORCE_DOWNLOAD_BOOT);
        });
        esp_hal::system::software_reset()
    }
}
