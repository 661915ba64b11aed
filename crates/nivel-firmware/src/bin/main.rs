#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::fmt::Write;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{DriveMode, Input, InputConfig, Io, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::ledc::channel::{self as ledc_channel, ChannelIFace as _};
use esp_hal::ledc::timer::{self as ledc_timer, TimerIFace as _};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::rmt::Rmt;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal_smartled::{SmartLedsAdapter, smart_led_buffer};
use heapless::String;
use log::{error, info, warn};
use static_cell::StaticCell;

use nivel_core::config::{IP_SPLASH_MS, TICK_PERIOD_MS};
use nivel_core::cycle::{Cadence, MainCycle};
use nivel_core::feedback::{FeedbackRenderer, LED_COUNT};
use nivel_core::pump::PumpActuator;
use nivel_core::sensors::LevelSampler;
use nivel_firmware::buttons::{self, INPUT, now_ms};
use nivel_firmware::hardware::{LedMatrix, LedcBuzzer, LevelAdc, OledDisplay};
use nivel_firmware::{net, wifi_secrets};

/// Buzzer tone.
const BUZZER_FREQ_HZ: u32 = 2_000;

static BUZZER_TIMER: StaticCell<ledc_timer::Timer<'static, LowSpeed>> = StaticCell::new();
static BUZZER_CHANNEL: StaticCell<ledc_channel::Channel<'static, LowSpeed>> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    // Relay first, so the pump is released as early as possible.
    let relay = Output::new(peripherals.GPIO4, Level::High, OutputConfig::default());
    let actuator = PumpActuator::new(relay).expect("Failed to release relay");

    // Buttons: primary resets thresholds, secondary enters download mode.
    let mut io = Io::new(peripherals.IO_MUX);
    let button_config = InputConfig::default().with_pull(Pull::Up);
    buttons::install(
        &mut io,
        Input::new(peripherals.GPIO5, button_config),
        Input::new(peripherals.GPIO6, button_config),
    );

    // Display
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("Failed to configure I2C")
    .with_sda(peripherals.GPIO8)
    .with_scl(peripherals.GPIO9);
    let display = OledDisplay::new(i2c).expect("Failed to initialize display");

    // LED matrix
    let rmt = Rmt::new(peripherals.RMT, Rate::from_mhz(80)).expect("Failed to initialize RMT");
    let led_adapter = SmartLedsAdapter::new(
        rmt.channel0,
        peripherals.GPIO48,
        smart_led_buffer!(LED_COUNT),
    );
    let strip = LedMatrix::new(led_adapter);

    // Buzzer
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let mut buzzer_timer = ledc.timer::<LowSpeed>(ledc_timer::Number::Timer0);
    buzzer_timer
        .configure(ledc_timer::config::Config {
            duty: ledc_timer::config::Duty::Duty10Bit,
            clock_source: ledc_timer::LSClockSource::APBClk,
            frequency: Rate::from_hz(BUZZER_FREQ_HZ),
        })
        .expect("Failed to configure buzzer timer");
    let buzzer_timer = BUZZER_TIMER.init(buzzer_timer);
    let mut buzzer_channel =
        ledc.channel::<LowSpeed>(ledc_channel::Number::Channel0, peripherals.GPIO7);
    buzzer_channel
        .configure(ledc_channel::config::Config {
            timer: &*buzzer_timer,
            duty_pct: 0,
            drive_mode: DriveMode::PushPull,
        })
        .expect("Failed to configure buzzer channel");
    let buzzer = LedcBuzzer::new(BUZZER_CHANNEL.init(buzzer_channel));

    // Level probe
    let mut adc_config = AdcConfig::new();
    let level_pin = adc_config.enable_pin(peripherals.GPIO2, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);
    let sampler = LevelSampler::new(LevelAdc::new(adc, level_pin));

    let mut feedback = FeedbackRenderer::new(display, strip, buzzer);

    // Network
    let credentials = wifi_secrets::credentials();
    let _ = feedback.show_message(&["Conectando ao", credentials.ssid]);

    let transport = match net::bring_up(peripherals.WIFI, credentials).await {
        Ok(transport) => transport,
        Err(e) => {
            error!("{}", e);
            let _ = feedback.show_message(&["WiFi: FALHA"]);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    let mut ip_line: String<24> = String::new();
    if let Some(address) = transport.address() {
        let _ = write!(ip_line, "{}", address);
    }
    info!("Configuration service on http://{}/", ip_line);
    let _ = feedback.show_message(&["IP:", &ip_line]);
    Timer::after(Duration::from_millis(u64::from(IP_SPLASH_MS))).await;

    let mut cycle = MainCycle::new(&INPUT, sampler, actuator, feedback, transport);
    let mut cadence = Cadence::new(TICK_PERIOD_MS);

    loop {
        let now = now_ms();
        cadence.begin(now);
        if let Err(e) = cycle.tick(now) {
            warn!("Tick {} failed: {}", cycle.ticks(), e);
        }
        let delay = cadence.remaining(now_ms());
        Timer::after(Duration::from_millis(u64::from(delay))).await;
    }
}
