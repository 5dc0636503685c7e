//! PrintGlow Firmware — Main Entry Point
//!
//! Hexagonal architecture around two cooperating pieces:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  Ws2812Strip     LogEventSink    NvsConfigAdapter  Esp32Time │
//! │  (StripPort)     (EventSink)     (ConfigPort)      (clock)   │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                 │    │
//! │  │  status state machine · animation engine             │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │                                                              │
//! │  PrinterMonitor handle ◀── telemetry feed (network layer)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The network layer (MQTT report subscription, reconnection policy,
//! HTTP configuration surface) lives outside this crate; it receives a
//! [`PrinterMonitor`] handle and pushes decoded reports through it.
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use printglow::adapters::log_sink::LogEventSink;
use printglow::adapters::nvs::NvsConfigAdapter;
use printglow::adapters::time::Esp32TimeAdapter;
use printglow::app::commands::AppCommand;
use printglow::app::ports::{ConfigError, ConfigPort, StripPort};
use printglow::app::service::AppService;
use printglow::config::LedSettings;
use printglow::drivers::button::{ButtonDriver, ButtonEvent};
use printglow::drivers::strip::Ws2812Strip;
use smart_leds::RGB8;

/// Driver loop granularity. Animation pacing happens inside the
/// renderer; this only bounds how quickly timers are observed.
const DRIVER_TICK_MS: u64 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("PrintGlow v{} starting", env!("CARGO_PKG_VERSION"));

    // ── 2. Load settings from NVS (or defaults) ───────────────
    let nvs = NvsConfigAdapter::new().map_err(|e| anyhow::anyhow!("NVS init: {e}"))?;
    let settings = match nvs.load() {
        Ok(s) => s,
        Err(ConfigError::NotFound) => {
            info!("no stored settings - using defaults");
            LedSettings::default()
        }
        Err(e) => {
            warn!("settings load failed ({e}) - using defaults");
            LedSettings::default()
        }
    };
    info!(
        "strip: {} pixels, brightness {}, lights {}",
        settings.led_count,
        settings.effective_brightness(),
        if settings.lights_off_override { "off" } else { "on" }
    );

    // ── 3. Peripherals: strip on RMT, button on GPIO ──────────
    let peripherals = esp_idf_hal::peripherals::Peripherals::take()?;
    let mut strip = Ws2812Strip::new(peripherals.rmt.channel0, peripherals.pins.gpio17)
        .map_err(|e| anyhow::anyhow!("strip init: {e}"))?;

    let mut button_pin = esp_idf_hal::gpio::PinDriver::input(peripherals.pins.gpio16)?;
    button_pin.set_pull(esp_idf_hal::gpio::Pull::Up)?;
    button_pin.set_interrupt_type(esp_idf_hal::gpio::InterruptType::NegEdge)?;
    // SAFETY: the handler only performs a lock-free atomic store.
    unsafe {
        button_pin.subscribe(|| {
            let now = (esp_idf_svc::sys::esp_timer_get_time() / 1_000) as u32;
            printglow::drivers::button::button_isr_handler(now);
        })?;
    }
    button_pin.enable_interrupt()?;
    let mut button = ButtonDriver::new(printglow::pins::BUTTON_GPIO);

    let clock = Esp32TimeAdapter::new();

    if !settings.lights_off_override {
        startup_sweep(&mut strip, usize::from(settings.led_count))?;
    }

    // ── 4. Application core ───────────────────────────────────
    let seed = (clock.uptime_us() as u32) | 1;
    let mut service = AppService::new(settings, seed);
    let mut sink = LogEventSink::new();
    service.start(&mut sink);

    // The telemetry transport (out of scope here) gets a monitor handle:
    //   let monitor = service.monitor();
    //   ... on each report: monitor.ingest(&delta, clock.uptime_ms());
    let _monitor = service.monitor();

    // ── 5. Fixed-cadence driver loop ──────────────────────────
    loop {
        let now = clock.uptime_ms();

        match button.tick(now as u32) {
            Some(ButtonEvent::ShortPress) => {
                service.handle_command(AppCommand::ToggleLights, &mut sink, now);
            }
            Some(ButtonEvent::LongPress) => {
                info!("button held - restoring default settings");
                service.handle_command(
                    AppCommand::UpdateSettings(LedSettings::default()),
                    &mut sink,
                    now,
                );
            }
            None => {}
        }

        service.tick(&mut strip, &nvs, &mut sink, now);
        std::thread::sleep(Duration::from_millis(DRIVER_TICK_MS));
    }
}

/// Boot indication: fill the strip blue pixel by pixel, hold briefly,
/// then clear it the same way.
fn startup_sweep(strip: &mut impl StripPort, count: usize) -> Result<()> {
    let mut frame = vec![RGB8::default(); count];

    for i in 0..count {
        frame[i] = RGB8::new(0, 0, 255);
        strip
            .show(&frame)
            .map_err(|e| anyhow::anyhow!("startup sweep: {e}"))?;
        std::thread::sleep(Duration::from_millis(30));
    }

    std::thread::sleep(Duration::from_millis(500));

    for i in 0..count {
        frame[i] = RGB8::default();
        strip
            .show(&frame)
            .map_err(|e| anyhow::anyhow!("startup sweep: {e}"))?;
        std::thread::sleep(Duration::from_millis(20));
    }

    Ok(())
}
