//! SmartMed Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single-owner main loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        NotifySink     NvsAdapter   Esp32Time  │
//! │  (Sensor+Actuator+LCD)  (EventSink)    (Config+KV)  (Clock)    │
//! │  BleAdapter ──callbacks──▶ LINK_EVENTS                         │
//! │  (LinkPort)                                                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Interpreter · Repository · Scheduler · Dispense FSM   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::delay::Delay;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::FromValueType;

use medibox::adapters::ble::BleAdapter;
use medibox::adapters::hardware::HardwareAdapter;
use medibox::adapters::notify_sink::NotifySink;
use medibox::adapters::nvs::NvsAdapter;
use medibox::adapters::time::Esp32TimeAdapter;
use medibox::app::ports::{ClockPort, ConfigError, ConfigPort};
use medibox::app::service::AppService;
use medibox::config::DeviceConfig;
use medibox::drivers::lcd::Lcd;
use medibox::drivers::watchdog::Watchdog;
use medibox::drivers::hw_init;
use medibox::events::{LINK_EVENTS, LinkEvent};
use medibox::pins;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SmartMed v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. Initialise hardware peripherals ───────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Without the motor and sensors there is nothing useful to do.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    let peripherals = Peripherals::take()?;
    let i2c_cfg = I2cConfig::new().baudrate(pins::I2C_FREQ_HZ.Hz());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &i2c_cfg,
    )?;
    let mut lcd = Lcd::on_board(i2c, Delay::new_default());
    let lcd = match lcd.init().and_then(|()| lcd.set_backlight(true)) {
        Ok(()) => Some(lcd),
        Err(e) => {
            warn!("LCD init failed ({:?}), continuing without display", e);
            None
        }
    };
    let mut hw = HardwareAdapter::new(lcd);

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(ConfigError::NotFound) => {
            info!("No stored config, persisting defaults");
            let cfg = DeviceConfig::default();
            if let Err(e) = nvs.save(&cfg) {
                warn!("Default config save failed: {}", e);
            }
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };

    // ── 3. Link + clock + watchdog ────────────────────────────
    let mut clock = Esp32TimeAdapter::new();
    let mut ble = BleAdapter::new(config.device_name.clone());
    if let Err(e) = ble.start() {
        warn!("BLE start failed ({}), running offline", e);
    }
    let mut watchdog = Watchdog::new();

    // ── 4. Construct app service ──────────────────────────────
    let loop_interval_ms = config.loop_interval_ms;
    let mut app = AppService::new(nvs, config);
    app.start(&mut hw, clock.now_ms(), &mut NotifySink::new(&mut ble));

    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    loop {
        LINK_EVENTS.drain(|event| {
            match &event {
                LinkEvent::Connected => ble.on_central_connected(),
                LinkEvent::Disconnected => ble.on_central_disconnected(),
                LinkEvent::Command(_) => {}
            }
            let now_ms = clock.now_ms();
            app.on_link_event(event, now_ms, &mut NotifySink::new(&mut ble));
        });

        app.tick(&mut hw, &mut clock, &mut NotifySink::new(&mut ble));

        watchdog.feed();
        clock.delay_ms(loop_interval_ms);
    }
}
