//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns every driver the dispense cycle touches and exposes them through
//! [`SensorPort`], [`ActuatorPort`] and [`DisplayPort`].  This is the only
//! module in the system that touches actual hardware.  On non-espidf
//! targets, the underlying drivers use cfg-gated simulation stubs.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, warn};

use crate::app::ports::{ActuatorPort, DisplayPort, SensorPort};
use crate::drivers::buzzer::Buzzer;
use crate::drivers::indicator_led::IndicatorLed;
use crate::drivers::ir_sensor::IrSensor;
use crate::drivers::lcd::Lcd;
use crate::drivers::motor::MotorDriver;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<I, D> {
    motor: MotorDriver,
    dispense_ir: IrSensor,
    hand_ir: IrSensor,
    buzzer: Buzzer,
    indicator: IndicatorLed,
    lcd: Option<Lcd<I, D>>,
}

impl<I: I2c, D: DelayNs> HardwareAdapter<I, D> {
    /// `lcd` is `None` when the panel failed to initialise; the device
    /// keeps dispensing without it.
    pub fn new(lcd: Option<Lcd<I, D>>) -> Self {
        Self {
            motor: MotorDriver::new(),
            dispense_ir: IrSensor::dispense(),
            hand_ir: IrSensor::hand(),
            buzzer: Buzzer::new(),
            indicator: IndicatorLed::new(),
            lcd,
        }
    }

    pub fn motor(&self) -> &MotorDriver {
        &self.motor
    }

    pub fn has_display(&self) -> bool {
        self.lcd.is_some()
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<I: I2c, D: DelayNs> SensorPort for HardwareAdapter<I, D> {
    fn read_dispense_sensor(&mut self) -> bool {
        self.dispense_ir.detected()
    }

    fn read_hand_sensor(&mut self) -> bool {
        self.hand_ir.detected()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<I: I2c, D: DelayNs> ActuatorPort for HardwareAdapter<I, D> {
    fn motor_forward(&mut self) {
        self.motor.forward();
    }

    fn motor_stop(&mut self) {
        self.motor.stop();
    }

    fn sound_cue(&mut self, on: bool) {
        self.buzzer.set(on);
    }

    fn set_failure_indicator(&mut self, on: bool) {
        if self.indicator.is_lit() != on {
            debug!("Indicator: {}", if on { "lit" } else { "cleared" });
        }
        self.indicator.set(on);
    }
}

// ── DisplayPort implementation ────────────────────────────────

impl<I: I2c, D: DelayNs> DisplayPort for HardwareAdapter<I, D> {
    fn show_text(&mut self, line1: &str, line2: &str) {
        let Some(lcd) = self.lcd.as_mut() else {
            debug!("LCD(absent) | {} | {}", line1, line2);
            return;
        };
        if let Err(e) = lcd.show(line1, line2) {
            warn!("LCD write failed: {:?}", e);
        }
    }
}
