//! IR obstacle sensor driver.
//!
//! The FC-51 style modules pull their output LOW while an object reflects
//! the beam.  [`IrSensor::detected`] hides the inversion so callers deal
//! in "something is there" rather than pin levels.

use crate::drivers::hw_init;
use crate::pins;

pub struct IrSensor {
    pin: i32,
    label: &'static str,
}

impl IrSensor {
    pub const fn new(pin: i32, label: &'static str) -> Self {
        Self { pin, label }
    }

    /// Pill chute sensor.
    pub const fn dispense() -> Self {
        Self::new(pins::IR_DISPENSE_GPIO, "dispense")
    }

    /// Pickup tray sensor.
    pub const fn hand() -> Self {
        Self::new(pins::IR_HAND_GPIO, "hand")
    }

    /// `true` while the beam is interrupted.
    pub fn detected(&self) -> bool {
        level_means_detected(hw_init::gpio_read(self.pin))
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Active-low polarity.
#[inline]
pub const fn level_means_detected(level_high: bool) -> bool {
    !level_high
}
