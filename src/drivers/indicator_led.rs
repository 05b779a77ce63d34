//! Missed-dose indicator LED.
//!
//! Latches on when a dose is missed and stays lit until the next
//! successful pickup clears it.

use crate::drivers::hw_init;
use crate::pins;

pub struct IndicatorLed {
    lit: bool,
}

impl Default for IndicatorLed {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorLed {
    pub fn new() -> Self {
        Self { lit: false }
    }

    pub fn set(&mut self, lit: bool) {
        hw_init::gpio_write(pins::LED_MISS_GPIO, lit);
        self.lit = lit;
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
