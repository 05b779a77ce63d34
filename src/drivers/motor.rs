//! Dispense motor driver (dual-input H-bridge).
//!
//! The carousel only ever turns one way: forward is IN1 HIGH / IN2 LOW,
//! stop is both LOW.  Bursts are timed by the dispense FSM; this driver
//! is a dumb actuator.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the two bridge inputs via hw_init helpers.
//! On host/test: the same helpers write the simulated level map.

use crate::drivers::hw_init;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Stopped,
    Forward,
}

pub struct MotorDriver {
    state: MotorState,
    bursts: u32,
}

impl Default for MotorDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorDriver {
    pub fn new() -> Self {
        Self {
            state: MotorState::Stopped,
            bursts: 0,
        }
    }

    pub fn forward(&mut self) {
        hw_init::gpio_write(pins::MOTOR_IN2_GPIO, false);
        hw_init::gpio_write(pins::MOTOR_IN1_GPIO, true);
        if self.state == MotorState::Stopped {
            self.bursts = self.bursts.wrapping_add(1);
        }
        self.state = MotorState::Forward;
    }

    pub fn stop(&mut self) {
        hw_init::gpio_write(pins::MOTOR_IN1_GPIO, false);
        hw_init::gpio_write(pins::MOTOR_IN2_GPIO, false);
        self.state = MotorState::Stopped;
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == MotorState::Forward
    }

    /// Number of stop→forward edges since boot.
    pub fn burst_count(&self) -> u32 {
        self.bursts
    }
}
