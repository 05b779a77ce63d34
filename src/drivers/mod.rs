//! Actuator and sensor drivers, hardware initialisation, and peripheral helpers.

pub mod buzzer;
pub mod hw_init;
pub mod indicator_led;
pub mod ir_sensor;
pub mod lcd;
pub mod motor;
pub mod watchdog;
