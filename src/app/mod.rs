//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the SmartMed dispenser:
//! command parsing and dispatch, notification encoding and the service
//! that ties the repository, scheduler and dispense cycle together.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod interpreter;
pub mod ports;
pub mod service;
