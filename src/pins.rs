//! GPIO / peripheral pin assignments for the SmartMed dispenser board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Dispense motor (L298N-style H-bridge, one direction used)
// ---------------------------------------------------------------------------

/// Bridge input 1: HIGH with IN2 LOW drives the carousel forward.
pub const MOTOR_IN1_GPIO: i32 = 12;
/// Bridge input 2: held LOW in normal operation.
pub const MOTOR_IN2_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// IR obstacle sensors (active-LOW open-collector outputs)
// ---------------------------------------------------------------------------

/// Dispense chute sensor.  LOW = pill passing.
/// GPIO34..39 are input-only and have no internal pull resistors.
pub const IR_DISPENSE_GPIO: i32 = 34;
/// Pickup tray sensor.  LOW = hand present.
pub const IR_HAND_GPIO: i32 = 35;

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Active buzzer (HIGH = sounding).
pub const BUZZER_GPIO: i32 = 25;
/// Red "missed dose" LED (HIGH = lit).
pub const LED_MISS_GPIO: i32 = 27;

// ---------------------------------------------------------------------------
// I²C bus — 16×2 character LCD on a PCF8574 backpack
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// Bus clock (standard mode).
pub const I2C_FREQ_HZ: u32 = 100_000;

/// 7-bit address of the PCF8574 backpack (A0..A2 strapped high).
pub const LCD_I2C_ADDR: u8 = 0x27;
pub const LCD_COLS: usize = 16;
pub const LCD_ROWS: usize = 2;
