//! HD44780 character LCD behind a PCF8574 I²C backpack.
//!
//! The expander drives the panel in 4-bit mode; every byte goes out as
//! two nibbles, each latched by pulsing EN.
//!
//! ```text
//!  PCF8574 bit:  7   6   5   4   3   2   1   0
//!                D7  D6  D5  D4  BL  EN  RW  RS
//! ```
//!
//! Generic over `embedded-hal` 1.0 [`I2c`] and [`DelayNs`] so the driver
//! runs against `esp-idf-hal` on target and a recording bus in tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::pins;

// ── Backpack bits ─────────────────────────────────────────────

const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

// ── HD44780 instructions ──────────────────────────────────────

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE: u8 = 0x04;
const CMD_DISPLAY_CTRL: u8 = 0x08;
const CMD_FUNCTION_SET: u8 = 0x20;
const CMD_SET_DDRAM: u8 = 0x80;

const ENTRY_LEFT: u8 = 0x02;
const DISPLAY_ON: u8 = 0x04;
const FUNCTION_2LINE: u8 = 0x08;

const ROW_OFFSETS: [u8; 2] = [0x00, 0x40];

pub struct Lcd<I, D> {
    i2c: I,
    delay: D,
    addr: u8,
    backlight: u8,
}

impl<I: I2c, D: DelayNs> Lcd<I, D> {
    pub fn new(i2c: I, delay: D, addr: u8) -> Self {
        Self {
            i2c,
            delay,
            addr,
            backlight: BACKLIGHT,
        }
    }

    /// Panel at the board's default address.
    pub fn on_board(i2c: I, delay: D) -> Self {
        Self::new(i2c, delay, pins::LCD_I2C_ADDR)
    }

    /// Power-on initialisation into 4-bit, two-line mode.
    pub fn init(&mut self) -> Result<(), I::Error> {
        self.delay.delay_ms(50);
        self.expander_write(0)?;

        // Three 8-bit function sets, then the switch to 4-bit.
        self.write_nibble(0x30, 0)?;
        self.delay.delay_us(4500);
        self.write_nibble(0x30, 0)?;
        self.delay.delay_us(4500);
        self.write_nibble(0x30, 0)?;
        self.delay.delay_us(150);
        self.write_nibble(0x20, 0)?;

        self.command(CMD_FUNCTION_SET | FUNCTION_2LINE)?;
        self.command(CMD_DISPLAY_CTRL | DISPLAY_ON)?;
        self.clear()?;
        self.command(CMD_ENTRY_MODE | ENTRY_LEFT)
    }

    pub fn set_backlight(&mut self, on: bool) -> Result<(), I::Error> {
        self.backlight = if on { BACKLIGHT } else { 0 };
        self.expander_write(0)
    }

    pub fn clear(&mut self) -> Result<(), I::Error> {
        self.command(CMD_CLEAR)?;
        self.delay.delay_us(2000);
        Ok(())
    }

    pub fn set_cursor(&mut self, col: u8, row: usize) -> Result<(), I::Error> {
        let offset = ROW_OFFSETS[row.min(ROW_OFFSETS.len() - 1)];
        self.command(CMD_SET_DDRAM | (offset + col))
    }

    /// Write text at the cursor.  Non-ASCII characters print as `?`;
    /// anything past the panel width is dropped.
    pub fn print(&mut self, text: &str) -> Result<(), I::Error> {
        for c in text.chars().take(pins::LCD_COLS) {
            let byte = if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' };
            self.send(byte, RS)?;
        }
        Ok(())
    }

    /// Clear and show two lines.
    pub fn show(&mut self, line1: &str, line2: &str) -> Result<(), I::Error> {
        self.clear()?;
        self.print(line1)?;
        if !line2.is_empty() {
            self.set_cursor(0, 1)?;
            self.print(line2)?;
        }
        Ok(())
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    // ── Low level ─────────────────────────────────────────────

    fn command(&mut self, cmd: u8) -> Result<(), I::Error> {
        self.send(cmd, 0)
    }

    fn send(&mut self, value: u8, mode: u8) -> Result<(), I::Error> {
        self.write_nibble(value & 0xF0, mode)?;
        self.write_nibble((value << 4) & 0xF0, mode)
    }

    fn write_nibble(&mut self, nibble: u8, mode: u8) -> Result<(), I::Error> {
        let bits = nibble | mode;
        self.expander_write(bits | EN)?;
        self.delay.delay_us(1);
        self.expander_write(bits)?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn expander_write(&mut self, bits: u8) -> Result<(), I::Error> {
        self.i2c.write(self.addr, &[bits | self.backlight])
    }
}
