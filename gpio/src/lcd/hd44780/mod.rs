//! HD44780 character LCD driver module.
//!
//! See the [Hd44780Driver] trait for the driver interface and
//! [GpioHd44780Driver] for the bit-banged GPIO implementation. The command
//! set is common to the HD44780 and its many clones (20x4 modules in
//! particular), so the trait is kept separate from the pin-level transport.

mod gpio;

use crate::{GpioError, GpioResult};
pub use gpio::*;
use std::fmt::Debug;

/// Low-level interface to an HD44780-compatible LCD controller.
///
/// Command bytes are assembled by the default methods here; putting them on
/// the wire (and honoring the controller's settle times) is the
/// implementation's job via [Hd44780Driver::send_command] and
/// [Hd44780Driver::send_data].
pub trait Hd44780Driver: Debug {
    /// Initializes the controller per the datasheet power-on sequence.
    ///
    /// Must be called once before any other operation; the controller's
    /// state is undefined until then. Waits out power stabilization, forces
    /// the interface into 4-bit mode, configures function set, entry mode
    /// and display control, and clears the display.
    fn init(&mut self) -> GpioResult<()>;

    /// Clears the display and returns the cursor to the home position.
    ///
    /// Clear is the slowest instruction the controller has; implementations
    /// must give it settle time before the next command.
    fn clear_display(&mut self) -> GpioResult<()>;

    /// Switches the backlight on or off. Purely combinational, no delay.
    fn set_backlight(&mut self, on: bool) -> GpioResult<()>;

    /// Writes a string at the current cursor position.
    ///
    /// If the exact same string was printed by the immediately preceding
    /// call, nothing is transmitted. The cache remembers one string back
    /// only: printing A, then B, then A again retransmits the second A.
    fn print(&mut self, text: &str) -> GpioResult<()>;

    /// Sets the display entry mode.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Sets the interface data length, line count, and font.
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> GpioResult<()> {
        let mut command = 0b00100000;
        if data_length {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the DDRAM address (the controller's cursor position register).
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        let command = 0b10000000 | address;
        self.send_command(command)
    }

    /// Moves the cursor to the given column and row.
    ///
    /// On 20x4 modules the rows are interleaved in DDRAM: row 0 starts at
    /// `0x00`, row 1 at `0x40`, row 2 at `0x14`, row 3 at `0x54`. Rows
    /// outside 0..=3 fall through to the row-0 base, silently mis-placing
    /// the cursor; that matches the controller's addressing scheme and is
    /// kept as-is.
    fn set_cursor(&mut self, col: u8, row: u8) -> GpioResult<()> {
        let base = match row {
            0 => 0x00,
            1 => 0x40,
            2 => 0x14,
            3 => 0x54,
            _ => 0x00,
        };
        self.set_ddram_address(base + col)
    }

    // Low-level primitives, implemented by the transport.

    /// Sends a command byte. Sets RS to 0 (command register).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends a data byte. Sets RS to 1 (data register).
    fn send_data(&mut self, data: u8) -> GpioResult<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}
