use crate::delay::Delay;
use crate::lcd::hd44780::{CursorDirection, Hd44780Driver};
use crate::{GpioBus, GpioOutput, GpioResult};
use log::trace;
use std::time::Duration;

/// Minimum width of the enable strobe. The controller latches the nibble on
/// the falling edge; the datasheet asks for 450 ns, so 1 us of margin.
const ENABLE_PULSE_WIDTH: Duration = Duration::from_micros(1);

/// Wait for Vcc to stabilize before the first command.
const POWER_ON_DELAY: Duration = Duration::from_millis(50);

/// Settle time after the clear-display instruction.
const CLEAR_SETTLE: Duration = Duration::from_millis(1);

/// Bit-banged HD44780 driver over a 4-bit data bus.
///
/// The interface is write-only: the RW pin is held low for every transfer,
/// and timing is enforced by fixed delays from the [Delay] collaborator
/// instead of busy-flag polling. Every operation blocks until the full pin
/// transaction (nibble latches plus settle time) has elapsed.
///
/// There is no internal locking; the pin set is one shared resource and the
/// protocol is not safely interruptible mid-nibble, so concurrent callers
/// must serialize around whole operations externally.
#[derive(Debug)]
pub struct GpioHd44780Driver<'a> {
    pin_en: &'a dyn GpioOutput,
    pin_rw: &'a dyn GpioOutput,
    pin_rs: &'a dyn GpioOutput,
    pin_backlight: &'a dyn GpioOutput,
    data_bus: &'a mut dyn GpioBus<4>,
    delay: &'a dyn Delay,

    last_printed: Option<String>,
}

impl<'a> GpioHd44780Driver<'a> {
    /// Creates a new driver over a 4-bit data bus.
    ///
    /// # Parameters
    ///
    /// - `pin_en`: Enable output pin, strobed to latch each nibble.
    /// - `pin_rw`: Read/write output pin, driven low (write) on every transfer.
    /// - `pin_rs`: Register select output pin.
    /// - `pin_backlight`: Backlight control output pin.
    /// - `data_bus`: Data bus in D4..D7 order.
    /// - `delay`: Timing collaborator for pulse widths and settle times.
    pub fn new_4bit(
        pin_en: &'a dyn GpioOutput,
        pin_rw: &'a dyn GpioOutput,
        pin_rs: &'a dyn GpioOutput,
        pin_backlight: &'a dyn GpioOutput,
        data_bus: &'a mut dyn GpioBus<4>,
        delay: &'a dyn Delay,
    ) -> Self {
        GpioHd44780Driver {
            pin_en,
            pin_rw,
            pin_rs,
            pin_backlight,
            data_bus,
            delay,
            last_printed: None,
        }
    }

    /// Presents one nibble on D4..D7 and strobes the enable pin.
    ///
    /// `value` carries the nibble in bits 3..0; bit 3 lands on D7.
    fn write_nibble(&mut self, value: u8, rs: bool) -> GpioResult<()> {
        trace!("Writing nibble: {:04b}, RS: {}", value, rs);

        self.pin_rw.write(false)?;
        self.pin_rs.write(rs)?;

        let bus = self.data_bus.as_output()?;
        bus.write_nibble(value)?;

        // Latch: EN high, hold for the minimum pulse width, EN low.
        self.pin_en.write(true)?;
        self.delay.hold(ENABLE_PULSE_WIDTH);
        self.pin_en.write(false)?;

        Ok(())
    }

    /// Sends one byte as two nibbles, high nibble first, with the RS mode
    /// held constant across both.
    fn send(&mut self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending byte: {:08b}, RS: {}", data, rs);

        self.write_nibble((data >> 4) & 0x0F, rs)?;
        self.write_nibble(data & 0x0F, rs)
    }
}

impl Hd44780Driver for GpioHd44780Driver<'_> {
    /// Runs the datasheet power-on sequence.
    ///
    /// After the power stabilization wait it sends `0011 0011` and
    /// `0011 0010` to force the controller into a known 8-bit state and then
    /// down to 4-bit mode, whatever mode it woke up in. Then function set
    /// (4-bit, two-line addressing, 5x8 font), display off, entry mode
    /// increment, display on with cursor and blink off, and a final clear.
    fn init(&mut self) -> GpioResult<()> {
        self.delay.hold(POWER_ON_DELAY);

        // Synchronize to 4-bit mode
        self.send(0b00110011, false)?;
        self.send(0b00110010, false)?;

        self.function_set(false, true, false)?;
        self.set_display_control(false, false, false)?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        self.set_display_control(true, false, false)?;
        self.clear_display()?;

        Ok(())
    }

    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(0b00000001)?;
        // Clear rewrites all of DDRAM; the controller needs real time here.
        self.delay.hold(CLEAR_SETTLE);
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        trace!("Backlight: {}", on);
        self.pin_backlight.write(on)
    }

    /// Streams the string bytes to the data register.
    ///
    /// Skips the transmission entirely when the previous call printed the
    /// exact same string; the cache holds one string and is overwritten
    /// after every call, so suppression never reaches further back than the
    /// immediately preceding print.
    fn print(&mut self, text: &str) -> GpioResult<()> {
        if self.last_printed.as_deref() != Some(text) {
            for &byte in text.as_bytes() {
                self.send(byte, true)?;
            }
        } else {
            trace!("Print suppressed, same string as previous call");
        }
        self.last_printed = Some(text.to_owned());
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvent, SimGpioDriver};
    use crate::{GpioDriver, GpioResult};

    const PIN_EN: usize = 0;
    const PIN_RW: usize = 1;
    const PIN_RS: usize = 2;
    const PIN_BL: usize = 3;
    const DATA_PINS: [usize; 4] = [4, 5, 6, 7];

    /// Sets up a simulated pin set and binds `$gpio` to the backend and
    /// `$lcd` to a driver wired to it.
    macro_rules! sim_lcd {
        ($gpio:ident, $lcd:ident) => {
            let $gpio = SimGpioDriver::new(8);
            let delay = $gpio.delay();
            let mut pin_en = $gpio.get_pin(PIN_EN).unwrap();
            let pin_en = pin_en.as_output().unwrap();
            let mut pin_rw = $gpio.get_pin(PIN_RW).unwrap();
            let pin_rw = pin_rw.as_output().unwrap();
            let mut pin_rs = $gpio.get_pin(PIN_RS).unwrap();
            let pin_rs = pin_rs.as_output().unwrap();
            let mut pin_bl = $gpio.get_pin(PIN_BL).unwrap();
            let pin_bl = pin_bl.as_output().unwrap();
            let mut data_bus = $gpio.get_pin_bus(DATA_PINS).unwrap();
            let mut $lcd = GpioHd44780Driver::new_4bit(
                &*pin_en,
                &*pin_rw,
                &*pin_rs,
                &*pin_bl,
                &mut *data_bus,
                &delay,
            );
        };
    }

    /// Nibbles latched on each EN rising edge, with the RS level at latch time.
    fn latched_nibbles(events: &[SimEvent]) -> Vec<(u8, bool)> {
        let mut rs = false;
        let mut bus = 0u8;
        let mut out = Vec::new();
        for event in events {
            match event {
                SimEvent::PinWrite { pin, state } => match *pin {
                    PIN_RS => rs = *state,
                    PIN_EN if *state => out.push((bus, rs)),
                    _ => {}
                },
                SimEvent::BusWrite { states, .. } => {
                    bus = 0;
                    for (i, &bit) in states.iter().enumerate() {
                        if bit {
                            bus |= 1 << i;
                        }
                    }
                }
                SimEvent::Hold { .. } => {}
            }
        }
        out
    }

    /// Bytes reassembled from nibble pairs, high nibble first.
    fn latched_bytes(events: &[SimEvent]) -> Vec<(u8, bool)> {
        let nibbles = latched_nibbles(events);
        assert_eq!(nibbles.len() % 2, 0, "nibbles must come in pairs");
        nibbles
            .chunks(2)
            .map(|pair| {
                let (high, rs_high) = pair[0];
                let (low, rs_low) = pair[1];
                assert_eq!(rs_high, rs_low, "RS must be constant across a byte");
                ((high << 4) | low, rs_high)
            })
            .collect()
    }

    #[test]
    fn init_emits_datasheet_sequence() {
        sim_lcd!(gpio, lcd);
        lcd.init().unwrap();

        let events = gpio.trace().events();
        assert_eq!(
            latched_bytes(&events),
            [0x33, 0x32, 0x28, 0x08, 0x06, 0x0C, 0x01]
                .map(|command| (command, false))
                .to_vec()
        );

        // Power stabilization wait comes before any pin activity, clear
        // settle after the last latch.
        assert_eq!(
            events.first(),
            Some(&SimEvent::Hold {
                duration: Duration::from_millis(50)
            })
        );
        assert_eq!(
            events.last(),
            Some(&SimEvent::Hold {
                duration: Duration::from_millis(1)
            })
        );
    }

    #[test]
    fn clear_emits_command_then_settle() {
        sim_lcd!(gpio, lcd);
        lcd.clear_display().unwrap();

        let events = gpio.trace().events();
        assert_eq!(latched_bytes(&events), vec![(0x01, false)]);
        assert_eq!(
            events.last(),
            Some(&SimEvent::Hold {
                duration: Duration::from_millis(1)
            })
        );
    }

    #[test]
    fn bytes_are_sent_high_nibble_first() {
        sim_lcd!(gpio, lcd);
        lcd.send_data(0xA5).unwrap();

        let events = gpio.trace().events();
        assert_eq!(latched_nibbles(&events), vec![(0xA, true), (0x5, true)]);
    }

    #[test]
    fn enable_pulse_brackets_every_nibble() {
        sim_lcd!(gpio, lcd);
        lcd.init().unwrap();
        lcd.print("OK").unwrap();

        let events = gpio.trace().events();
        let mut latches = 0;
        for (i, event) in events.iter().enumerate() {
            // RW stays in write mode for the whole session.
            if let SimEvent::PinWrite { pin: PIN_RW, state } = event {
                assert!(!state, "RW must be held low");
            }
            // Each EN assert is followed by a non-zero hold, then a deassert.
            if matches!(event, SimEvent::PinWrite { pin: PIN_EN, state: true }) {
                latches += 1;
                match (&events[i + 1], &events[i + 2]) {
                    (
                        SimEvent::Hold { duration },
                        SimEvent::PinWrite { pin: PIN_EN, state: false },
                    ) => assert!(*duration > Duration::ZERO),
                    other => panic!("malformed enable pulse at {i}: {other:?}"),
                }
            }
        }
        // 7 init commands plus 2 characters, 2 nibbles each.
        assert_eq!(latches, 18);
    }

    #[test]
    fn backlight_follows_requested_state() {
        sim_lcd!(gpio, lcd);

        lcd.set_backlight(true).unwrap();
        assert!(gpio.level(PIN_BL).unwrap());

        lcd.set_backlight(false).unwrap();
        assert!(!gpio.level(PIN_BL).unwrap());

        assert_eq!(
            gpio.trace().events(),
            vec![
                SimEvent::PinWrite { pin: PIN_BL, state: true },
                SimEvent::PinWrite { pin: PIN_BL, state: false },
            ]
        );
    }

    #[test]
    fn repeated_print_is_suppressed() {
        sim_lcd!(gpio, lcd);
        let trace = gpio.trace();

        lcd.print("READY").unwrap();
        assert_eq!(latched_bytes(&trace.events()).len(), 5);

        trace.clear();
        lcd.print("READY").unwrap();
        assert!(trace.is_empty(), "identical repeat must transmit nothing");
    }

    #[test]
    fn print_cache_remembers_one_string_back() {
        sim_lcd!(gpio, lcd);
        let trace = gpio.trace();

        lcd.print("A").unwrap();
        lcd.print("B").unwrap();
        trace.clear();

        // "A" was printed two calls ago, so it is transmitted again.
        lcd.print("A").unwrap();
        assert_eq!(latched_bytes(&trace.events()), vec![(b'A', true)]);
    }

    #[derive(Debug, Default)]
    struct RecordingDriver {
        commands: Vec<u8>,
    }

    impl Hd44780Driver for RecordingDriver {
        fn init(&mut self) -> GpioResult<()> {
            Ok(())
        }

        fn clear_display(&mut self) -> GpioResult<()> {
            self.send_command(0b00000001)
        }

        fn set_backlight(&mut self, _on: bool) -> GpioResult<()> {
            Ok(())
        }

        fn print(&mut self, _text: &str) -> GpioResult<()> {
            Ok(())
        }

        fn send_command(&mut self, command: u8) -> GpioResult<()> {
            self.commands.push(command);
            Ok(())
        }

        fn send_data(&mut self, _data: u8) -> GpioResult<()> {
            Ok(())
        }
    }

    #[test]
    fn set_cursor_matches_ddram_layout() {
        let mut driver = RecordingDriver::default();
        for (row, base) in [(0u8, 0x00u8), (1, 0x40), (2, 0x14), (3, 0x54)] {
            for col in 0..20 {
                driver.commands.clear();
                driver.set_cursor(col, row).unwrap();
                assert_eq!(driver.commands, vec![0x80 | (base + col)]);
            }
        }
    }

    #[test]
    fn set_cursor_out_of_range_row_falls_back_to_row_zero() {
        let mut driver = RecordingDriver::default();
        for row in [4u8, 5, 200] {
            for col in [0u8, 7, 19] {
                driver.commands.clear();
                driver.set_cursor(col, row).unwrap();
                assert_eq!(driver.commands, vec![0x80 + col]);
            }
        }
    }
}
