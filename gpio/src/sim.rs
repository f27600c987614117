//! Software-simulated GPIO backend.
//!
//! Implements the same capability traits as the hardware backends, entirely
//! in memory, and records every pin transition and delay into an ordered
//! [SimTrace]. Drivers exercised against it can be checked at the wire
//! level without an LCD attached: which nibbles were latched, in which
//! order, and with which settle times in between.
//!
//! Single-threaded on purpose, like the drivers it stands in for; the trace
//! handle is an `Rc` and the backend is not `Send`.

use crate::delay::Delay;
use crate::{
    GpioBus, GpioBusInput, GpioBusOutput, GpioDriver, GpioError, GpioInput, GpioOutput, GpioPin,
    GpioResult,
};
use bitvec::vec::BitVec;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::sync::atomic::AtomicU8;
use std::time::Duration;

/// A single observable effect of a driver run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SimEvent {
    /// A single pin was driven to the given state.
    PinWrite { pin: usize, state: bool },
    /// A bus was driven as one unit; `states` follows the bus pin order.
    BusWrite { pins: Vec<usize>, states: Vec<bool> },
    /// The timing collaborator was asked to block.
    Hold { duration: Duration },
}

/// Shared, clonable handle over the recorded event list.
#[derive(Debug, Clone, Default)]
pub struct SimTrace {
    events: Rc<RefCell<Vec<SimEvent>>>,
}

impl SimTrace {
    pub fn record(&self, event: SimEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Returns a snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<SimEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

/// In-memory GPIO driver with a fixed number of pins, all initially low.
pub struct SimGpioDriver {
    pin_count: usize,
    levels: RefCell<Vec<bool>>,
    used_pins: BitVec<AtomicU8>,
    trace: SimTrace,
}

impl SimGpioDriver {
    pub fn new(pin_count: usize) -> Self {
        Self {
            pin_count,
            levels: RefCell::new(vec![false; pin_count]),
            used_pins: BitVec::repeat(false, pin_count),
            trace: SimTrace::default(),
        }
    }

    /// Gets a handle to the event trace.
    pub fn trace(&self) -> SimTrace {
        self.trace.clone()
    }

    /// Gets a [Delay] that records into this driver's trace without sleeping.
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            trace: self.trace.clone(),
        }
    }

    /// Reads the current level of a pin, regardless of who holds it.
    pub fn level(&self, index: usize) -> GpioResult<bool> {
        if index >= self.pin_count {
            return Err(GpioError::InvalidArgument);
        }
        Ok(self.levels.borrow()[index])
    }

    fn set_level(&self, index: usize, state: bool) {
        self.levels.borrow_mut()[index] = state;
    }
}

impl Debug for SimGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimGpioDriver({} pins)", self.pin_count)
    }
}

impl GpioDriver for SimGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.pin_count)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.pin_count {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);

        Ok(Box::new(SimPin {
            driver: self,
            pin_index: index,
        }))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        if indices.iter().any(|&index| index >= self.pin_count) {
            return Err(GpioError::InvalidArgument);
        }

        if indices.iter().any(|&index| self.used_pins[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for index in indices {
            self.used_pins.set_aliased(index, true);
        }

        Ok(Box::new(SimBus {
            driver: self,
            pin_indices: indices,
        }))
    }
}

struct SimPin<'a> {
    driver: &'a SimGpioDriver,
    pin_index: usize,
}

impl Debug for SimPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for SimPin<'_> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        Ok(Box::new(SimInput { pin: self }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        Ok(Box::new(SimOutput { pin: self }))
    }
}

impl Drop for SimPin<'_> {
    fn drop(&mut self) {
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}

struct SimInput<'a> {
    pin: &'a SimPin<'a>,
}

impl Debug for SimInput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.pin)
    }
}

impl GpioInput for SimInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        self.pin.driver.level(self.pin.pin_index)
    }
}

struct SimOutput<'a> {
    pin: &'a SimPin<'a>,
}

impl Debug for SimOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for SimOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.pin.driver.set_level(self.pin.pin_index, value);
        self.pin.driver.trace.record(SimEvent::PinWrite {
            pin: self.pin.pin_index,
            state: value,
        });
        Ok(())
    }
}

struct SimBus<'a, const N: usize> {
    driver: &'a SimGpioDriver,
    pin_indices: [usize; N],
}

impl<const N: usize> Debug for SimBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBus<N> for SimBus<'_, N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        Ok(Box::new(SimBusInput { bus: self }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        Ok(Box::new(SimBusOutput { bus: self }))
    }
}

impl<const N: usize> Drop for SimBus<'_, N> {
    fn drop(&mut self) {
        for &index in &self.pin_indices {
            self.driver.used_pins.set_aliased(index, false);
        }
    }
}

struct SimBusInput<'a, const N: usize> {
    bus: &'a SimBus<'a, N>,
}

impl<const N: usize> Debug for SimBusInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.bus)
    }
}

impl<const N: usize> GpioBusInput<N> for SimBusInput<'_, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        let mut values = [false; N];
        for (value, &index) in values.iter_mut().zip(&self.bus.pin_indices) {
            *value = self.bus.driver.level(index)?;
        }
        Ok(values)
    }
}

struct SimBusOutput<'a, const N: usize> {
    bus: &'a SimBus<'a, N>,
}

impl<const N: usize> Debug for SimBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.bus)
    }
}

impl<const N: usize> GpioBusOutput<N> for SimBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (&value, &index) in values.iter().zip(&self.bus.pin_indices) {
            self.bus.driver.set_level(index, value);
        }
        self.bus.driver.trace.record(SimEvent::BusWrite {
            pins: self.bus.pin_indices.to_vec(),
            states: values.to_vec(),
        });
        Ok(())
    }
}

/// A [Delay] that records [SimEvent::Hold] without actually blocking.
#[derive(Debug, Clone)]
pub struct SimDelay {
    trace: SimTrace,
}

impl Delay for SimDelay {
    fn hold(&self, duration: Duration) {
        self.trace.record(SimEvent::Hold { duration });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_are_handed_out_exclusively() {
        let gpio = SimGpioDriver::new(4);
        let _pin = gpio.get_pin(2).unwrap();
        assert_eq!(gpio.get_pin(2).unwrap_err(), GpioError::AlreadyInUse);
        assert_eq!(
            gpio.get_pin_bus([0, 1, 2]).unwrap_err(),
            GpioError::AlreadyInUse
        );
    }

    #[test]
    fn dropping_a_pin_releases_it() {
        let gpio = SimGpioDriver::new(4);
        {
            let _pin = gpio.get_pin(1).unwrap();
        }
        assert!(gpio.get_pin(1).is_ok());
    }

    #[test]
    fn out_of_range_pins_are_rejected() {
        let gpio = SimGpioDriver::new(4);
        assert_eq!(gpio.get_pin(4).unwrap_err(), GpioError::InvalidArgument);
        assert_eq!(
            gpio.get_pin_bus([1, 7]).unwrap_err(),
            GpioError::InvalidArgument
        );
    }

    #[test]
    fn writes_and_holds_are_traced_in_order() {
        let gpio = SimGpioDriver::new(4);
        let delay = gpio.delay();
        let mut pin = gpio.get_pin(0).unwrap();
        let out = pin.as_output().unwrap();

        out.write(true).unwrap();
        delay.hold(Duration::from_millis(2));
        out.write(false).unwrap();

        assert_eq!(
            gpio.trace().events(),
            vec![
                SimEvent::PinWrite { pin: 0, state: true },
                SimEvent::Hold {
                    duration: Duration::from_millis(2)
                },
                SimEvent::PinWrite { pin: 0, state: false },
            ]
        );
        assert!(!gpio.level(0).unwrap());
    }

    #[test]
    fn bus_nibble_writes_are_lsb_first_over_pin_order() {
        let gpio = SimGpioDriver::new(8);
        let mut bus = gpio.get_pin_bus([4, 5, 6, 7]).unwrap();
        let out = bus.as_output().unwrap();

        out.write_nibble(0b1010).unwrap();

        assert!(!gpio.level(4).unwrap());
        assert!(gpio.level(5).unwrap());
        assert!(!gpio.level(6).unwrap());
        assert!(gpio.level(7).unwrap());
    }

    #[test]
    fn levels_can_be_read_back_as_inputs() {
        let gpio = SimGpioDriver::new(8);

        let mut pin = gpio.get_pin(0).unwrap();
        pin.as_output().unwrap().write(true).unwrap();
        assert!(pin.as_input().unwrap().read().unwrap());

        let mut bus = gpio.get_pin_bus([4, 5, 6, 7]).unwrap();
        bus.as_output().unwrap().write_nibble(0b0110).unwrap();
        assert_eq!(bus.as_input().unwrap().read_nibble().unwrap(), 0b0110);
    }
}
