//! Timing collaborator for drivers with mandatory settle times.
//!
//! Bit-banged protocols like the HD44780 enable strobe need minimum hold
//! durations between pin transitions. Drivers take the delay as a trait
//! object so tests can substitute a recording fake (see [crate::sim::SimDelay]).

use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

pub trait Delay: Debug {
    /// Blocks for at least the given duration.
    fn hold(&self, duration: Duration);
}

/// [Delay] implementation backed by [std::thread::sleep].
///
/// The kernel may oversleep; that is fine here, every LCD timing constraint
/// is a minimum.
#[derive(Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn hold(&self, duration: Duration) {
        sleep(duration);
    }
}
