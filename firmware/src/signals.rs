#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Red/green LED heads driven by the controller.
//!
//! Each approach has a red and a green lamp; caution lights both. Every write
//! is mirrored into the status block so observers can read the rendered heads
//! without taking the controller lock.

use intersection_core::approach::{APPROACH_COUNT, ApproachId, SignalOutput};
use intersection_core::controller::SignalSink;

use crate::status;

#[cfg(target_os = "none")]
use embassy_stm32::gpio::{Level, Output};

/// A single digital lamp output.
pub trait Lamp {
    fn set_lit(&mut self, lit: bool);
}

/// The LED heads sink current through the pin, so a lamp is lit while its pin
/// is low.
pub const fn pin_high(lit: bool) -> bool {
    !lit
}

#[cfg(target_os = "none")]
impl Lamp for Output<'_> {
    fn set_lit(&mut self, lit: bool) {
        self.set_level(Level::from(pin_high(lit)));
    }
}

/// Red and green lamps of one approach. Both lamps are active-low, so the
/// outputs are built high to start dark.
pub struct LampHead<L> {
    red: L,
    green: L,
}

impl<L: Lamp> LampHead<L> {
    pub const fn new(red: L, green: L) -> Self {
        Self { red, green }
    }

    fn show(&mut self, output: SignalOutput) {
        let (red, green) = output.lamp_levels();
        self.red.set_lit(red);
        self.green.set_lit(green);
    }
}

/// Signal sink rendering onto four LED heads, indexed by approach.
pub struct LedSignalSink<L> {
    heads: [LampHead<L>; APPROACH_COUNT],
}

impl<L: Lamp> LedSignalSink<L> {
    pub const fn new(heads: [LampHead<L>; APPROACH_COUNT]) -> Self {
        Self { heads }
    }
}

impl<L: Lamp> SignalSink for LedSignalSink<L> {
    fn set_signal(&mut self, approach: ApproachId, output: SignalOutput) {
        self.heads[approach.as_index()].show(output);
        status::record_output(approach, output);
    }
}

/// Initial level that leaves an active-low lamp dark.
#[cfg(target_os = "none")]
pub const DARK_LEVEL: Level = Level::High;

#[cfg(target_os = "none")]
pub type HardwareSignalSink = LedSignalSink<Output<'static>>;

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct MockLamp<'a>(&'a Cell<bool>);

    impl Lamp for MockLamp<'_> {
        fn set_lit(&mut self, lit: bool) {
            self.0.set(lit);
        }
    }

    #[test]
    fn heads_follow_signal_outputs() {
        let lamps: [Cell<bool>; 8] = Default::default();
        let head = |index: usize| LampHead::new(MockLamp(&lamps[index * 2]), MockLamp(&lamps[index * 2 + 1]));
        let mut sink = LedSignalSink::new([head(0), head(1), head(2), head(3)]);

        sink.set_signal(ApproachId::East, SignalOutput::Caution);
        assert!(lamps[2].get() && lamps[3].get());

        sink.set_signal(ApproachId::East, SignalOutput::Go);
        assert!(!lamps[2].get() && lamps[3].get());

        sink.blank_all();
        assert!(lamps.iter().all(|lamp| !lamp.get()));
    }

    /// Drives an active-low pin the way the `Output` impl does.
    struct ActiveLowPin<'a>(&'a Cell<bool>);

    impl Lamp for ActiveLowPin<'_> {
        fn set_lit(&mut self, lit: bool) {
            self.0.set(pin_high(lit));
        }
    }

    #[test]
    fn active_low_pins_follow_lamp_levels() {
        let pins: [Cell<bool>; 2] = [Cell::new(true), Cell::new(true)];
        let mut head = LampHead::new(ActiveLowPin(&pins[0]), ActiveLowPin(&pins[1]));

        head.show(SignalOutput::Stop);
        assert!(!pins[0].get(), "red pin driven low to light");
        assert!(pins[1].get(), "green pin held high to stay dark");

        head.show(SignalOutput::Go);
        assert!(pins[0].get() && !pins[1].get());

        head.show(SignalOutput::Off);
        assert!(pins[0].get() && pins[1].get());
    }
}
