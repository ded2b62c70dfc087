//! In-memory pin facility for tests and simulation.
//!
//! The mock records every level driven on every pin, which is enough
//! to reconstruct the full wire trace of a transfer: which bits were
//! clocked out, how many pulses ran, and where chip-select moved.
//! Input pins are either scripted with a fixed bit sequence or wired
//! to mirror an output pin (a loopback jumper).

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::{Level, Numbering, PinBackend};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Output,
    Input,
}

#[derive(Default)]
struct State {
    active: bool,
    numbering: Option<Numbering>,
    activations: u32,
    shutdowns: u32,
    claims: HashMap<u8, Direction>,
    levels: HashMap<u8, Level>,
    writes: Vec<(u8, Level)>,
    scripts: HashMap<u8, VecDeque<Level>>,
    wiring: HashMap<u8, u8>,
    fail_writes_after: Option<u32>,
    refuse_activation: bool,
}

/// Simulated pin facility.
///
/// Clones share state, so a test can keep one handle for inspection
/// after moving another into a [`Registry`](crate::Registry).
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<State>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror `output` onto `input`: every read of `input` returns
    /// whatever was last driven on `output`. Takes precedence over a
    /// script on the same pin.
    pub fn wire(&self, output: u8, input: u8) {
        self.state.borrow_mut().wiring.insert(input, output);
    }

    /// Queue the levels returned by successive reads of `pin`, given
    /// as a bitstring such as `"1100000011"`. Reads past the end of
    /// the script return low (a floating line).
    pub fn script_input(&self, pin: u8, bits: &str) {
        let script = bits.chars().map(|c| Level::from(c == '1')).collect();
        self.state.borrow_mut().scripts.insert(pin, script);
    }

    /// Let `writes` more writes succeed, then fail the next one with
    /// [`Error::PinIo`]. One-shot: writes after the failed one succeed
    /// again.
    pub fn fail_writes_after(&self, writes: u32) {
        self.state.borrow_mut().fail_writes_after = Some(writes);
    }

    /// Make every activation attempt fail, simulating a facility that
    /// cannot be reached at all.
    pub fn refuse_activation(&self) {
        self.state.borrow_mut().refuse_activation = true;
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    /// Number of times the facility was brought up.
    pub fn activations(&self) -> u32 {
        self.state.borrow().activations
    }

    /// Number of times the facility was torn down.
    pub fn shutdowns(&self) -> u32 {
        self.state.borrow().shutdowns
    }

    /// Numbering scheme seen on the most recent activation.
    pub fn numbering(&self) -> Option<Numbering> {
        self.state.borrow().numbering
    }

    /// Current level of a pin, if it was ever driven.
    pub fn level(&self, pin: u8) -> Option<Level> {
        self.state.borrow().levels.get(&pin).copied()
    }

    /// Every write in order, including the initial level of each
    /// output claim.
    pub fn writes(&self) -> Vec<(u8, Level)> {
        self.state.borrow().writes.clone()
    }

    /// Levels driven on one pin, in order.
    pub fn writes_to(&self, pin: u8) -> Vec<Level> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|(p, _)| *p == pin)
            .map(|(_, level)| *level)
            .collect()
    }

    /// Number of low-to-high transitions driven on `pin`.
    pub fn rising_edges(&self, pin: u8) -> usize {
        let mut edges = 0;
        let mut current = Level::Low;
        for level in self.writes_to(pin) {
            if level.is_high() && !current.is_high() {
                edges += 1;
            }
            current = level;
        }
        edges
    }

    /// Bit sequence observed on `data` at each rising edge of `clk`,
    /// replayed from the write log.
    pub fn driven_bits(&self, data: u8, clk: u8) -> String {
        let state = self.state.borrow();
        let mut data_level = Level::Low;
        let mut clk_level = Level::Low;
        let mut bits = String::new();
        for &(pin, level) in &state.writes {
            if pin == data {
                data_level = level;
            }
            if pin == clk {
                if level.is_high() && !clk_level.is_high() {
                    bits.push(if data_level.is_high() { '1' } else { '0' });
                }
                clk_level = level;
            }
        }
        bits
    }

    fn check_active(state: &State) -> Result<(), Error> {
        if state.active {
            Ok(())
        } else {
            Err(Error::SubsystemUnavailable("facility is not active".into()))
        }
    }
}

impl PinBackend for MockBackend {
    fn activate(&mut self, numbering: Numbering) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        if state.refuse_activation {
            return Err(Error::SubsystemUnavailable("simulated outage".into()));
        }
        state.numbering = Some(numbering);
        state.active = true;
        state.activations += 1;
        Ok(())
    }

    fn shutdown(&mut self) {
        let mut state = self.state.borrow_mut();
        state.claims.clear();
        state.levels.clear();
        state.active = false;
        state.shutdowns += 1;
    }

    fn claim_output(&mut self, pin: u8, initial: Level) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        Self::check_active(&state)?;
        if state.claims.contains_key(&pin) {
            return Err(Error::PinClaimed(pin));
        }
        state.claims.insert(pin, Direction::Output);
        state.levels.insert(pin, initial);
        state.writes.push((pin, initial));
        Ok(())
    }

    fn claim_input(&mut self, pin: u8) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        Self::check_active(&state)?;
        if state.claims.contains_key(&pin) {
            return Err(Error::PinClaimed(pin));
        }
        state.claims.insert(pin, Direction::Input);
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        Self::check_active(&state)?;
        match state.claims.get(&pin) {
            Some(Direction::Output) => {}
            Some(Direction::Input) => return Err(Error::NotAnOutput(pin)),
            None => return Err(Error::PinUnclaimed(pin)),
        }
        if let Some(left) = state.fail_writes_after.as_mut() {
            if *left == 0 {
                state.fail_writes_after = None;
                return Err(Error::PinIo(pin));
            }
            *left -= 1;
        }
        state.levels.insert(pin, level);
        state.writes.push((pin, level));
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, Error> {
        let mut state = self.state.borrow_mut();
        Self::check_active(&state)?;
        match state.claims.get(&pin) {
            Some(Direction::Input) => {}
            Some(Direction::Output) => return Err(Error::NotAnInput(pin)),
            None => return Err(Error::PinUnclaimed(pin)),
        }
        if let Some(source) = state.wiring.get(&pin) {
            return Ok(state.levels.get(source).copied().unwrap_or(Level::Low));
        }
        let sample = state
            .scripts
            .get_mut(&pin)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Level::Low);
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_mock() -> MockBackend {
        let mut mock = MockBackend::new();
        mock.activate(Numbering::Bcm).unwrap();
        mock
    }

    #[test]
    fn test_double_claim_rejected() {
        let mut mock = active_mock();
        mock.claim_output(4, Level::Low).unwrap();
        assert!(matches!(
            mock.claim_input(4),
            Err(Error::PinClaimed(4))
        ));
    }

    #[test]
    fn test_unclaimed_pin_rejected() {
        let mut mock = active_mock();
        assert!(matches!(
            mock.write(9, Level::High),
            Err(Error::PinUnclaimed(9))
        ));
        assert!(matches!(mock.read(9), Err(Error::PinUnclaimed(9))));
    }

    #[test]
    fn test_direction_enforced() {
        let mut mock = active_mock();
        mock.claim_output(4, Level::Low).unwrap();
        mock.claim_input(5).unwrap();
        assert!(matches!(mock.read(4), Err(Error::NotAnInput(4))));
        assert!(matches!(
            mock.write(5, Level::High),
            Err(Error::NotAnOutput(5))
        ));
    }

    #[test]
    fn test_wired_input_mirrors_output() {
        let mut mock = active_mock();
        mock.claim_output(4, Level::Low).unwrap();
        mock.claim_input(5).unwrap();
        mock.wire(4, 5);
        assert_eq!(mock.read(5).unwrap(), Level::Low);
        mock.write(4, Level::High).unwrap();
        assert_eq!(mock.read(5).unwrap(), Level::High);
    }

    #[test]
    fn test_script_consumed_in_order() {
        let mut mock = active_mock();
        mock.claim_input(5).unwrap();
        mock.script_input(5, "101");
        assert_eq!(mock.read(5).unwrap(), Level::High);
        assert_eq!(mock.read(5).unwrap(), Level::Low);
        assert_eq!(mock.read(5).unwrap(), Level::High);
        // exhausted script reads as a floating (low) line
        assert_eq!(mock.read(5).unwrap(), Level::Low);
    }

    #[test]
    fn test_shutdown_releases_claims() {
        let mut mock = active_mock();
        mock.claim_output(4, Level::Low).unwrap();
        mock.shutdown();
        mock.activate(Numbering::Bcm).unwrap();
        mock.claim_output(4, Level::Low).unwrap();
        assert_eq!(mock.activations(), 2);
        assert_eq!(mock.shutdowns(), 1);
    }

    #[test]
    fn test_rising_edges_and_driven_bits() {
        let mut mock = active_mock();
        mock.claim_output(1, Level::Low).unwrap();
        mock.claim_output(2, Level::Low).unwrap();
        for bit in [true, false, true] {
            mock.write(1, Level::from(bit)).unwrap();
            mock.write(2, Level::High).unwrap();
            mock.write(2, Level::Low).unwrap();
        }
        assert_eq!(mock.rising_edges(2), 3);
        assert_eq!(mock.driven_bits(1, 2), "101");
    }
}
