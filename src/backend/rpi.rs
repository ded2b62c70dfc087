//! Raspberry Pi GPIO facility backed by `rppal`.

use std::collections::HashMap;

use rppal::gpio::{Gpio, InputPin, OutputPin};

use super::{Level, Numbering, PinBackend};
use crate::error::Error;

/// Physical header position to BCM channel for the 40-pin header.
/// Power, ground and the unnumbered position 0 map to `None`.
#[rustfmt::skip]
const HEADER: [Option<u8>; 41] = [
    None,
    None,     None,     // 1: 3V3,    2: 5V
    Some(2),  None,     // 3: GPIO2,  4: 5V
    Some(3),  None,     // 5: GPIO3,  6: GND
    Some(4),  Some(14), // 7: GPIO4,  8: GPIO14
    None,     Some(15), // 9: GND,   10: GPIO15
    Some(17), Some(18),
    Some(27), None,
    Some(22), Some(23),
    None,     Some(24), // 17: 3V3
    Some(10), None,
    Some(9),  Some(25),
    Some(11), Some(8),
    None,     Some(7),
    Some(0),  Some(1),  // 27/28: ID EEPROM pins
    Some(5),  None,
    Some(6),  Some(12),
    Some(13), None,
    Some(19), Some(16),
    Some(26), Some(20),
    None,     Some(21), // 39: GND,  40: GPIO21
];

/// GPIO facility of the Pi itself.
///
/// Activation opens the memory-mapped GPIO block; shutdown drops every
/// claimed pin handle, which lets `rppal` restore each pin to its
/// previous state.
#[derive(Default)]
pub struct RpiBackend {
    gpio: Option<Gpio>,
    numbering: Numbering,
    outputs: HashMap<u8, OutputPin>,
    inputs: HashMap<u8, InputPin>,
}

impl RpiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, pin: u8) -> Result<u8, Error> {
        match self.numbering {
            Numbering::Bcm => Ok(pin),
            Numbering::Board => HEADER
                .get(usize::from(pin))
                .copied()
                .flatten()
                .ok_or(Error::PinUnavailable(pin)),
        }
    }

    fn claim(&mut self, pin: u8) -> Result<rppal::gpio::Pin, Error> {
        if self.outputs.contains_key(&pin) || self.inputs.contains_key(&pin) {
            return Err(Error::PinClaimed(pin));
        }
        let gpio = self
            .gpio
            .as_ref()
            .ok_or_else(|| Error::SubsystemUnavailable("facility is not active".into()))?;
        let channel = self.channel(pin)?;
        Ok(gpio.get(channel)?)
    }
}

impl PinBackend for RpiBackend {
    fn activate(&mut self, numbering: Numbering) -> Result<(), Error> {
        if self.gpio.is_none() {
            let gpio = Gpio::new()
                .map_err(|err| Error::SubsystemUnavailable(err.to_string()))?;
            self.gpio = Some(gpio);
        }
        self.numbering = numbering;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.outputs.clear();
        self.inputs.clear();
        self.gpio = None;
    }

    fn claim_output(&mut self, pin: u8, initial: Level) -> Result<(), Error> {
        let claimed = self.claim(pin)?;
        let output = match initial {
            Level::Low => claimed.into_output_low(),
            Level::High => claimed.into_output_high(),
        };
        self.outputs.insert(pin, output);
        Ok(())
    }

    fn claim_input(&mut self, pin: u8) -> Result<(), Error> {
        let claimed = self.claim(pin)?;
        self.inputs.insert(pin, claimed.into_input());
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), Error> {
        let output = self
            .outputs
            .get_mut(&pin)
            .ok_or(Error::NotAnOutput(pin))?;
        match level {
            Level::Low => output.set_low(),
            Level::High => output.set_high(),
        }
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, Error> {
        let input = self.inputs.get(&pin).ok_or(Error::NotAnInput(pin))?;
        Ok(Level::from(input.is_high()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_translation() {
        let backend = RpiBackend {
            numbering: Numbering::Board,
            ..RpiBackend::new()
        };
        // physical 12 is GPIO18, physical 40 is GPIO21
        assert_eq!(backend.channel(12).unwrap(), 18);
        assert_eq!(backend.channel(40).unwrap(), 21);
        // power and ground positions are not claimable
        assert!(matches!(backend.channel(1), Err(Error::PinUnavailable(1))));
        assert!(matches!(backend.channel(6), Err(Error::PinUnavailable(6))));
        assert!(matches!(
            backend.channel(41),
            Err(Error::PinUnavailable(41))
        ));
    }

    #[test]
    fn test_bcm_passthrough() {
        let backend = RpiBackend::new();
        assert_eq!(backend.channel(18).unwrap(), 18);
    }
}
