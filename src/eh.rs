//! embedded-hal 1.x adapter.
//!
//! [`Bus`] implements [`embedded_hal::spi::SpiBus`] over `u8` words so
//! it can sit underneath any eh1 device driver. Per eh1 semantics the
//! adapter never touches chip-select; manage the select window with
//! [`Bus::cs_assert`] / [`Bus::cs_release`] or an `SpiDevice` wrapper.

use embedded_hal::spi::{self, ErrorKind, ErrorType, SpiBus};

use crate::backend::PinBackend;
use crate::bus::Bus;
use crate::error::Error;

impl spi::Error for Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl<B: PinBackend> ErrorType for Bus<B> {
    type Error = Error;
}

impl<B: PinBackend> SpiBus<u8> for Bus<B> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Error> {
        for word in words {
            *word = self.get(8, false)? as u8;
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Error> {
        for &word in words {
            self.put(u64::from(word), 8, false)?;
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Error> {
        let length = read.len().max(write.len());
        for i in 0..length {
            // the longer side governs; the shorter write side pads
            // with zeros and surplus inbound words are dropped
            let out = write.get(i).copied().unwrap_or(0);
            let (value, _, _) = self.exchange(u64::from(out), 8)?;
            if let Some(slot) = read.get_mut(i) {
                *slot = value as u8;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Error> {
        for word in words {
            let (value, _, _) = self.exchange(u64::from(*word), 8)?;
            *word = value as u8;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        // every pulse is driven synchronously; nothing is buffered
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::{Level, Numbering};
    use crate::bus::PinMap;
    use crate::registry::Registry;

    const PINS: PinMap = PinMap {
        clk: 11,
        cs: 8,
        mosi: Some(10),
        miso: Some(9),
    };

    fn open(mock: &MockBackend) -> Bus<MockBackend> {
        Registry::new(mock.clone(), Numbering::Bcm)
            .open(PINS, false)
            .unwrap()
    }

    #[test]
    fn test_transfer_in_place_loopback() {
        let mock = MockBackend::new();
        mock.wire(10, 9);
        let mut bus = open(&mock);
        let mut words = [0xA5, 0x00, 0xFF];
        bus.transfer_in_place(&mut words).unwrap();
        assert_eq!(words, [0xA5, 0x00, 0xFF]);
        // eh1 transfers leave chip-select alone
        assert_eq!(mock.writes_to(8), vec![Level::High]);
    }

    #[test]
    fn test_transfer_mismatched_lengths() {
        let mock = MockBackend::new();
        mock.wire(10, 9);
        let mut bus = open(&mock);
        let mut read = [0u8; 3];
        bus.transfer(&mut read, &[0x3C]).unwrap();
        // one real word, then zero padding clocked out
        assert_eq!(read, [0x3C, 0x00, 0x00]);
        assert_eq!(mock.rising_edges(11), 24);
    }

    #[test]
    fn test_write_then_read() {
        let mock = MockBackend::new();
        mock.script_input(9, "0110100110010110");
        let mut bus = open(&mock);
        SpiBus::write(&mut bus, &[0x81]).unwrap();
        let mut words = [0u8; 2];
        SpiBus::read(&mut bus, &mut words).unwrap();
        assert_eq!(words, [0x69, 0x96]);
        bus.flush().unwrap();
    }
}
