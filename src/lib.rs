//! Software SPI driven entirely through general-purpose digital pins.
//!
//! Any four GPIO pins can act as the clock, chip-select and data wires
//! of a synchronous serial bus; no dedicated SPI peripheral is used.
//! Transfers are most-significant-bit first, one bit per clock pulse,
//! and fully blocking.
//!
//! A [`Registry`] owns the pin facility and tracks how many buses are
//! open on it: the facility comes up when the first bus opens and is
//! torn down when the last one is dropped. The facility itself sits
//! behind the [`PinBackend`] trait, so the same transfer engine runs
//! against real Raspberry Pi GPIO (feature `rpi`) or the in-memory
//! [`MockBackend`]:
//!
//! ```
//! use softspi::{MockBackend, Numbering, PinMap, Registry};
//!
//! let facility = MockBackend::new();
//! facility.wire(24, 23); // jumper data-out straight to data-in
//!
//! let registry = Registry::new(facility.clone(), Numbering::Bcm);
//! let mut bus = registry.open(
//!     PinMap { clk: 18, cs: 25, mosi: Some(24), miso: Some(23) },
//!     false,
//! )?;
//!
//! bus.put(0b10110100, 8, true)?;
//! assert_eq!(bus.put_get(0xA5, 8)?, 0xA5);
//!
//! drop(bus); // last bus released, facility shut down
//! assert!(!facility.is_active());
//! # Ok::<(), softspi::Error>(())
//! ```

pub mod backend;
pub mod bus;
pub mod eh;
pub mod error;
pub mod registry;
pub mod wire;

pub use embedded_hal::spi as eh_spi;

pub use backend::mock::MockBackend;
pub use backend::{Level, Numbering, PinBackend};
pub use bus::{Bus, PinMap, Role};
pub use error::Error;
pub use registry::Registry;

#[cfg(feature = "rpi")]
pub use backend::rpi::RpiBackend;
