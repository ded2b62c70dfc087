use thiserror::Error as DeriveError;

use crate::bus::Role;

/// Crate-wide error type.
///
/// Construction failures are fatal to the caller of
/// [`Registry::open`](crate::Registry::open); no partial bus is ever
/// returned. A fault in the middle of a transfer is re-signaled only
/// after chip-select has been restored to idle.
#[derive(DeriveError, Debug)]
pub enum Error {
    /// The digital-I/O facility could not be brought up at all.
    #[error("GPIO subsystem unavailable: {0}")]
    SubsystemUnavailable(String),

    /// The pin is already claimed, by another role or another bus.
    #[error("pin {0} is already claimed")]
    PinClaimed(u8),

    /// The pin does not exist on this facility.
    #[error("pin {0} is not a usable GPIO pin")]
    PinUnavailable(u8),

    /// The pin was used without being claimed first.
    #[error("pin {0} has not been claimed")]
    PinUnclaimed(u8),

    /// Write issued to a pin that is not claimed as an output.
    #[error("pin {0} is not an output")]
    NotAnOutput(u8),

    /// Read issued to a pin that is not claimed as an input.
    #[error("pin {0} is not an input")]
    NotAnInput(u8),

    /// A transfer needed a data line this bus was built without.
    #[error("no {0} line is mapped on this bus")]
    LineUnassigned(Role),

    /// Pin-level I/O fault in the middle of a transfer.
    #[error("I/O fault on pin {0}")]
    PinIo(u8),

    /// Error reported by the Raspberry Pi GPIO facility.
    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}
