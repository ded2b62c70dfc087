//! The bus instance: a role-to-pin mapping plus the transfer engine.
//!
//! Transfers are most-significant-bit first, one bit per clock pulse,
//! where a pulse is "raise the clock line, then lower it". The inbound
//! line is sampled after the pulse has completed; see [`Bus::get`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::backend::{Level, PinBackend};
use crate::error::Error;
use crate::registry::Shared;
use crate::wire::{self, BitRecord};

/// Bus wire roles, named in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Clock,
    ChipSelect,
    DataOut,
    DataIn,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Clock => "clock",
            Role::ChipSelect => "chip-select",
            Role::DataOut => "data-out",
            Role::DataIn => "data-in",
        })
    }
}

/// Physical pins backing each bus role.
///
/// `mosi` and `miso` are optional: a bus that only commands a
/// peripheral needs no return line, and a receive-only bus needs no
/// data-out. Every mapped pin must be distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    /// Clock line, output, idle low.
    pub clk: u8,
    /// Chip-select line, output, idle high (deselected).
    pub cs: u8,
    /// Data-out line, output, idle low.
    pub mosi: Option<u8>,
    /// Data-in line, input.
    pub miso: Option<u8>,
}

/// One software SPI bus.
///
/// Opened through [`Registry::open`](crate::Registry::open). Dropping
/// the bus releases its claim on the shared facility, shutting the
/// facility down when this was the last bus; the release runs on every
/// exit path from the owning scope, normal or unwinding.
///
/// All operations block until the last pulse has been driven. The bus
/// is single-threaded: drive it, and construct or drop instances, from
/// one thread of control only.
pub struct Bus<B: PinBackend> {
    shared: Rc<RefCell<Shared<B>>>,
    pins: PinMap,
    verbose: bool,
}

impl<B: PinBackend> Bus<B> {
    pub(crate) fn new(shared: Rc<RefCell<Shared<B>>>, pins: PinMap, verbose: bool) -> Self {
        Self {
            shared,
            pins,
            verbose,
        }
    }

    /// The pin mapping this bus was opened with.
    pub fn pins(&self) -> PinMap {
        self.pins
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), Error> {
        self.shared.borrow_mut().backend.write(pin, level)
    }

    fn read(&mut self, pin: u8) -> Result<Level, Error> {
        self.shared.borrow_mut().backend.read(pin)
    }

    /// One clock pulse: raise the line, then lower it.
    fn tick(&mut self) -> Result<(), Error> {
        self.write(self.pins.clk, Level::High)?;
        self.write(self.pins.clk, Level::Low)
    }

    /// Assert chip-select (drive it low).
    ///
    /// Only needed when composing several `control_cs = false`
    /// transfers inside one manually managed select window.
    pub fn cs_assert(&mut self) -> Result<(), Error> {
        self.write(self.pins.cs, Level::Low)
    }

    /// Return chip-select to idle (high).
    pub fn cs_release(&mut self) -> Result<(), Error> {
        self.write(self.pins.cs, Level::High)
    }

    fn data_out(&self) -> Result<u8, Error> {
        self.pins.mosi.ok_or(Error::LineUnassigned(Role::DataOut))
    }

    fn data_in(&self) -> Result<u8, Error> {
        self.pins.miso.ok_or(Error::LineUnassigned(Role::DataIn))
    }

    /// Deassert chip-select after a transfer body. The body's fault
    /// wins over a failure of the restore itself, so the caller always
    /// sees the original error with the bus back in its idle state.
    fn close_window<T>(
        &mut self,
        control_cs: bool,
        body: Result<T, Error>,
    ) -> Result<T, Error> {
        if control_cs {
            let restored = self.cs_release();
            let value = body?;
            restored?;
            Ok(value)
        } else {
            body
        }
    }

    /// Transmit the `bits` least-significant bits of `data`, MSB
    /// first.
    ///
    /// With `control_cs`, chip-select is asserted before the first
    /// pulse and restored to idle on every exit path, including a pin
    /// fault mid-loop. Pass `control_cs = false` to compose several
    /// transfers inside one [`cs_assert`](Bus::cs_assert) /
    /// [`cs_release`](Bus::cs_release) window.
    ///
    /// `bits == 0` drives no pulses at all.
    pub fn put(&mut self, data: u64, bits: u32, control_cs: bool) -> Result<(), Error> {
        let mosi = self.data_out()?;
        if control_cs {
            self.cs_assert()?;
        }
        let body = self.shift_out(mosi, data, bits);
        let sent = self.close_window(control_cs, body)?;
        if self.verbose {
            debug!("Sent [{}]", sent.as_str());
        }
        Ok(())
    }

    /// Receive `bits` bits, MSB first.
    ///
    /// Returns a value in `[0, 2^bits - 1]`; `bits == 0` drives no
    /// pulses and returns 0. Each bit is sampled once its clock pulse
    /// has been raised and lowered again, matching the wire traces of
    /// the hardware this was built against rather than an idealized
    /// rising-edge sample. Chip-select handling is the same as
    /// [`put`](Bus::put).
    pub fn get(&mut self, bits: u32, control_cs: bool) -> Result<u64, Error> {
        let miso = self.data_in()?;
        if control_cs {
            self.cs_assert()?;
        }
        let body = self.shift_in(miso, bits);
        let (value, received) = self.close_window(control_cs, body)?;
        if self.verbose {
            debug!("Recv [{}]", received.as_str());
        }
        Ok(value)
    }

    /// Full-duplex transfer: each pulse shifts one bit out and
    /// captures one bit in. Within an iteration the outbound bit is
    /// driven first, then the pulse runs, then the inbound line is
    /// sampled.
    ///
    /// Chip-select is always managed by this call; full-duplex
    /// transfers do not compose into a manual select window.
    pub fn put_get(&mut self, data: u64, bits: u32) -> Result<u64, Error> {
        // resolve both lines before chip-select moves at all
        self.data_out()?;
        self.data_in()?;
        self.cs_assert()?;
        let body = self.exchange(data, bits);
        let (value, sent, received) = self.close_window(true, body)?;
        if self.verbose {
            debug!("Sent [{}]", sent.as_str());
            debug!("Recv [{}]", received.as_str());
        }
        Ok(value)
    }

    fn shift_out(&mut self, mosi: u8, data: u64, bits: u32) -> Result<BitRecord, Error> {
        let mut sent = BitRecord::new();
        for pos in wire::msb_positions(bits) {
            let level = Level::from(wire::bit_at(data, pos));
            self.write(mosi, level)?;
            sent.push(level.is_high());
            self.tick()?;
        }
        Ok(sent)
    }

    fn shift_in(&mut self, miso: u8, bits: u32) -> Result<(u64, BitRecord), Error> {
        let mut value = 0u64;
        let mut received = BitRecord::new();
        for _ in 0..bits {
            self.tick()?;
            value <<= 1;
            let sample = self.read(miso)?;
            if sample.is_high() {
                value |= 1;
            }
            received.push(sample.is_high());
        }
        Ok((value, received))
    }

    pub(crate) fn exchange(
        &mut self,
        data: u64,
        bits: u32,
    ) -> Result<(u64, BitRecord, BitRecord), Error> {
        let mosi = self.data_out()?;
        let miso = self.data_in()?;
        let mut value = 0u64;
        let mut sent = BitRecord::new();
        let mut received = BitRecord::new();
        for pos in wire::msb_positions(bits) {
            let out = Level::from(wire::bit_at(data, pos));
            self.write(mosi, out)?;
            sent.push(out.is_high());
            self.tick()?;
            value <<= 1;
            let sample = self.read(miso)?;
            if sample.is_high() {
                value |= 1;
            }
            received.push(sample.is_high());
        }
        Ok((value, sent, received))
    }
}

impl<B: PinBackend> Drop for Bus<B> {
    fn drop(&mut self) {
        self.shared.borrow_mut().release();
    }
}
