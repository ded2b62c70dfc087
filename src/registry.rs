//! Shared lifecycle of the pin facility.
//!
//! The facility behind a [`Registry`] is activated when the first bus
//! opens on it and shut down exactly once when the last bus is
//! released. Ownership is explicit: a registry is a value handed to
//! [`Registry::open`], not a process global, so tests run one registry
//! per fake facility.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::backend::{Level, Numbering, PinBackend};
use crate::bus::{Bus, PinMap};
use crate::error::Error;

pub(crate) struct Shared<B: PinBackend> {
    pub(crate) backend: B,
    numbering: Numbering,
    live: usize,
}

impl<B: PinBackend> Shared<B> {
    fn acquire(&mut self) -> Result<(), Error> {
        if self.live == 0 {
            self.backend.activate(self.numbering)?;
            debug!("pin facility activated ({:?} numbering)", self.numbering);
        }
        self.live += 1;
        Ok(())
    }

    pub(crate) fn release(&mut self) {
        self.live -= 1;
        if self.live == 0 {
            self.backend.shutdown();
            debug!("pin facility shut down");
        }
    }
}

/// Tracks how many buses are open on one pin facility.
///
/// Cloning a `Registry` clones the handle; all clones count into the
/// same facility. Single-threaded by design, like the rest of the
/// crate: handles are not `Send`.
pub struct Registry<B: PinBackend> {
    shared: Rc<RefCell<Shared<B>>>,
}

impl<B: PinBackend> Clone for Registry<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<B: PinBackend> Registry<B> {
    /// Wrap a facility. `numbering` is fixed here and applied verbatim
    /// on every re-activation, so all buses see one consistent scheme.
    pub fn new(backend: B, numbering: Numbering) -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                backend,
                numbering,
                live: 0,
            })),
        }
    }

    /// Open a bus on the given pins.
    ///
    /// Acquires the facility (activating it if this is the first open
    /// bus), then claims each mapped pin with its idle state: data-out
    /// low, clock low, chip-select high, data-in as input. Absent
    /// optional lines are skipped. Any failure releases the
    /// acquisition again and returns the error; there is no partial
    /// bus and no retry.
    pub fn open(&self, pins: PinMap, verbose: bool) -> Result<Bus<B>, Error> {
        {
            let mut shared = self.shared.borrow_mut();
            shared.acquire()?;
            if let Err(err) = Self::claim(&mut shared.backend, &pins) {
                shared.release();
                return Err(err);
            }
        }
        Ok(Bus::new(Rc::clone(&self.shared), pins, verbose))
    }

    fn claim(backend: &mut B, pins: &PinMap) -> Result<(), Error> {
        if let Some(mosi) = pins.mosi {
            backend.claim_output(mosi, Level::Low)?;
        }
        if let Some(miso) = pins.miso {
            backend.claim_input(miso)?;
        }
        backend.claim_output(pins.clk, Level::Low)?;
        backend.claim_output(pins.cs, Level::High)?;
        Ok(())
    }

    /// Number of buses currently open on this registry.
    pub fn live(&self) -> usize {
        self.shared.borrow().live
    }
}
