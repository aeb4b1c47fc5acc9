//! Core-local interrupter: the machine timer.

use crate::exception::Exception;
use crate::primitives::constants::{CLINT_MTIME, CLINT_MTIMECMP, DOUBLEWORD};
use crate::reg::csr::{state::State, MIP, MTIP_BIT};

/// `mtime`/`mtimecmp` as 64-bit MMIO registers. The device has no tick
/// source of its own; the cycle pump calls [`Clint::increment`].
#[derive(Debug)]
pub struct Clint {
    mtime: u64,
    mtimecmp: u64,
}

impl Clint {
    pub fn new() -> Self {
        Self {
            mtime: 0,
            mtimecmp: 0,
        }
    }

    /// Advance `mtime` by one tick and post a machine timer interrupt once
    /// an armed compare value is reached. `mtimecmp == 0` means the guest
    /// has not programmed the timer.
    pub fn increment(&mut self, state: &mut State) {
        self.mtime = self.mtime.wrapping_add(1);
        if self.mtimecmp != 0 && self.mtime >= self.mtimecmp {
            state.write(MIP, state.read(MIP) | MTIP_BIT);
        }
    }

    pub fn load(&self, addr: u64, size: u8) -> Result<u64, Exception> {
        if size != DOUBLEWORD {
            return Err(Exception::LoadAccessFault);
        }
        Ok(match addr {
            CLINT_MTIMECMP => self.mtimecmp,
            CLINT_MTIME => self.mtime,
            _ => 0,
        })
    }

    pub fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        if size != DOUBLEWORD {
            return Err(Exception::StoreAMOAccessFault);
        }
        match addr {
            CLINT_MTIMECMP => self.mtimecmp = value,
            CLINT_MTIME => self.mtime = value,
            _ => {}
        }
        Ok(())
    }
}
