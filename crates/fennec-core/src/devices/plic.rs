//! Platform-level interrupt controller.
//!
//! Only the four registers the supervisor driver touches are backed by
//! state; every other offset in the window reads as zero and drops writes.

use crate::exception::Exception;
use crate::primitives::constants::{PLIC_PENDING, PLIC_SCLAIM, PLIC_SENABLE, PLIC_SPRIORITY, WORD};

#[derive(Debug)]
pub struct Plic {
    pending: u64,
    senable: u64,
    spriority: u64,
    sclaim: u64,
}

impl Plic {
    pub fn new() -> Self {
        Self {
            pending: 0,
            senable: 0,
            spriority: 0,
            sclaim: 0,
        }
    }

    /// Publish an IRQ as the current claim. The interrupt-poll path calls
    /// this right before raising SEIP.
    pub fn publish(&mut self, irq: u64) {
        self.sclaim = irq;
    }

    pub fn load(&self, addr: u64, size: u8) -> Result<u64, Exception> {
        if size != WORD {
            return Err(Exception::LoadAccessFault);
        }
        Ok(match addr {
            PLIC_PENDING => self.pending,
            PLIC_SENABLE => self.senable,
            PLIC_SPRIORITY => self.spriority,
            PLIC_SCLAIM => self.sclaim,
            _ => 0,
        })
    }

    pub fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        if size != WORD {
            return Err(Exception::StoreAMOAccessFault);
        }
        match addr {
            PLIC_PENDING => self.pending = value,
            PLIC_SENABLE => self.senable = value,
            PLIC_SPRIORITY => self.spriority = value,
            PLIC_SCLAIM => self.sclaim = value,
            _ => {}
        }
        Ok(())
    }
}
