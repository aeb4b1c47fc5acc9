//! Guest RAM: a flat little-endian byte buffer at a fixed physical base.

use crate::exception::Exception;
use crate::primitives::constants::{BYTE, DOUBLEWORD, HALFWORD, RAM_BASE, RAM_SIZE, WORD};

#[derive(Debug)]
pub struct Ram {
    data: Vec<u8>,
}

impl Ram {
    /// Allocate the full RAM and place the kernel image at its base.
    pub fn new(kernel: &[u8]) -> Self {
        let mut data = vec![0; RAM_SIZE as usize];
        data[..kernel.len()].copy_from_slice(kernel);
        Self { data }
    }

    /// Load a `size`-bit little-endian value. `addr` is a physical address at
    /// or above [`RAM_BASE`].
    pub fn load(&self, addr: u64, size: u8) -> Result<u64, Exception> {
        let count = match size {
            BYTE | HALFWORD | WORD | DOUBLEWORD => (size / 8) as usize,
            _ => return Err(Exception::LoadAccessFault),
        };
        let index = (addr - RAM_BASE) as usize;
        if index + count > self.data.len() {
            return Err(Exception::LoadAccessFault);
        }

        let mut value = 0;
        for (i, byte) in self.data[index..index + count].iter().enumerate() {
            value |= u64::from(*byte) << (8 * i);
        }
        Ok(value)
    }

    /// Store the low `size` bits of `value`, little-endian.
    pub fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        let count = match size {
            BYTE | HALFWORD | WORD | DOUBLEWORD => (size / 8) as usize,
            _ => return Err(Exception::StoreAMOAccessFault),
        };
        let index = (addr - RAM_BASE) as usize;
        if index + count > self.data.len() {
            return Err(Exception::StoreAMOAccessFault);
        }

        for i in 0..count {
            self.data[index + i] = (value >> (8 * i)) as u8;
        }
        Ok(())
    }

    /// Borrow raw RAM bytes, e.g. the framebuffer region for a host display.
    /// `offset` and `len` are relative to the RAM base and must stay inside
    /// the buffer.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }
}
