//! Block device with a plain register layout and synchronous DMA.
//!
//! The guest fills the buffer/length/sector/direction registers and writes
//! `notify`; the next interrupt poll performs the whole transfer and
//! acknowledges it by clearing `done` and resetting `notify`. The transfer
//! itself lives on the bus (it moves bytes between RAM and the backing
//! buffer), see `Bus::disk_access`.

use crate::exception::Exception;
use crate::primitives::constants::{DISK_BUFFER_ADDR_HIGH, DISK_BUFFER_ADDR_LOW, DISK_BUFFER_LEN_HIGH, DISK_BUFFER_LEN_LOW, DISK_DIRECTION, DISK_DONE, DISK_MAGIC, DISK_NOTIFY, DISK_SECTOR, DISK_VERSION, WORD};

/// IRQ number the platform assigns to the block device.
pub const DISK_IRQ: u64 = 1;

/// Value of the read-only identification register.
const MAGIC: u32 = 0x666F_7864;
const VERSION: u32 = 0x01;

#[derive(Debug)]
pub struct Disk {
    buffer_address_high: u32,
    buffer_address_low: u32,
    buffer_length_high: u32,
    buffer_length_low: u32,
    sector: u32,
    notify: u32,
    direction: u32,
    done: u32,
    data: Vec<u8>,
}

impl Disk {
    /// `image` becomes the backing buffer; without one the device exists
    /// but any DMA against it is a host error.
    pub fn new(image: Option<Vec<u8>>) -> Self {
        Self {
            buffer_address_high: 0,
            buffer_address_low: 0,
            buffer_length_high: 0,
            buffer_length_low: 0,
            sector: 0,
            notify: u32::MAX,
            direction: 0,
            done: 0,
            data: image.unwrap_or_default(),
        }
    }

    pub fn load(&self, addr: u64, size: u8) -> Result<u64, Exception> {
        if size != WORD {
            return Err(Exception::LoadAccessFault);
        }
        Ok(u64::from(match addr {
            DISK_MAGIC => MAGIC,
            DISK_VERSION => VERSION,
            DISK_NOTIFY => self.notify,
            DISK_DIRECTION => self.direction,
            DISK_BUFFER_ADDR_HIGH => self.buffer_address_high,
            DISK_BUFFER_ADDR_LOW => self.buffer_address_low,
            DISK_BUFFER_LEN_HIGH => self.buffer_length_high,
            DISK_BUFFER_LEN_LOW => self.buffer_length_low,
            DISK_SECTOR => self.sector,
            DISK_DONE => self.done,
            _ => 0,
        }))
    }

    pub fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        if size != WORD {
            return Err(Exception::StoreAMOAccessFault);
        }
        let value = value as u32;
        match addr {
            DISK_NOTIFY => self.notify = value,
            DISK_DIRECTION => self.direction = value,
            DISK_BUFFER_ADDR_HIGH => self.buffer_address_high = value,
            DISK_BUFFER_ADDR_LOW => self.buffer_address_low = value,
            DISK_BUFFER_LEN_HIGH => self.buffer_length_high = value,
            DISK_BUFFER_LEN_LOW => self.buffer_length_low = value,
            DISK_SECTOR => self.sector = value,
            DISK_DONE => self.done = value,
            _ => {}
        }
        Ok(())
    }

    /// Read-and-clear notification latch. Consuming it arms exactly one
    /// DMA transfer.
    pub fn is_interrupting(&mut self) -> bool {
        if self.notify != u32::MAX {
            self.notify = u32::MAX;
            return true;
        }
        false
    }

    pub(crate) fn read_byte(&self, offset: u64) -> u8 {
        self.data[offset as usize]
    }

    pub(crate) fn write_byte(&mut self, offset: u64, value: u8) {
        self.data[offset as usize] = value;
    }
}
