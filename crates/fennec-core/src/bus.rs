//! System bus: routes each physical access to exactly one device by
//! address range, and carries the block-device DMA transfers.

use crate::devices::{clint::Clint, disk::Disk, kbd::Keyboard, plic::Plic, uart::Uart};
use crate::exception::Exception;
use crate::mem::Ram;
use crate::primitives::constants::{BYTE, CLINT_BASE, CLINT_SIZE, DISK_BASE, DISK_BUFFER_ADDR_HIGH, DISK_BUFFER_ADDR_LOW, DISK_BUFFER_LEN_HIGH, DISK_BUFFER_LEN_LOW, DISK_DIRECTION, DISK_DONE, DISK_SECTOR, DISK_SIZE, KBD_BASE, KBD_SIZE, PLIC_BASE, PLIC_SIZE, RAM_BASE, SECTOR_SIZE, UART_BASE, UART_SIZE, WORD};
use tracing::debug;

fn in_range(addr: u64, base: u64, size: u64) -> bool {
    addr >= base && addr < base + size
}

#[derive(Debug)]
pub struct Bus {
    pub ram: Ram,
    pub clint: Clint,
    pub plic: Plic,
    pub uart: Uart,
    pub disk: Disk,
    pub kbd: Keyboard,
}

impl Bus {
    pub fn new(ram: Ram, disk: Disk) -> Self {
        Self {
            ram,
            clint: Clint::new(),
            plic: Plic::new(),
            uart: Uart::new(),
            disk,
            kbd: Keyboard::new(),
        }
    }

    /// Load a `size`-bit value from the device that owns `addr`. Each
    /// device enforces its own access width.
    pub fn read(&mut self, addr: u64, size: u8) -> Result<u64, Exception> {
        if in_range(addr, CLINT_BASE, CLINT_SIZE) {
            return self.clint.load(addr, size);
        }
        if in_range(addr, PLIC_BASE, PLIC_SIZE) {
            return self.plic.load(addr, size);
        }
        if in_range(addr, UART_BASE, UART_SIZE) {
            return self.uart.load(addr, size);
        }
        if in_range(addr, DISK_BASE, DISK_SIZE) {
            return self.disk.load(addr, size);
        }
        if in_range(addr, KBD_BASE, KBD_SIZE) {
            return self.kbd.load(addr, size);
        }
        if addr >= RAM_BASE {
            return self.ram.load(addr, size);
        }
        Err(Exception::LoadAccessFault)
    }

    /// Store a `size`-bit value to the device that owns `addr`. The
    /// keyboard port is read-only and takes no stores.
    pub fn write(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        if in_range(addr, CLINT_BASE, CLINT_SIZE) {
            return self.clint.store(addr, size, value);
        }
        if in_range(addr, PLIC_BASE, PLIC_SIZE) {
            return self.plic.store(addr, size, value);
        }
        if in_range(addr, UART_BASE, UART_SIZE) {
            return self.uart.store(addr, size, value);
        }
        if in_range(addr, DISK_BASE, DISK_SIZE) {
            return self.disk.store(addr, size, value);
        }
        if addr >= RAM_BASE {
            return self.ram.store(addr, size, value);
        }
        Err(Exception::StoreAMOAccessFault)
    }

    /// Carry out one armed DMA transfer as described by the block-device
    /// registers: `length` bytes between RAM at `address` and the backing
    /// buffer at `sector * SECTOR_SIZE`, direction 1 meaning RAM to disk.
    pub fn disk_access(&mut self) -> Result<(), Exception> {
        let address_high = self.read(DISK_BUFFER_ADDR_HIGH, WORD)?;
        let address_low = self.read(DISK_BUFFER_ADDR_LOW, WORD)?;
        let address = address_high << 32 | address_low;

        let length_high = self.read(DISK_BUFFER_LEN_HIGH, WORD)?;
        let length_low = self.read(DISK_BUFFER_LEN_LOW, WORD)?;
        let length = length_high << 32 | length_low;

        let sector = self.read(DISK_SECTOR, WORD)?;
        let direction = self.read(DISK_DIRECTION, WORD)?;
        debug!(address, length, sector, direction, "disk DMA transfer");

        if direction == 1 {
            // RAM to disk.
            for i in 0..length {
                let data = self.read(address + i, BYTE)?;
                self.disk.write_byte(sector * SECTOR_SIZE + i, data as u8);
            }
        } else {
            // Disk to RAM.
            for i in 0..length {
                let data = self.disk.read_byte(sector * SECTOR_SIZE + i);
                self.write(address + i, BYTE, u64::from(data))?;
            }
        }

        self.write(DISK_DONE, WORD, 0)
    }
}
