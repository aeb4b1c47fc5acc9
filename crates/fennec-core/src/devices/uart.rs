//! 16550-subset serial port.
//!
//! Receive bytes travel over a channel from a background reader thread to
//! the hart thread; all register state stays on the hart side, so no lock
//! is needed. A pending byte is moved into the receive holding register
//! only after the guest has drained the previous one (LSR.RX clear), which
//! gives the reader natural backpressure through the channel.

use crate::exception::Exception;
use crate::primitives::constants::{BYTE, UART_BASE, UART_LSR, UART_LSR_RX, UART_LSR_TX, UART_RHR, UART_SIZE, UART_THR};
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::warn;

/// IRQ number the platform assigns to the serial port.
pub const UART_IRQ: u64 = 10;

#[derive(Debug)]
pub struct Uart {
    data: [u8; UART_SIZE as usize],
    interrupting: bool,
    rx: Receiver<u8>,
}

impl Uart {
    /// A UART fed from host stdin by a background reader thread. The thread
    /// is never joined; it lives until the process exits or stdin closes.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut byte = [0u8; 1];
            loop {
                match stdin.read(&mut byte) {
                    Ok(1) => {
                        if tx.send(byte[0]).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {
                        warn!("stdin closed, serial input stops");
                        break;
                    }
                    Err(_) => break,
                }
            }
        });
        Self::with_receiver(rx)
    }

    /// A UART fed from an arbitrary byte source. Hosts that own the
    /// terminal (or tests) wire their own channel.
    pub fn with_receiver(rx: Receiver<u8>) -> Self {
        let mut data = [0; UART_SIZE as usize];
        data[(UART_LSR - UART_BASE) as usize] |= UART_LSR_TX;
        Self {
            data,
            interrupting: false,
            rx,
        }
    }

    /// Move one pending byte into the receive holding register once the
    /// previous one has been drained.
    fn poll_rx(&mut self) {
        if self.data[(UART_LSR - UART_BASE) as usize] & UART_LSR_RX != 0 {
            return;
        }
        if let Ok(byte) = self.rx.try_recv() {
            self.data[0] = byte;
            self.data[(UART_LSR - UART_BASE) as usize] |= UART_LSR_RX;
            self.interrupting = true;
        }
    }

    pub fn load(&mut self, addr: u64, size: u8) -> Result<u64, Exception> {
        if size != BYTE {
            return Err(Exception::LoadAccessFault);
        }
        self.poll_rx();
        match addr {
            UART_RHR => {
                let byte = self.data[0];
                self.data[(UART_LSR - UART_BASE) as usize] &= !UART_LSR_RX;
                Ok(u64::from(byte))
            }
            _ => Ok(u64::from(self.data[(addr - UART_BASE) as usize])),
        }
    }

    pub fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        if size != BYTE {
            return Err(Exception::StoreAMOAccessFault);
        }
        match addr {
            UART_THR => {
                let mut stdout = io::stdout();
                let _ = stdout.write_all(&[value as u8]);
                let _ = stdout.flush();
            }
            _ => self.data[(addr - UART_BASE) as usize] = value as u8,
        }
        Ok(())
    }

    /// Read-and-clear interrupt latch. Also the point where a freshly
    /// arrived byte becomes visible between MMIO accesses.
    pub fn is_interrupting(&mut self) -> bool {
        self.poll_rx();
        std::mem::take(&mut self.interrupting)
    }
}
