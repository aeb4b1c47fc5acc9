//! Keyboard port: a read-only MMIO register over a key-code queue.

use crate::exception::Exception;
use crate::primitives::constants::{KBD_GET, WORD};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct Keyboard {
    queue: VecDeque<u32>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Queue a key code from the host event pump.
    pub fn push(&mut self, code: u32) {
        self.queue.push_back(code);
    }

    /// Each 32-bit read at the base dequeues one key code; an empty queue
    /// reads as zero.
    pub fn load(&mut self, addr: u64, size: u8) -> Result<u64, Exception> {
        if size != WORD {
            return Err(Exception::LoadAccessFault);
        }
        match addr {
            KBD_GET => Ok(u64::from(self.queue.pop_front().unwrap_or(0))),
            _ => Ok(0),
        }
    }
}
