//! A trap is whatever diverts the hart into a handler: a synchronous
//! exception or an asynchronous interrupt.

use crate::exception::Exception;
use crate::interrupt::Interrupt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    Exception(Exception),
    Interrupt(Interrupt),
}

impl Trap {
    /// The full cause word written to `mcause`/`scause`. Interrupt causes
    /// carry bit 63.
    pub fn cause(&self) -> u64 {
        match self {
            Trap::Exception(e) => e.code(),
            Trap::Interrupt(intr) => (1 << 63) | intr.code(),
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Trap::Interrupt(_))
    }
}

impl From<Exception> for Trap {
    fn from(e: Exception) -> Self {
        Trap::Exception(e)
    }
}

impl From<Interrupt> for Trap {
    fn from(intr: Interrupt) -> Self {
        Trap::Interrupt(intr)
    }
}
