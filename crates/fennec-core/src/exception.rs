//! Guest-visible exceptions.
//!
//! Every memory access and every executed instruction returns
//! `Result<_, Exception>`; the trap controller turns the error into an
//! `mcause`/`scause` value and vectors the PC.

/// Exceptions of the RISC-V privileged architecture, as far as this machine
/// raises them.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    #[error("instruction address misaligned")]
    InstructionAddressMisaligned,
    #[error("instruction access fault")]
    InstructionAccessFault,
    #[error("illegal instruction {0:#x}")]
    IllegalInstruction(u64),
    #[error("breakpoint")]
    Breakpoint,
    #[error("load address misaligned")]
    LoadAddressMisaligned,
    #[error("load access fault")]
    LoadAccessFault,
    #[error("store/AMO address misaligned")]
    StoreAMOAddressMisaligned,
    #[error("store/AMO access fault")]
    StoreAMOAccessFault,
    #[error("environment call from U-mode")]
    EnvironmentCallFromUMode,
    #[error("environment call from S-mode")]
    EnvironmentCallFromSMode,
    #[error("environment call from M-mode")]
    EnvironmentCallFromMMode,
    #[error("instruction page fault")]
    InstructionPageFault,
    #[error("load page fault")]
    LoadPageFault,
    #[error("store/AMO page fault")]
    StoreAMOPageFault,
}

impl Exception {
    /// The exception code as it appears in the low bits of `mcause`/`scause`.
    pub fn code(&self) -> u64 {
        match self {
            Exception::InstructionAddressMisaligned => 0,
            Exception::InstructionAccessFault => 1,
            Exception::IllegalInstruction(_) => 2,
            Exception::Breakpoint => 3,
            Exception::LoadAddressMisaligned => 4,
            Exception::LoadAccessFault => 5,
            Exception::StoreAMOAddressMisaligned => 6,
            Exception::StoreAMOAccessFault => 7,
            Exception::EnvironmentCallFromUMode => 8,
            Exception::EnvironmentCallFromSMode => 9,
            Exception::EnvironmentCallFromMMode => 11,
            Exception::InstructionPageFault => 12,
            Exception::LoadPageFault => 13,
            Exception::StoreAMOPageFault => 15,
        }
    }

    /// Whether the platform gives up on the guest after delivering this
    /// exception. These are the faults a kernel cannot reasonably recover
    /// from on this machine; the driver exits instead of looping on them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Exception::InstructionAddressMisaligned
                | Exception::InstructionAccessFault
                | Exception::LoadAccessFault
                | Exception::StoreAMOAddressMisaligned
                | Exception::StoreAMOAccessFault
        )
    }
}
