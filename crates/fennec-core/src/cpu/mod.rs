//! The hart: integer state, privilege modes, Sv39 translation, trap
//! delivery and the interrupt-arbitration path.

use crate::bus::Bus;
use crate::cpu::exec::execute_inner;
use crate::devices::{disk::Disk, disk::DISK_IRQ, uart::UART_IRQ};
use crate::exception::Exception;
use crate::interrupt::Interrupt;
use crate::mem::Ram;
use crate::primitives::constants::{DOUBLEWORD, PAGE_SIZE, RAM_BASE, WORD};
use crate::reg::csr::{state::State, MCAUSE, MEDELEG, MEIP_BIT, MEPC, MIE, MIP, MSIP_BIT, MSTATUS, MSTATUS_MIE_BIT, MSTATUS_MPIE_BIT, MSTATUS_MPP_SHIFT, MTIP_BIT, MTVAL, MTVEC, SATP, SCAUSE, SEIP_BIT, SEPC, SSIP_BIT, SSTATUS, STIP_BIT, STVAL, STVEC, XSTATUS_SIE_BIT, XSTATUS_SPIE_BIT, XSTATUS_SPP_BIT};
use crate::reg::i_reg::IntRegister;
use crate::trap::Trap;
use tracing::trace;

pub mod exec;

/// Access type that is used in the virtual address translation process. It
/// decides which page fault a failing walk raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Instruction,
    Load,
    Store,
}

impl AccessType {
    fn page_fault(self) -> Exception {
        match self {
            AccessType::Instruction => Exception::InstructionPageFault,
            AccessType::Load => Exception::LoadPageFault,
            AccessType::Store => Exception::StoreAMOPageFault,
        }
    }
}

/// The privileged mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum Mode {
    User = 0b00,
    Supervisor = 0b01,
    Machine = 0b11,
}

#[derive(Debug)]
pub struct Cpu {
    /// Integer registers.
    pub int_regs: IntRegister,
    /// Program counter.
    pub pc: u64,
    /// Control and status registers (CSR).
    pub state: State,
    /// Privilege level.
    pub mode: Mode,
    /// System bus.
    pub bus: Bus,
    /// Sv39 paging flag, cached from `satp`.
    enable_paging: bool,
    /// Physical address of the root page table, cached from `satp`.
    page_table: u64,
}

impl Cpu {
    /// A hart reset into M-mode at the base of RAM, with the kernel image
    /// already in memory.
    pub fn new(kernel: &[u8], disk: Option<Vec<u8>>) -> Self {
        Self {
            int_regs: IntRegister::new(),
            pc: RAM_BASE,
            state: State::new(),
            mode: Mode::Machine,
            bus: Bus::new(Ram::new(kernel), Disk::new(disk)),
            enable_paging: false,
            page_table: 0,
        }
    }

    /// Refresh the cached translation state. Called after every CSR write
    /// that lands on `satp`.
    pub fn update_paging(&mut self) {
        let satp = self.state.read(SATP);
        self.page_table = (satp & ((1 << 44) - 1)) * PAGE_SIZE;
        self.enable_paging = satp >> 60 == 8;
    }

    pub fn paging_enabled(&self) -> bool {
        self.enable_paging
    }

    pub fn root_page_table(&self) -> u64 {
        self.page_table
    }

    /// Translate a virtual address through the Sv39 tables, or pass it
    /// through untouched while paging is off.
    ///
    /// Only the valid bit and the reserved R/W encoding are checked; the
    /// permission, user and accessed/dirty bits are deliberately not
    /// enforced.
    fn translate(&mut self, addr: u64, access_type: AccessType) -> Result<u64, Exception> {
        if !self.enable_paging {
            return Ok(addr);
        }

        let vpn = [
            (addr >> 12) & 0x1ff,
            (addr >> 21) & 0x1ff,
            (addr >> 30) & 0x1ff,
        ];

        let mut a = self.page_table;
        let mut level: i64 = 2;
        let mut pte;
        loop {
            pte = self
                .bus
                .read(a + vpn[level as usize] * 8, DOUBLEWORD)
                .map_err(|_| access_type.page_fault())?;

            let v = pte & 1;
            let r = (pte >> 1) & 1;
            let w = (pte >> 2) & 1;
            let x = (pte >> 3) & 1;
            if v == 0 || (r == 0 && w == 1) {
                return Err(access_type.page_fault());
            }

            // A PTE with R or X set is a leaf; anything else points at the
            // next level down.
            if r == 1 || x == 1 {
                break;
            }
            a = ((pte >> 10) & 0x0fff_ffff_ffff) * PAGE_SIZE;
            level -= 1;
            if level < 0 {
                return Err(access_type.page_fault());
            }
        }

        let ppn = [
            (pte >> 10) & 0x1ff,
            (pte >> 19) & 0x1ff,
            (pte >> 28) & 0x03ff_ffff,
        ];

        let offset = addr & 0xfff;
        match level {
            0 => Ok((((pte >> 10) & 0x0fff_ffff_ffff) << 12) | offset),
            // A leaf above level 0 is a superpage; the untranslated low VPN
            // fields carry into the physical address.
            1 => Ok((ppn[2] << 30) | (ppn[1] << 21) | (vpn[0] << 12) | offset),
            2 => Ok((ppn[2] << 30) | (vpn[1] << 21) | (vpn[0] << 12) | offset),
            _ => Err(access_type.page_fault()),
        }
    }

    /// Fetch the 32-bit instruction at the current program counter.
    pub fn fetch(&mut self) -> Result<u64, Exception> {
        if self.pc & 3 != 0 {
            return Err(Exception::InstructionAddressMisaligned);
        }

        let p_pc = self.translate(self.pc, AccessType::Instruction)?;

        // A refused bus access during fetch is an instruction access fault,
        // not a load fault.
        match self.bus.read(p_pc, WORD) {
            Ok(insn) => Ok(insn),
            Err(_) => Err(Exception::InstructionAccessFault),
        }
    }

    /// Read `size`-bit data from a virtual address.
    fn read(&mut self, v_addr: u64, size: u8) -> Result<u64, Exception> {
        let p_addr = self.translate(v_addr, AccessType::Load)?;
        self.bus.read(p_addr, size)
    }

    /// Write `size`-bit data to a virtual address.
    fn write(&mut self, v_addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        let p_addr = self.translate(v_addr, AccessType::Store)?;
        self.bus.write(p_addr, size, value)
    }

    /// Execute one already-fetched instruction. The program counter has
    /// been advanced past it; control-flow instructions compensate.
    pub fn execute(&mut self, insn: u64) -> Result<(), Exception> {
        execute_inner(self, insn)
    }

    /// Divert the hart into a trap handler, honoring `medeleg` delegation.
    pub fn take_trap(&mut self, trap: Trap) {
        // The pump advances the PC before executing, so the faulting
        // instruction sits one slot back.
        let exception_pc = self.pc.wrapping_sub(4);
        let prev_mode = self.mode;

        let cause = trap.cause();
        let is_interrupt = trap.is_interrupt();
        trace!(cause, epc = exception_pc, "taking trap");

        // Interrupt causes carry bit 63; truncating to 32 bits leaves the
        // plain number for the delegation lookup.
        let deleg_bit = cause as u32;
        if prev_mode <= Mode::Supervisor && (self.state.read(MEDELEG) >> deleg_bit) & 1 == 1 {
            self.mode = Mode::Supervisor;

            let stvec = self.state.read(STVEC);
            let vector = if is_interrupt && stvec & 1 == 1 {
                cause.wrapping_mul(4)
            } else {
                0
            };
            self.pc = (stvec & !1).wrapping_add(vector);

            self.state.write(SEPC, exception_pc & !1);
            self.state.write(SCAUSE, cause);
            self.state.write(STVAL, 0);
            let sie = self.state.read_bit(SSTATUS, XSTATUS_SIE_BIT);
            self.state.write_bit(SSTATUS, XSTATUS_SPIE_BIT, sie);
            self.state.write_bit(SSTATUS, XSTATUS_SIE_BIT, false);
            self.state
                .write_bit(SSTATUS, XSTATUS_SPP_BIT, prev_mode != Mode::User);
        } else {
            self.mode = Mode::Machine;

            let mtvec = self.state.read(MTVEC);
            let vector = if is_interrupt && mtvec & 1 == 1 {
                cause.wrapping_mul(4)
            } else {
                0
            };
            self.pc = (mtvec & !1).wrapping_add(vector);

            self.state.write(MEPC, exception_pc & !1);
            self.state.write(MCAUSE, cause);
            self.state.write(MTVAL, 0);
            let mie = self.state.read_bit(MSTATUS, MSTATUS_MIE_BIT);
            self.state.write_bit(MSTATUS, MSTATUS_MPIE_BIT, mie);
            self.state.write_bit(MSTATUS, MSTATUS_MIE_BIT, false);
            let mstatus = self.state.read(MSTATUS);
            self.state.write(
                MSTATUS,
                (mstatus & !(0b11 << MSTATUS_MPP_SHIFT)) | ((prev_mode as u64) << MSTATUS_MPP_SHIFT),
            );
        }
    }

    /// Arbitrate pending interrupts after an executed instruction.
    ///
    /// Device interrupts are gathered first: a waiting UART byte wins over
    /// the block device, and an armed block-device notification performs
    /// its DMA transfer here, exactly once, before its IRQ is published.
    pub fn check_pending_interrupt(&mut self) -> Option<Interrupt> {
        match self.mode {
            Mode::Machine if !self.state.read_bit(MSTATUS, MSTATUS_MIE_BIT) => return None,
            Mode::Supervisor if !self.state.read_bit(SSTATUS, XSTATUS_SIE_BIT) => return None,
            _ => {}
        }

        let irq = if self.bus.uart.is_interrupting() {
            Some(UART_IRQ)
        } else if self.bus.disk.is_interrupting() {
            // A bus failure mid-transfer would leave the guest with
            // silently torn memory, so it ends the emulation instead.
            self.bus.disk_access().expect("disk DMA transfer failed");
            Some(DISK_IRQ)
        } else {
            None
        };

        if let Some(irq) = irq {
            self.bus.plic.publish(irq);
            self.state.write(MIP, self.state.read(MIP) | SEIP_BIT);
        }

        let pending = self.state.read(MIE) & self.state.read(MIP);
        if pending & MEIP_BIT != 0 {
            self.state.write(MIP, self.state.read(MIP) & !MEIP_BIT);
            return Some(Interrupt::MachineExternal);
        }
        if pending & MSIP_BIT != 0 {
            self.state.write(MIP, self.state.read(MIP) & !MSIP_BIT);
            return Some(Interrupt::MachineSoftware);
        }
        if pending & MTIP_BIT != 0 {
            self.state.write(MIP, self.state.read(MIP) & !MTIP_BIT);
            return Some(Interrupt::MachineTimer);
        }
        if pending & SEIP_BIT != 0 {
            self.state.write(MIP, self.state.read(MIP) & !SEIP_BIT);
            return Some(Interrupt::SupervisorExternal);
        }
        if pending & SSIP_BIT != 0 {
            self.state.write(MIP, self.state.read(MIP) & !SSIP_BIT);
            return Some(Interrupt::SupervisorSoftware);
        }
        if pending & STIP_BIT != 0 {
            self.state.write(MIP, self.state.read(MIP) & !STIP_BIT);
            return Some(Interrupt::SupervisorTimer);
        }

        None
    }
}
