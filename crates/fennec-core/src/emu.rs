//! Machine front end: owns the hart and paces its execution.

use crate::cpu::Cpu;
use crate::exception::Exception;
use crate::primitives::constants::{CPU_HZ, FRAMEBUFFER_BASE, RAM_BASE, TICKS_PER_SECOND};
use crate::trap::Trap;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug)]
pub struct Emu {
    pub cpu: Cpu,
}

impl Emu {
    /// Build the machine: the kernel image lands at the base of RAM, the
    /// optional disk image backs the block device.
    pub fn new(kernel: &[u8], disk: Option<Vec<u8>>) -> Self {
        Self {
            cpu: Cpu::new(kernel, disk),
        }
    }

    /// One machine cycle: fetch, advance the PC, execute, tick the timers,
    /// arbitrate interrupts. Guest faults are delivered as traps; an
    /// exception the platform considers fatal is returned so the host can
    /// decide how to die.
    pub fn step(&mut self) -> Result<(), Exception> {
        match self.cpu.fetch() {
            Ok(insn) => {
                // The PC always moves past the instruction first; the
                // executor and the trap controller both count on it.
                self.cpu.pc = self.cpu.pc.wrapping_add(4);
                if let Err(e) = self.cpu.execute(insn) {
                    self.cpu.take_trap(Trap::Exception(e));
                    if e.is_fatal() {
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                self.cpu.pc = self.cpu.pc.wrapping_add(4);
                self.cpu.take_trap(Trap::Exception(e));
                if e.is_fatal() {
                    return Err(e);
                }
            }
        }

        self.cpu.bus.clint.increment(&mut self.cpu.state);
        self.cpu.state.increment_time();

        if let Some(intr) = self.cpu.check_pending_interrupt() {
            self.cpu.take_trap(Trap::Interrupt(intr));
        }
        Ok(())
    }

    /// Run `count` machine cycles, stopping early on a fatal exception.
    pub fn run_steps(&mut self, count: u64) -> Result<(), Exception> {
        for _ in 0..count {
            self.step()?;
        }
        Ok(())
    }

    /// Run the machine at its target frequency until the guest hits a fatal
    /// exception, which is returned for the host to report.
    pub fn run(&mut self) -> Exception {
        info!(hz = CPU_HZ, "starting the cycle pump");
        let budget = CPU_HZ / TICKS_PER_SECOND;
        let tick = Duration::from_secs(1) / TICKS_PER_SECOND as u32;

        loop {
            let started = Instant::now();
            if let Err(e) = self.run_steps(budget) {
                return e;
            }
            if let Some(rest) = tick.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }

    /// Borrow the framebuffer bytes for a host display. `len` is the
    /// display's byte count (width × height × 4) and must fit inside RAM.
    pub fn framebuffer(&self, len: usize) -> &[u8] {
        self.cpu
            .bus
            .ram
            .slice((FRAMEBUFFER_BASE - RAM_BASE) as usize, len)
    }

    /// Queue a key code for the guest to pick up over MMIO.
    pub fn push_key(&mut self, code: u32) {
        self.cpu.bus.kbd.push(code);
    }
}
