//! Interpreter behavior: arithmetic edge cases, control flow, AMOs, CSR
//! instructions and trap entry/return.

mod common;

use common::*;
use fennec_core::cpu::Mode;
use fennec_core::exception::Exception;
use fennec_core::primitives::constants::{RAM_BASE, WORD};
use fennec_core::reg::csr::{MCAUSE, MEPC, MIE, MIDELEG, MIP, MSIP_BIT, MSTATUS, MSTATUS_MIE_BIT, MSTATUS_MPIE_BIT, MTVEC, SATP, SEPC, SIE, SSTATUS, XSTATUS_SIE_BIT, XSTATUS_SPIE_BIT, XSTATUS_SPP_BIT};

#[test]
fn addi_chain() {
    let mut emu = boot(&[addi(1, 0, 5), addi(2, 1, 7), addi(3, 2, -3)]);
    emu.run_steps(3).unwrap();

    assert_eq!(emu.cpu.int_regs.read(1), 5);
    assert_eq!(emu.cpu.int_regs.read(2), 12);
    assert_eq!(emu.cpu.int_regs.read(3), 9);
    assert_eq!(emu.cpu.pc, RAM_BASE + 12);
}

#[test]
fn auipc_and_jal_skip_ebreak() {
    let mut emu = boot(&[auipc(1, 0), jal(0, 8), EBREAK, addi(2, 0, 1)]);
    emu.run_steps(3).unwrap();

    assert_eq!(emu.cpu.int_regs.read(1), RAM_BASE);
    assert_eq!(emu.cpu.int_regs.read(2), 1);
    // The jump went over the ebreak, so no trap was recorded.
    assert_eq!(emu.cpu.state.read(MCAUSE), 0);
}

#[test]
fn store_load_roundtrip() {
    // x1 = 0x1000 - 0x544 = 0xABC
    let mut emu = boot(&[
        lui(1, 1),
        addi(1, 1, -0x544),
        sw(2, 1, 0),
        lw(3, 2, 0),
    ]);
    emu.cpu.int_regs.write(2, RAM_BASE + 0x1000);
    emu.run_steps(4).unwrap();

    assert_eq!(emu.cpu.int_regs.read(3), 0xABC);
}

#[test]
fn jalr_links_and_jumps() {
    let mut emu = boot(&[jalr(1, 5, 4)]);
    emu.cpu.int_regs.write(5, RAM_BASE + 0x101);
    emu.run_steps(1).unwrap();

    // Target drops bit 0; the link register takes the fall-through address.
    assert_eq!(emu.cpu.pc, RAM_BASE + 0x104);
    assert_eq!(emu.cpu.int_regs.read(1), RAM_BASE + 4);
}

#[test]
fn branch_taken_and_not_taken() {
    let mut emu = boot(&[beq(1, 2, 16)]);
    emu.cpu.int_regs.write(1, 7);
    emu.cpu.int_regs.write(2, 7);
    emu.run_steps(1).unwrap();
    assert_eq!(emu.cpu.pc, RAM_BASE + 16);

    let mut emu = boot(&[beq(1, 2, 16)]);
    emu.cpu.int_regs.write(1, 7);
    emu.cpu.int_regs.write(2, 8);
    emu.run_steps(1).unwrap();
    assert_eq!(emu.cpu.pc, RAM_BASE + 4);
}

#[test]
fn amoadd_w_returns_old_value() {
    let mut emu = boot(&[amoadd_w(2, 1, 3)]);
    emu.cpu.bus.write(RAM_BASE + 0x100, WORD, 0x10).unwrap();
    emu.cpu.int_regs.write(1, RAM_BASE + 0x100);
    emu.cpu.int_regs.write(3, 5);
    emu.run_steps(1).unwrap();

    assert_eq!(emu.cpu.bus.read(RAM_BASE + 0x100, WORD).unwrap(), 0x15);
    assert_eq!(emu.cpu.int_regs.read(2), 0x10);
}

#[test]
fn amo_w_sign_extends_old_value() {
    let mut emu = boot(&[amoadd_w(2, 1, 0)]);
    emu.cpu
        .bus
        .write(RAM_BASE + 0x100, WORD, 0x8000_0000)
        .unwrap();
    emu.cpu.int_regs.write(1, RAM_BASE + 0x100);
    emu.run_steps(1).unwrap();

    assert_eq!(emu.cpu.int_regs.read(2), 0xFFFF_FFFF_8000_0000);
}

#[test]
fn amo_misaligned_address_traps() {
    let mut emu = boot(&[amoadd_w(2, 1, 3)]);
    emu.cpu.int_regs.write(1, RAM_BASE + 0x102);
    emu.run_steps(1).unwrap();

    assert_eq!(
        emu.cpu.state.read(MCAUSE),
        Exception::LoadAddressMisaligned.code()
    );
    assert_eq!(emu.cpu.state.read(MEPC), RAM_BASE);
}

#[test]
fn division_by_zero() {
    let mut emu = boot(&[]);
    emu.cpu.int_regs.write(1, 42);
    emu.cpu.int_regs.write(2, 0);

    // div
    emu.cpu
        .execute(u64::from(encode_r(0x33, 3, 0x4, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), u64::MAX);

    // divu
    emu.cpu
        .execute(u64::from(encode_r(0x33, 3, 0x5, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), u64::MAX);

    // rem
    emu.cpu
        .execute(u64::from(encode_r(0x33, 3, 0x6, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), 42);

    // remu
    emu.cpu
        .execute(u64::from(encode_r(0x33, 3, 0x7, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), 42);
}

#[test]
fn division_overflow() {
    let mut emu = boot(&[]);
    emu.cpu.int_regs.write(1, i64::MIN as u64);
    emu.cpu.int_regs.write(2, -1i64 as u64);

    emu.cpu
        .execute(u64::from(encode_r(0x33, 3, 0x4, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), i64::MIN as u64);

    emu.cpu
        .execute(u64::from(encode_r(0x33, 3, 0x6, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), 0);
}

#[test]
fn divw_rules_sign_extend() {
    let mut emu = boot(&[]);
    emu.cpu.int_regs.write(1, i32::MIN as i64 as u64);
    emu.cpu.int_regs.write(2, -1i64 as u64);

    // divw overflow mirrors the 64-bit rule on 32-bit operands.
    emu.cpu
        .execute(u64::from(encode_r(0x3b, 3, 0x4, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), i32::MIN as i64 as u64);

    // remuw by zero sign-extends the 32-bit dividend.
    emu.cpu.int_regs.write(1, 0xdead_beef_9000_0001);
    emu.cpu.int_regs.write(2, 0);
    emu.cpu
        .execute(u64::from(encode_r(0x3b, 3, 0x7, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), 0xFFFF_FFFF_9000_0001);
}

#[test]
fn shifts_are_arithmetic_where_specified() {
    let mut emu = boot(&[]);
    emu.cpu.int_regs.write(1, -64i64 as u64);

    // srai x2, x1, 4
    emu.cpu
        .execute(u64::from(encode_i(0x13, 2, 0x5, 1, (0x10 << 6) | 4)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(2) as i64, -4);

    // srli x2, x1, 4
    emu.cpu
        .execute(u64::from(encode_i(0x13, 2, 0x5, 1, 4)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(2), (-64i64 as u64) >> 4);

    // sraiw x2, x1, 1 on a negative 32-bit value
    emu.cpu.int_regs.write(1, 0xFFFF_FFFE_u64);
    emu.cpu
        .execute(u64::from(encode_i(0x1b, 2, 0x5, 1, (0x20 << 5) | 1)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(2), 0xFFFF_FFFF_FFFF_FFFF);
}

#[test]
fn mulh_fixed_vectors() {
    let mut emu = boot(&[]);
    emu.cpu.int_regs.write(1, i64::MIN as u64);
    emu.cpu.int_regs.write(2, 2);

    emu.cpu
        .execute(u64::from(encode_r(0x33, 3, 0x1, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), -1i64 as u64);

    // mulhu of the same bits is unsigned.
    emu.cpu
        .execute(u64::from(encode_r(0x33, 3, 0x3, 1, 2, 0x01)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(3), 1);
}

#[test]
fn csr_write_to_satp_refreshes_translation_cache() {
    let mut emu = boot(&[]);
    emu.cpu.int_regs.write(1, (8 << 60) | 0x1234);
    emu.cpu
        .execute(u64::from(csrrw(0, SATP as u32, 1)))
        .unwrap();

    assert!(emu.cpu.paging_enabled());
    assert_eq!(emu.cpu.root_page_table(), 0x1234 * 4096);

    emu.cpu.int_regs.write(1, 0);
    emu.cpu
        .execute(u64::from(csrrw(0, SATP as u32, 1)))
        .unwrap();
    assert!(!emu.cpu.paging_enabled());
}

#[test]
fn sie_is_a_masked_view_of_mie() {
    let mut emu = boot(&[]);
    emu.cpu.state.write(MIDELEG, 0x222);
    emu.cpu.state.write(MIE, 0x888);

    // Writing sie only touches the delegated bits of mie.
    emu.cpu.int_regs.write(1, 0xFFFF);
    emu.cpu
        .execute(u64::from(csrrw(0, SIE as u32, 1)))
        .unwrap();
    assert_eq!(emu.cpu.state.read(MIE), 0x888 | 0x222);

    // Reading sie returns mie through the delegation mask.
    emu.cpu
        .execute(u64::from(csrrs(2, SIE as u32, 0)))
        .unwrap();
    assert_eq!(emu.cpu.int_regs.read(2), 0x222);
}

#[test]
fn ecall_from_machine_round_trip() {
    let vector = RAM_BASE + 0x200;
    let mut emu = boot(&[ECALL]);
    emu.cpu.state.write(MTVEC, vector);
    emu.cpu.state.write_bit(MSTATUS, MSTATUS_MIE_BIT, true);
    emu.run_steps(1).unwrap();

    assert_eq!(
        emu.cpu.state.read(MCAUSE),
        Exception::EnvironmentCallFromMMode.code()
    );
    assert_eq!(emu.cpu.state.read(MEPC), RAM_BASE);
    assert_eq!(emu.cpu.pc, vector);
    assert!(!emu.cpu.state.read_bit(MSTATUS, MSTATUS_MIE_BIT));
    assert!(emu.cpu.state.read_bit(MSTATUS, MSTATUS_MPIE_BIT));
    // The previous privilege mode lands in MPP.
    assert_eq!((emu.cpu.state.read(MSTATUS) >> 11) & 0b11, 0b11);

    // mret returns to the ecall site in machine mode with MIE restored.
    emu.cpu.execute(u64::from(MRET)).unwrap();
    assert_eq!(emu.cpu.pc, RAM_BASE);
    assert_eq!(emu.cpu.mode, Mode::Machine);
    assert!(emu.cpu.state.read_bit(MSTATUS, MSTATUS_MIE_BIT));
}

#[test]
fn sret_restores_supervisor_state() {
    let mut emu = boot(&[]);
    emu.cpu.mode = Mode::Supervisor;
    emu.cpu.state.write(SEPC, RAM_BASE + 0x40);
    emu.cpu.state.write_bit(SSTATUS, XSTATUS_SPP_BIT, true);
    emu.cpu.state.write_bit(SSTATUS, XSTATUS_SPIE_BIT, true);

    emu.cpu.execute(u64::from(SRET)).unwrap();

    assert_eq!(emu.cpu.pc, RAM_BASE + 0x40);
    assert_eq!(emu.cpu.mode, Mode::Supervisor);
    assert!(emu.cpu.state.read_bit(SSTATUS, XSTATUS_SIE_BIT));
    assert!(emu.cpu.state.read_bit(SSTATUS, XSTATUS_SPIE_BIT));
    assert!(!emu.cpu.state.read_bit(SSTATUS, XSTATUS_SPP_BIT));
}

#[test]
fn vectored_interrupts_index_the_trap_table() {
    let base = RAM_BASE + 0x400;
    let mut emu = boot(&[addi(0, 0, 0)]);
    emu.cpu.state.write(MTVEC, base | 1);
    emu.cpu.state.write_bit(MSTATUS, MSTATUS_MIE_BIT, true);
    emu.cpu.state.write(MIE, MSIP_BIT);
    emu.cpu.state.write(MIP, MSIP_BIT);
    emu.run_steps(1).unwrap();

    // Machine software interrupt is cause 3; vectored entry lands at
    // base + 4 * 3.
    assert_eq!(emu.cpu.pc, base + 12);
    assert_eq!(emu.cpu.state.read(MCAUSE), (1 << 63) | 3);
}

#[test]
fn fetch_outside_the_bus_is_fatal() {
    let mut emu = boot(&[]);
    emu.cpu.pc = 0x1000;

    assert_eq!(emu.step(), Err(Exception::InstructionAccessFault));
    assert_eq!(
        emu.cpu.state.read(MCAUSE),
        Exception::InstructionAccessFault.code()
    );
}

#[test]
fn misaligned_pc_is_fatal() {
    let mut emu = boot(&[]);
    emu.cpu.pc = RAM_BASE + 2;

    assert_eq!(emu.step(), Err(Exception::InstructionAddressMisaligned));
}

#[test]
fn unknown_opcode_is_illegal() {
    let mut emu = boot(&[]);
    assert_eq!(
        emu.cpu.execute(0xaaaa_aaaa),
        Err(Exception::IllegalInstruction(0xaaaa_aaaa))
    );
}

#[test]
fn register_zero_ignores_writes() {
    let mut emu = boot(&[addi(0, 0, 123)]);
    emu.run_steps(1).unwrap();
    assert_eq!(emu.cpu.int_regs.read(0), 0);
}
