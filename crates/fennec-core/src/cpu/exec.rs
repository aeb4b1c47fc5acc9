//! The RV64IMA+Zicsr interpreter.
//!
//! The pump advances the PC by 4 before an instruction executes, so
//! PC-relative control flow compensates with a trailing `- 4` and the
//! link registers take the already-advanced PC as the return address.

use crate::cpu::{Cpu, Mode};
use crate::exception::Exception;
use crate::primitives::constants::{BYTE, DOUBLEWORD, HALFWORD, WORD};
use crate::reg::csr::{MEPC, MSTATUS, MSTATUS_MIE_BIT, MSTATUS_MPIE_BIT, MSTATUS_MPP_SHIFT, SATP, SEPC, SSTATUS, XSTATUS_SIE_BIT, XSTATUS_SPIE_BIT, XSTATUS_SPP_BIT};
use std::cmp;

pub(crate) fn execute_inner(cpu: &mut Cpu, insn: u64) -> Result<(), Exception> {
    let opcode = insn & 0x7f;
    let rd = (insn >> 7) & 0x1f;
    let rs1 = (insn >> 15) & 0x1f;
    let rs2 = (insn >> 20) & 0x1f;
    let funct3 = (insn >> 12) & 0x7;
    let funct7 = (insn >> 25) & 0x7f;

    match opcode {
        0x03 => {
            // imm[11:0] = insn[31:20]
            let offset = ((insn as i32 as i64) >> 20) as u64;
            let addr = cpu.int_regs.read(rs1).wrapping_add(offset);
            match funct3 {
                0x0 => {
                    // lb
                    let val = cpu.read(addr, BYTE)?;
                    cpu.int_regs.write(rd, val as i8 as i64 as u64);
                }
                0x1 => {
                    // lh
                    let val = cpu.read(addr, HALFWORD)?;
                    cpu.int_regs.write(rd, val as i16 as i64 as u64);
                }
                0x2 => {
                    // lw
                    let val = cpu.read(addr, WORD)?;
                    cpu.int_regs.write(rd, val as i32 as i64 as u64);
                }
                0x3 => {
                    // ld
                    let val = cpu.read(addr, DOUBLEWORD)?;
                    cpu.int_regs.write(rd, val);
                }
                0x4 => {
                    // lbu
                    let val = cpu.read(addr, BYTE)?;
                    cpu.int_regs.write(rd, val);
                }
                0x5 => {
                    // lhu
                    let val = cpu.read(addr, HALFWORD)?;
                    cpu.int_regs.write(rd, val);
                }
                0x6 => {
                    // lwu
                    let val = cpu.read(addr, WORD)?;
                    cpu.int_regs.write(rd, val);
                }
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            }
        }
        0x0f => {
            // The hart executes strictly in order on a single thread, so
            // memory fences have nothing to reorder.
            match funct3 {
                0x0 => {
                    // fence
                }
                0x1 => {
                    // fence.i
                }
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            }
        }
        0x13 => {
            // imm[11:0] = insn[31:20]
            let imm = ((insn as i32 as i64) >> 20) as u64;
            // shamt is 6 bits for the RV64I shifts.
            let shamt = (insn >> 20) & 0x3f;
            match funct3 {
                0x0 => {
                    // addi
                    cpu.int_regs
                        .write(rd, cpu.int_regs.read(rs1).wrapping_add(imm));
                }
                0x1 => {
                    // slli
                    cpu.int_regs.write(rd, cpu.int_regs.read(rs1) << shamt);
                }
                0x2 => {
                    // slti
                    cpu.int_regs.write(
                        rd,
                        u64::from((cpu.int_regs.read(rs1) as i64) < (imm as i64)),
                    );
                }
                0x3 => {
                    // sltiu
                    cpu.int_regs
                        .write(rd, u64::from(cpu.int_regs.read(rs1) < imm));
                }
                0x4 => {
                    // xori
                    cpu.int_regs.write(rd, cpu.int_regs.read(rs1) ^ imm);
                }
                0x5 => match funct7 >> 1 {
                    0x00 => {
                        // srli
                        cpu.int_regs.write(rd, cpu.int_regs.read(rs1) >> shamt);
                    }
                    0x10 => {
                        // srai
                        cpu.int_regs
                            .write(rd, ((cpu.int_regs.read(rs1) as i64) >> shamt) as u64);
                    }
                    _ => {
                        return Err(Exception::IllegalInstruction(insn));
                    }
                },
                0x6 => {
                    // ori
                    cpu.int_regs.write(rd, cpu.int_regs.read(rs1) | imm);
                }
                0x7 => {
                    // andi
                    cpu.int_regs.write(rd, cpu.int_regs.read(rs1) & imm);
                }
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            }
        }
        0x17 => {
            // auipc
            // The PC has already moved past this instruction.
            let imm = (insn & 0xffff_f000) as i32 as i64 as u64;
            cpu.int_regs
                .write(rd, cpu.pc.wrapping_add(imm).wrapping_sub(4));
        }
        0x1b => {
            // imm[11:0] = insn[31:20]
            let imm = ((insn as i32 as i64) >> 20) as u64;
            // shamt is 5 bits for the *W shifts.
            let shamt = (imm & 0x1f) as u32;
            match funct3 {
                0x0 => {
                    // addiw
                    cpu.int_regs
                        .write(rd, cpu.int_regs.read(rs1).wrapping_add(imm) as i32 as i64 as u64);
                }
                0x1 => {
                    // slliw
                    cpu.int_regs
                        .write(rd, (cpu.int_regs.read(rs1) << shamt) as i32 as i64 as u64);
                }
                0x5 => match funct7 {
                    0x00 => {
                        // srliw
                        cpu.int_regs.write(
                            rd,
                            ((cpu.int_regs.read(rs1) as u32) >> shamt) as i32 as i64 as u64,
                        );
                    }
                    0x20 => {
                        // sraiw
                        cpu.int_regs
                            .write(rd, ((cpu.int_regs.read(rs1) as i32) >> shamt) as i64 as u64);
                    }
                    _ => {
                        return Err(Exception::IllegalInstruction(insn));
                    }
                },
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            }
        }
        0x23 => {
            // offset[11:5|4:0] = insn[31:25|11:7]
            let offset =
                (((insn & 0xfe00_0000) as i32 as i64 >> 20) as u64) | ((insn >> 7) & 0x1f);
            let addr = cpu.int_regs.read(rs1).wrapping_add(offset);
            match funct3 {
                0x0 => {
                    // sb
                    cpu.write(addr, BYTE, cpu.int_regs.read(rs2))?;
                }
                0x1 => {
                    // sh
                    cpu.write(addr, HALFWORD, cpu.int_regs.read(rs2))?;
                }
                0x2 => {
                    // sw
                    cpu.write(addr, WORD, cpu.int_regs.read(rs2))?;
                }
                0x3 => {
                    // sd
                    cpu.write(addr, DOUBLEWORD, cpu.int_regs.read(rs2))?;
                }
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            }
        }
        0x2f => {
            // RV64A. Each AMO requires natural alignment of the address in
            // rs1 and hands rd the sign-extended old memory value.
            let funct5 = (funct7 & 0x7c) >> 2;
            let addr = cpu.int_regs.read(rs1);
            match (funct3, funct5) {
                (0x2, 0x00) => {
                    // amoadd.w
                    if addr % 4 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, WORD)?;
                    cpu.write(addr, WORD, t.wrapping_add(cpu.int_regs.read(rs2)))?;
                    cpu.int_regs.write(rd, t as i32 as i64 as u64);
                }
                (0x3, 0x00) => {
                    // amoadd.d
                    if addr % 8 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, DOUBLEWORD)?;
                    cpu.write(addr, DOUBLEWORD, t.wrapping_add(cpu.int_regs.read(rs2)))?;
                    cpu.int_regs.write(rd, t);
                }
                (0x2, 0x01) => {
                    // amoswap.w
                    if addr % 4 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, WORD)?;
                    cpu.write(addr, WORD, cpu.int_regs.read(rs2))?;
                    cpu.int_regs.write(rd, t as i32 as i64 as u64);
                }
                (0x3, 0x01) => {
                    // amoswap.d
                    if addr % 8 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, DOUBLEWORD)?;
                    cpu.write(addr, DOUBLEWORD, cpu.int_regs.read(rs2))?;
                    cpu.int_regs.write(rd, t);
                }
                (0x2, 0x04) => {
                    // amoxor.w
                    if addr % 4 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, WORD)?;
                    cpu.write(addr, WORD, t ^ cpu.int_regs.read(rs2))?;
                    cpu.int_regs.write(rd, t as i32 as i64 as u64);
                }
                (0x3, 0x04) => {
                    // amoxor.d
                    if addr % 8 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, DOUBLEWORD)?;
                    cpu.write(addr, DOUBLEWORD, t ^ cpu.int_regs.read(rs2))?;
                    cpu.int_regs.write(rd, t);
                }
                (0x2, 0x08) => {
                    // amoor.w
                    if addr % 4 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, WORD)?;
                    cpu.write(addr, WORD, t | cpu.int_regs.read(rs2))?;
                    cpu.int_regs.write(rd, t as i32 as i64 as u64);
                }
                (0x3, 0x08) => {
                    // amoor.d
                    if addr % 8 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, DOUBLEWORD)?;
                    cpu.write(addr, DOUBLEWORD, t | cpu.int_regs.read(rs2))?;
                    cpu.int_regs.write(rd, t);
                }
                (0x2, 0x0c) => {
                    // amoand.w
                    if addr % 4 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, WORD)?;
                    cpu.write(addr, WORD, t & cpu.int_regs.read(rs2))?;
                    cpu.int_regs.write(rd, t as i32 as i64 as u64);
                }
                (0x3, 0x0c) => {
                    // amoand.d
                    if addr % 8 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, DOUBLEWORD)?;
                    cpu.write(addr, DOUBLEWORD, t & cpu.int_regs.read(rs2))?;
                    cpu.int_regs.write(rd, t);
                }
                (0x2, 0x10) => {
                    // amomin.w
                    if addr % 4 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, WORD)?;
                    let min = cmp::min(t as i32, cpu.int_regs.read(rs2) as i32);
                    cpu.write(addr, WORD, min as i64 as u64)?;
                    cpu.int_regs.write(rd, t as i32 as i64 as u64);
                }
                (0x3, 0x10) => {
                    // amomin.d
                    if addr % 8 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, DOUBLEWORD)?;
                    let min = cmp::min(t as i64, cpu.int_regs.read(rs2) as i64);
                    cpu.write(addr, DOUBLEWORD, min as u64)?;
                    cpu.int_regs.write(rd, t);
                }
                (0x2, 0x14) => {
                    // amomax.w
                    if addr % 4 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, WORD)?;
                    let max = cmp::max(t as i32, cpu.int_regs.read(rs2) as i32);
                    cpu.write(addr, WORD, max as i64 as u64)?;
                    cpu.int_regs.write(rd, t as i32 as i64 as u64);
                }
                (0x3, 0x14) => {
                    // amomax.d
                    if addr % 8 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, DOUBLEWORD)?;
                    let max = cmp::max(t as i64, cpu.int_regs.read(rs2) as i64);
                    cpu.write(addr, DOUBLEWORD, max as u64)?;
                    cpu.int_regs.write(rd, t);
                }
                (0x2, 0x18) => {
                    // amominu.w
                    if addr % 4 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, WORD)?;
                    let min = cmp::min(t as u32, cpu.int_regs.read(rs2) as u32);
                    cpu.write(addr, WORD, u64::from(min))?;
                    cpu.int_regs.write(rd, t as i32 as i64 as u64);
                }
                (0x3, 0x18) => {
                    // amominu.d
                    if addr % 8 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, DOUBLEWORD)?;
                    cpu.write(addr, DOUBLEWORD, cmp::min(t, cpu.int_regs.read(rs2)))?;
                    cpu.int_regs.write(rd, t);
                }
                (0x2, 0x1c) => {
                    // amomaxu.w
                    if addr % 4 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, WORD)?;
                    let max = cmp::max(t as u32, cpu.int_regs.read(rs2) as u32);
                    cpu.write(addr, WORD, u64::from(max))?;
                    cpu.int_regs.write(rd, t as i32 as i64 as u64);
                }
                (0x3, 0x1c) => {
                    // amomaxu.d
                    if addr % 8 != 0 {
                        return Err(Exception::LoadAddressMisaligned);
                    }
                    let t = cpu.read(addr, DOUBLEWORD)?;
                    cpu.write(addr, DOUBLEWORD, cmp::max(t, cpu.int_regs.read(rs2)))?;
                    cpu.int_regs.write(rd, t);
                }
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            }
        }
        0x33 => {
            // RV64I and RV64M. Only the low 6 bits of rs2 count for the
            // register shifts.
            let shamt = cpu.int_regs.read(rs2) & 0x3f;
            match (funct3, funct7) {
                (0x0, 0x00) => {
                    // add
                    cpu.int_regs.write(
                        rd,
                        cpu.int_regs.read(rs1).wrapping_add(cpu.int_regs.read(rs2)),
                    );
                }
                (0x0, 0x01) => {
                    // mul
                    cpu.int_regs.write(
                        rd,
                        cpu.int_regs.read(rs1).wrapping_mul(cpu.int_regs.read(rs2)),
                    );
                }
                (0x0, 0x20) => {
                    // sub
                    cpu.int_regs.write(
                        rd,
                        cpu.int_regs.read(rs1).wrapping_sub(cpu.int_regs.read(rs2)),
                    );
                }
                (0x1, 0x00) => {
                    // sll
                    cpu.int_regs.write(rd, cpu.int_regs.read(rs1) << shamt);
                }
                (0x1, 0x01) => {
                    // mulh: signed × signed, upper half of the 128-bit product
                    cpu.int_regs.write(
                        rd,
                        ((cpu.int_regs.read(rs1) as i64 as i128)
                            .wrapping_mul(cpu.int_regs.read(rs2) as i64 as i128)
                            >> 64) as u64,
                    );
                }
                (0x2, 0x00) => {
                    // slt
                    cpu.int_regs.write(
                        rd,
                        u64::from((cpu.int_regs.read(rs1) as i64) < (cpu.int_regs.read(rs2) as i64)),
                    );
                }
                (0x2, 0x01) => {
                    // mulhsu: signed × unsigned
                    cpu.int_regs.write(
                        rd,
                        ((cpu.int_regs.read(rs1) as i64 as i128 as u128)
                            .wrapping_mul(u128::from(cpu.int_regs.read(rs2)))
                            >> 64) as u64,
                    );
                }
                (0x3, 0x00) => {
                    // sltu
                    cpu.int_regs.write(
                        rd,
                        u64::from(cpu.int_regs.read(rs1) < cpu.int_regs.read(rs2)),
                    );
                }
                (0x3, 0x01) => {
                    // mulhu: unsigned × unsigned
                    cpu.int_regs.write(
                        rd,
                        ((u128::from(cpu.int_regs.read(rs1))
                            .wrapping_mul(u128::from(cpu.int_regs.read(rs2))))
                            >> 64) as u64,
                    );
                }
                (0x4, 0x00) => {
                    // xor
                    cpu.int_regs
                        .write(rd, cpu.int_regs.read(rs1) ^ cpu.int_regs.read(rs2));
                }
                (0x4, 0x01) => {
                    // div
                    let dividend = cpu.int_regs.read(rs1) as i64;
                    let divisor = cpu.int_regs.read(rs2) as i64;
                    cpu.int_regs.write(
                        rd,
                        if divisor == 0 {
                            // The quotient of division by zero has all bits set.
                            u64::MAX
                        } else if dividend == i64::MIN && divisor == -1 {
                            // Signed overflow: the quotient equals the dividend.
                            dividend as u64
                        } else {
                            dividend.wrapping_div(divisor) as u64
                        },
                    );
                }
                (0x5, 0x00) => {
                    // srl
                    cpu.int_regs.write(rd, cpu.int_regs.read(rs1) >> shamt);
                }
                (0x5, 0x01) => {
                    // divu
                    let dividend = cpu.int_regs.read(rs1);
                    let divisor = cpu.int_regs.read(rs2);
                    cpu.int_regs.write(
                        rd,
                        if divisor == 0 {
                            u64::MAX
                        } else {
                            dividend.wrapping_div(divisor)
                        },
                    );
                }
                (0x5, 0x20) => {
                    // sra
                    cpu.int_regs
                        .write(rd, ((cpu.int_regs.read(rs1) as i64) >> shamt) as u64);
                }
                (0x6, 0x00) => {
                    // or
                    cpu.int_regs
                        .write(rd, cpu.int_regs.read(rs1) | cpu.int_regs.read(rs2));
                }
                (0x6, 0x01) => {
                    // rem
                    let dividend = cpu.int_regs.read(rs1) as i64;
                    let divisor = cpu.int_regs.read(rs2) as i64;
                    cpu.int_regs.write(
                        rd,
                        if divisor == 0 {
                            // The remainder of division by zero equals the dividend.
                            dividend as u64
                        } else if dividend == i64::MIN && divisor == -1 {
                            0
                        } else {
                            dividend.wrapping_rem(divisor) as u64
                        },
                    );
                }
                (0x7, 0x00) => {
                    // and
                    cpu.int_regs
                        .write(rd, cpu.int_regs.read(rs1) & cpu.int_regs.read(rs2));
                }
                (0x7, 0x01) => {
                    // remu
                    let dividend = cpu.int_regs.read(rs1);
                    let divisor = cpu.int_regs.read(rs2);
                    cpu.int_regs.write(
                        rd,
                        if divisor == 0 {
                            dividend
                        } else {
                            dividend.wrapping_rem(divisor)
                        },
                    );
                }
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            }
        }
        0x37 => {
            // lui
            cpu.int_regs
                .write(rd, (insn & 0xffff_f000) as i32 as i64 as u64);
        }
        0x3b => {
            // RV64I and RV64M, 32-bit variants. The shift amount is rs2[4:0].
            let shamt = cpu.int_regs.read(rs2) & 0x1f;
            match (funct3, funct7) {
                (0x0, 0x00) => {
                    // addw
                    cpu.int_regs.write(
                        rd,
                        cpu.int_regs.read(rs1).wrapping_add(cpu.int_regs.read(rs2)) as i32 as i64
                            as u64,
                    );
                }
                (0x0, 0x01) => {
                    // mulw
                    let n1 = cpu.int_regs.read(rs1) as i32;
                    let n2 = cpu.int_regs.read(rs2) as i32;
                    cpu.int_regs.write(rd, n1.wrapping_mul(n2) as i64 as u64);
                }
                (0x0, 0x20) => {
                    // subw
                    cpu.int_regs.write(
                        rd,
                        cpu.int_regs.read(rs1).wrapping_sub(cpu.int_regs.read(rs2)) as i32 as i64
                            as u64,
                    );
                }
                (0x1, 0x00) => {
                    // sllw
                    cpu.int_regs
                        .write(rd, (cpu.int_regs.read(rs1) << shamt) as i32 as i64 as u64);
                }
                (0x4, 0x01) => {
                    // divw
                    let dividend = cpu.int_regs.read(rs1) as i32;
                    let divisor = cpu.int_regs.read(rs2) as i32;
                    cpu.int_regs.write(
                        rd,
                        if divisor == 0 {
                            u64::MAX
                        } else if dividend == i32::MIN && divisor == -1 {
                            dividend as i64 as u64
                        } else {
                            dividend.wrapping_div(divisor) as i64 as u64
                        },
                    );
                }
                (0x5, 0x00) => {
                    // srlw
                    cpu.int_regs.write(
                        rd,
                        ((cpu.int_regs.read(rs1) as u32) >> shamt) as i32 as i64 as u64,
                    );
                }
                (0x5, 0x01) => {
                    // divuw
                    let dividend = cpu.int_regs.read(rs1) as u32;
                    let divisor = cpu.int_regs.read(rs2) as u32;
                    cpu.int_regs.write(
                        rd,
                        if divisor == 0 {
                            u64::MAX
                        } else {
                            dividend.wrapping_div(divisor) as i32 as i64 as u64
                        },
                    );
                }
                (0x5, 0x20) => {
                    // sraw
                    cpu.int_regs
                        .write(rd, ((cpu.int_regs.read(rs1) as i32) >> shamt) as i64 as u64);
                }
                (0x6, 0x01) => {
                    // remw
                    let dividend = cpu.int_regs.read(rs1) as i32;
                    let divisor = cpu.int_regs.read(rs2) as i32;
                    cpu.int_regs.write(
                        rd,
                        if divisor == 0 {
                            dividend as i64 as u64
                        } else if dividend == i32::MIN && divisor == -1 {
                            0
                        } else {
                            dividend.wrapping_rem(divisor) as i64 as u64
                        },
                    );
                }
                (0x7, 0x01) => {
                    // remuw
                    let dividend = cpu.int_regs.read(rs1) as u32;
                    let divisor = cpu.int_regs.read(rs2) as u32;
                    cpu.int_regs.write(
                        rd,
                        if divisor == 0 {
                            dividend as i32 as i64 as u64
                        } else {
                            dividend.wrapping_rem(divisor) as i32 as i64 as u64
                        },
                    );
                }
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            }
        }
        0x63 => {
            // imm[12|10:5|4:1|11] = insn[31|30:25|11:8|7]
            let imm = (((insn & 0x8000_0000) as i32 as i64 >> 19) as u64)
                | ((insn & 0x80) << 4)
                | ((insn >> 20) & 0x7e0)
                | ((insn >> 7) & 0x1e);

            let taken = match funct3 {
                0x0 => cpu.int_regs.read(rs1) == cpu.int_regs.read(rs2), // beq
                0x1 => cpu.int_regs.read(rs1) != cpu.int_regs.read(rs2), // bne
                0x4 => (cpu.int_regs.read(rs1) as i64) < (cpu.int_regs.read(rs2) as i64), // blt
                0x5 => (cpu.int_regs.read(rs1) as i64) >= (cpu.int_regs.read(rs2) as i64), // bge
                0x6 => cpu.int_regs.read(rs1) < cpu.int_regs.read(rs2),  // bltu
                0x7 => cpu.int_regs.read(rs1) >= cpu.int_regs.read(rs2), // bgeu
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            };
            if taken {
                cpu.pc = cpu.pc.wrapping_add(imm).wrapping_sub(4);
            }
        }
        0x67 => {
            // jalr
            let t = cpu.pc;
            let offset = ((insn as i32 as i64) >> 20) as u64;
            cpu.pc = cpu.int_regs.read(rs1).wrapping_add(offset) & !1;
            cpu.int_regs.write(rd, t);
        }
        0x6f => {
            // jal
            cpu.int_regs.write(rd, cpu.pc);

            // imm[20|10:1|11|19:12] = insn[31|30:21|20|19:12]
            let offset = (((insn & 0x8000_0000) as i32 as i64 >> 11) as u64)
                | (insn & 0xff000)
                | ((insn >> 9) & 0x800)
                | ((insn >> 20) & 0x7fe);

            cpu.pc = cpu.pc.wrapping_add(offset).wrapping_sub(4);
        }
        0x73 => {
            let csr_addr = ((insn >> 20) & 0xfff) as u16;
            match funct3 {
                0x0 => match (rs2, funct7) {
                    (0x0, 0x0) => {
                        // ecall
                        return Err(match cpu.mode {
                            Mode::User => Exception::EnvironmentCallFromUMode,
                            Mode::Supervisor => Exception::EnvironmentCallFromSMode,
                            Mode::Machine => Exception::EnvironmentCallFromMMode,
                        });
                    }
                    (0x1, 0x0) => {
                        // ebreak
                        return Err(Exception::Breakpoint);
                    }
                    (0x2, 0x8) => {
                        // sret
                        cpu.pc = cpu.state.read(SEPC);
                        cpu.mode = if cpu.state.read_bit(SSTATUS, XSTATUS_SPP_BIT) {
                            Mode::Supervisor
                        } else {
                            Mode::User
                        };
                        let spie = cpu.state.read_bit(SSTATUS, XSTATUS_SPIE_BIT);
                        cpu.state.write_bit(SSTATUS, XSTATUS_SIE_BIT, spie);
                        cpu.state.write_bit(SSTATUS, XSTATUS_SPIE_BIT, true);
                        cpu.state.write_bit(SSTATUS, XSTATUS_SPP_BIT, false);
                    }
                    (0x2, 0x18) => {
                        // mret
                        cpu.pc = cpu.state.read(MEPC);
                        let mpp = (cpu.state.read(MSTATUS) >> MSTATUS_MPP_SHIFT) & 0b11;
                        cpu.mode = match mpp {
                            0b11 => Mode::Machine,
                            0b01 => Mode::Supervisor,
                            _ => Mode::User,
                        };
                        let mpie = cpu.state.read_bit(MSTATUS, MSTATUS_MPIE_BIT);
                        cpu.state.write_bit(MSTATUS, MSTATUS_MIE_BIT, mpie);
                        cpu.state.write_bit(MSTATUS, MSTATUS_MPIE_BIT, true);
                        let mstatus = cpu.state.read(MSTATUS);
                        cpu.state
                            .write(MSTATUS, mstatus & !(0b11 << MSTATUS_MPP_SHIFT));
                    }
                    (_, 0x9) => {
                        // sfence.vma
                        // Translation state is recomputed on every walk, so
                        // there is nothing to flush.
                    }
                    _ => {
                        return Err(Exception::IllegalInstruction(insn));
                    }
                },
                0x1 => {
                    // csrrw
                    let t = cpu.state.read(csr_addr);
                    cpu.state.write(csr_addr, cpu.int_regs.read(rs1));
                    cpu.int_regs.write(rd, t);

                    if csr_addr == SATP {
                        cpu.update_paging();
                    }
                }
                0x2 => {
                    // csrrs
                    let t = cpu.state.read(csr_addr);
                    cpu.state.write(csr_addr, t | cpu.int_regs.read(rs1));
                    cpu.int_regs.write(rd, t);

                    if csr_addr == SATP {
                        cpu.update_paging();
                    }
                }
                0x3 => {
                    // csrrc
                    let t = cpu.state.read(csr_addr);
                    cpu.state.write(csr_addr, t & !cpu.int_regs.read(rs1));
                    cpu.int_regs.write(rd, t);

                    if csr_addr == SATP {
                        cpu.update_paging();
                    }
                }
                0x5 => {
                    // csrrwi: rs1 is a 5-bit literal
                    cpu.int_regs.write(rd, cpu.state.read(csr_addr));
                    cpu.state.write(csr_addr, rs1);

                    if csr_addr == SATP {
                        cpu.update_paging();
                    }
                }
                0x6 => {
                    // csrrsi
                    let t = cpu.state.read(csr_addr);
                    cpu.state.write(csr_addr, t | rs1);
                    cpu.int_regs.write(rd, t);

                    if csr_addr == SATP {
                        cpu.update_paging();
                    }
                }
                0x7 => {
                    // csrrci
                    let t = cpu.state.read(csr_addr);
                    cpu.state.write(csr_addr, t & !rs1);
                    cpu.int_regs.write(rd, t);

                    if csr_addr == SATP {
                        cpu.update_paging();
                    }
                }
                _ => {
                    return Err(Exception::IllegalInstruction(insn));
                }
            }
        }
        _ => {
            return Err(Exception::IllegalInstruction(insn));
        }
    }
    Ok(())
}
