use serde::{Deserialize, Serialize};

use crate::bits::{bit_at, bit_range, bit_set, left_shift, sign_extend};
use crate::cond::Condition;
use crate::decoder::{fetch, Decoded, DecodeError, Decoder, Op, Operand, Width};
use crate::memory::Bus;

const SP: u8 = 13;
const BL_MIDPOINT: u32 = 0x40_0000;

/// THUMB instruction format families, numbered as in the ARM7TDMI data
/// sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThumbFormat {
    MoveShifted,
    AddSub,
    Immediate,
    Alu,
    HiReg,
    PcLoad,
    LoadStoreReg,
    LoadStoreSignExt,
    LoadStoreImm,
    LoadStoreHalf,
    SpLoadStore,
    LoadAddress,
    SpAdjust,
    PushPop,
    MultipleLoadStore,
    CondBranch,
    /// BKPT and SWI; recognized but never assigned an operation.
    Exception,
    Branch,
    LongBranchLink,
}

impl ThumbFormat {
    pub fn number(self) -> u8 {
        self as u8 + 1
    }
}

/// Pick the format family of a halfword. Narrow patterns are tested before
/// the wider ones that contain them. `None` for the encodings outside the
/// nineteen families (the BLX suffix and a stray BL second half).
pub fn classify(raw: u32) -> Option<ThumbFormat> {
    use ThumbFormat::*;
    let top = bit_range(raw, 8, 15);
    let format = match bit_range(raw, 11, 15) {
        0b00000..=0b00010 => MoveShifted,
        0b00011 => AddSub,
        0b00100..=0b00111 => Immediate,
        0b01000 if bit_set(raw, 10) => HiReg,
        0b01000 => Alu,
        0b01001 => PcLoad,
        0b01010 | 0b01011 if bit_set(raw, 9) => LoadStoreSignExt,
        0b01010 | 0b01011 => LoadStoreReg,
        0b01100..=0b01111 => LoadStoreImm,
        0b10000 | 0b10001 => LoadStoreHalf,
        0b10010 | 0b10011 => SpLoadStore,
        0b10100 | 0b10101 => LoadAddress,
        0b10110 | 0b10111 => match top {
            0xB0 => SpAdjust,
            0xBE => Exception,
            _ => PushPop,
        },
        0b11000 | 0b11001 => MultipleLoadStore,
        0b11010 | 0b11011 if top == 0xDF => Exception,
        0b11010 | 0b11011 => CondBranch,
        0b11100 => Branch,
        0b11110 => LongBranchLink,
        _ => return None,
    };
    Some(format)
}

/// THUMB (16-bit) decoder. `raw` carries the halfword in its low 16 bits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThumbDecoder;

impl ThumbDecoder {
    pub fn new() -> Self {
        Self
    }
}

type Shape = (Op, Vec<Operand>);

fn unclassified() -> Shape {
    (Op::Unclassified, Vec::new())
}

impl Decoder for ThumbDecoder {
    const WIDTH: Width = Width::W16;

    fn decode<B: Bus>(&self, bus: &mut B, addr: u32, raw: u32) -> Result<Decoded, DecodeError> {
        let raw = raw & 0xFFFF;
        let Some(format) = classify(raw) else {
            return Ok(Decoded::unclassified(Width::W16, addr, raw));
        };

        let mut cond = None;
        let (op, operands) = match format {
            ThumbFormat::MoveShifted => move_shifted(raw),
            ThumbFormat::AddSub => add_sub(raw),
            ThumbFormat::Immediate => immediate(raw),
            ThumbFormat::Alu => alu(raw),
            ThumbFormat::HiReg => hi_reg(raw),
            ThumbFormat::PcLoad => pc_load(bus, addr, raw)?,
            ThumbFormat::LoadStoreReg => load_store_reg(raw),
            ThumbFormat::LoadStoreSignExt => load_store_sign_ext(raw),
            ThumbFormat::LoadStoreImm => load_store_imm(raw),
            ThumbFormat::LoadStoreHalf => load_store_half(raw),
            ThumbFormat::SpLoadStore => sp_load_store(raw),
            ThumbFormat::LoadAddress => load_address(addr, raw),
            ThumbFormat::SpAdjust => sp_adjust(raw),
            ThumbFormat::PushPop => push_pop(raw),
            ThumbFormat::MultipleLoadStore => multiple_load_store(raw),
            ThumbFormat::CondBranch => {
                let c = bit_range(raw, 8, 11);
                if c >= 0xE {
                    unclassified()
                } else {
                    cond = Some(Condition::from_bits(c));
                    (Op::B, vec![Operand::Addr(branch_target(addr, bit_range(raw, 0, 7)))])
                }
            }
            ThumbFormat::Exception => unclassified(),
            // Same 8-bit offset field as the conditional family.
            ThumbFormat::Branch => (Op::B, vec![Operand::Addr(branch_target(addr, bit_range(raw, 0, 7)))]),
            ThumbFormat::LongBranchLink => long_branch_link(bus, addr, raw)?,
        };

        if op == Op::Unclassified {
            return Ok(Decoded::unclassified(Width::W16, addr, raw));
        }
        Ok(Decoded::new(op, operands, cond, addr, raw, Width::W16))
    }
}

#[inline]
fn lo(raw: u32, at: u32) -> Operand {
    Operand::Reg(bit_range(raw, at, at + 2) as u8)
}

/// Format 1: LSL / LSR / ASR Rd, Rs, #offset5.
fn move_shifted(raw: u32) -> Shape {
    let (rd, rs) = (lo(raw, 0), lo(raw, 3));
    let amount = bit_range(raw, 6, 10);
    // A right shift by zero encodes a shift by 32.
    let right = if amount == 0 { 32 } else { amount };
    match bit_range(raw, 11, 12) {
        0 => (Op::Lsl, vec![rd, rs, Operand::Imm(amount)]),
        1 => (Op::Lsr, vec![rd, rs, Operand::Imm(right)]),
        2 => (Op::Asr, vec![rd, rs, Operand::Imm(right)]),
        _ => unclassified(),
    }
}

/// Format 2: ADD / SUB Rd, Rs, Rn and ADD / SUB Rd, Rs, #imm3.
fn add_sub(raw: u32) -> Shape {
    let (rd, rs) = (lo(raw, 0), lo(raw, 3));
    let field = bit_range(raw, 6, 8);
    match bit_range(raw, 9, 10) {
        0 => (Op::Add, vec![rd, rs, Operand::Reg(field as u8)]),
        1 => (Op::Sub, vec![rd, rs, Operand::Reg(field as u8)]),
        2 => (Op::Add, vec![rd, rs, Operand::Imm(field)]),
        _ => (Op::Sub, vec![rd, rs, Operand::Imm(field)]),
    }
}

/// Format 3: MOV / CMP / ADD / SUB Rd, #imm8.
fn immediate(raw: u32) -> Shape {
    let operands = vec![lo(raw, 8), Operand::Imm(bit_range(raw, 0, 7))];
    let op = match bit_range(raw, 11, 12) {
        0 => Op::Mov,
        1 => Op::Cmp,
        2 => Op::Add,
        _ => Op::Sub,
    };
    (op, operands)
}

/// Format 4: two-register ALU operations.
fn alu(raw: u32) -> Shape {
    let op = match bit_range(raw, 6, 9) {
        0x0 => Op::And,
        0x8 => Op::Tst,
        0x9 => Op::Neg,
        0xA => Op::Cmp,
        0xC => Op::Orr,
        0xD => Op::Mul,
        0xE => Op::Bic,
        _ => return unclassified(),
    };
    (op, vec![lo(raw, 0), lo(raw, 3)])
}

/// Format 5: ADD / MOV on the full register file, and BX.
fn hi_reg(raw: u32) -> Shape {
    let rd = (left_shift(bit_at(raw, 7), 3) + bit_range(raw, 0, 2)) as u8;
    let rs = (left_shift(bit_at(raw, 6), 3) + bit_range(raw, 3, 5)) as u8;
    match bit_range(raw, 8, 9) {
        0 => (Op::Add, vec![Operand::Reg(rd), Operand::Reg(rs)]),
        2 if rd == 8 && rs == 8 => (Op::Nop, Vec::new()),
        2 => (Op::Mov, vec![Operand::Reg(rd), Operand::Reg(rs)]),
        3 if !bit_set(raw, 7) => (Op::Bx, vec![Operand::Reg(rs)]),
        _ => unclassified(),
    }
}

/// Word-aligned PC as seen by PC-relative THUMB forms.
#[inline]
fn aligned_pc(addr: u32) -> u32 {
    addr.wrapping_add(4) & !3
}

/// Format 6: LDR Rd, [PC, #imm8 * 4], resolved to the literal.
fn pc_load<B: Bus>(bus: &mut B, addr: u32, raw: u32) -> Result<Shape, DecodeError> {
    let lit = aligned_pc(addr).wrapping_add(bit_range(raw, 0, 7) * 4);
    let value = fetch(bus, lit, 4)?;
    Ok((Op::Ldr, vec![lo(raw, 8), Operand::Imm(value)]))
}

/// Format 7: STR / LDRB Rd, [Rb, Ro]. The STRB and LDR slots stay open.
fn load_store_reg(raw: u32) -> Shape {
    let operands = vec![lo(raw, 0), lo(raw, 3), lo(raw, 6)];
    match bit_range(raw, 10, 11) {
        0 => (Op::Str, operands),
        3 => (Op::Ldrb, operands),
        _ => unclassified(),
    }
}

/// Format 8: STRH Rd, [Rb, Ro]. The sign-extending loads stay open.
fn load_store_sign_ext(raw: u32) -> Shape {
    match bit_range(raw, 10, 11) {
        0 => (Op::Strh, vec![lo(raw, 0), lo(raw, 3), lo(raw, 6)]),
        _ => unclassified(),
    }
}

/// Format 9: word forms scale the offset by 4, byte forms don't.
fn load_store_imm(raw: u32) -> Shape {
    let off = bit_range(raw, 6, 10);
    let (op, off) = match bit_range(raw, 11, 12) {
        0 => (Op::Str, off * 4),
        1 => (Op::Ldr, off * 4),
        2 => (Op::Strb, off),
        _ => (Op::Ldrb, off),
    };
    (op, vec![lo(raw, 0), lo(raw, 3), Operand::Imm(off)])
}

/// Format 10: STRH / LDRH Rd, [Rb, #imm5 * 2].
fn load_store_half(raw: u32) -> Shape {
    let op = if bit_set(raw, 11) { Op::Ldrh } else { Op::Strh };
    let off = bit_range(raw, 6, 10) * 2;
    (op, vec![lo(raw, 0), lo(raw, 3), Operand::Imm(off)])
}

/// Format 11: LDR / STR Rd, [SP, #imm8 * 4].
fn sp_load_store(raw: u32) -> Shape {
    let op = if bit_set(raw, 11) { Op::Ldr } else { Op::Str };
    let off = bit_range(raw, 0, 7) * 4;
    (op, vec![lo(raw, 8), Operand::Reg(SP), Operand::Imm(off)])
}

/// Format 12: ADD Rd, PC|SP, #imm8 * 4. The PC form folds into an address.
fn load_address(addr: u32, raw: u32) -> Shape {
    let off = bit_range(raw, 0, 7) * 4;
    if bit_set(raw, 11) {
        (Op::Add, vec![lo(raw, 8), Operand::Reg(SP), Operand::Imm(off)])
    } else {
        (Op::Add, vec![lo(raw, 8), Operand::Addr(aligned_pc(addr).wrapping_add(off))])
    }
}

/// Format 13: ADD SP, #±imm7 * 4.
fn sp_adjust(raw: u32) -> Shape {
    let mag = (bit_range(raw, 0, 6) * 4) as i32;
    let off = if bit_set(raw, 7) { -mag } else { mag };
    (Op::Add, vec![Operand::Reg(SP), Operand::Offset(off)])
}

/// Format 14: PUSH {rlist[, LR]} / POP {rlist[, PC]}.
fn push_pop(raw: u32) -> Shape {
    let op = if bit_set(raw, 11) { Op::Pop } else { Op::Push };
    let operands = vec![
        Operand::RegList(bit_range(raw, 0, 7) as u8),
        Operand::Flag(bit_set(raw, 8)),
    ];
    (op, operands)
}

/// Format 15: STMIA / LDMIA Rb!, {rlist}.
fn multiple_load_store(raw: u32) -> Shape {
    let op = if bit_set(raw, 11) { Op::Ldmia } else { Op::Stmia };
    (op, vec![lo(raw, 8), Operand::RegList(bit_range(raw, 0, 7) as u8)])
}

/// Target of a B / B<cond>: signed 8-bit halfword offset from PC (addr + 4).
fn branch_target(addr: u32, field: u32) -> u32 {
    let off = sign_extend(field, 8) * 2;
    addr.wrapping_add(4).wrapping_add(off as u32)
}

/// Format 19: BL across two halfwords. The first carries offset bits 22..12,
/// the second (marked 0b11111 in bits 11..15) bits 11..1. Offsets above the
/// 0x400000 midpoint wrap negative; the midpoint itself stays forward.
fn long_branch_link<B: Bus>(bus: &mut B, addr: u32, raw: u32) -> Result<Shape, DecodeError> {
    let second = fetch(bus, addr.wrapping_add(2), 2)?;
    if bit_range(second, 11, 15) != 0b11111 {
        return Ok(unclassified());
    }
    let off = left_shift(bit_range(raw, 0, 10), 12) + left_shift(bit_range(second, 0, 10), 1);
    let off = if off > BL_MIDPOINT { off as i32 - 0x80_0000 } else { off as i32 };
    let next = addr.wrapping_add(4);
    let target = next.wrapping_add(off as u32);
    Ok((Op::Bl, vec![Operand::Addr(target), Operand::Addr(next | 1)]))
}
