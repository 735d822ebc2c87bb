use bitflags::bitflags;

use crate::bits::{bit_at, bit_range, bit_set, rotate_right, sign_extend};
use crate::cond::Condition;
use crate::decoder::{fetch, Decoded, DecodeError, Decoder, Op, Operand, Width};
use crate::memory::Bus;

const PC: u32 = 15;

bitflags! {
    /// MSR field selectors (instruction bits 16 and 19).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PsrFields: u32 {
        const CONTROL = 1 << 16;
        const FLAGS = 1 << 19;
    }
}

impl PsrFields {
    pub fn from_instr(raw: u32) -> Self {
        Self::from_bits_truncate(raw)
    }

    /// PSR bits the move is allowed to write.
    pub fn mask(self) -> u32 {
        let mut mask = 0;
        if self.contains(Self::FLAGS) {
            mask |= 0xFF00_0000;
        }
        if self.contains(Self::CONTROL) {
            mask |= 0x0000_00FF;
        }
        mask
    }
}

/// ARM (32-bit) decoder for the ARMv4T subset the emulator executes:
/// BX, B/BL, LDR/STR word, MSR, ADD and MOV.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArmDecoder;

impl ArmDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ArmDecoder {
    const WIDTH: Width = Width::W32;

    fn decode<B: Bus>(&self, bus: &mut B, addr: u32, raw: u32) -> Result<Decoded, DecodeError> {
        let cond = Condition::from_bits(bit_range(raw, 28, 31));
        let rd = bit_range(raw, 12, 15);

        let (op, operands) = if bit_range(raw, 8, 27) == 0x12FFF {
            // BX Rn
            (Op::Bx, vec![Operand::Reg(bit_range(raw, 0, 3) as u8)])
        } else if bit_range(raw, 25, 27) == 0b101 {
            branch(addr, raw)
        } else if bit_range(raw, 26, 27) == 0b01 {
            transfer(bus, addr, raw)?
        } else if bit_range(raw, 25, 27) == 0 && bit_at(raw, 7) == 0 && bit_set(raw, 4) && rd != PC {
            // Shift-by-register operand: left to a full data-processing decoder.
            (Op::DataProcessing, Vec::new())
        } else {
            psr_or_alu(addr, raw)
        };

        Ok(Decoded::new(op, operands, Some(cond), addr, raw, Width::W32))
    }
}

/// B / BL: 24-bit signed word offset relative to PC (addr + 8).
fn branch(addr: u32, raw: u32) -> (Op, Vec<Operand>) {
    let off = sign_extend(bit_range(raw, 0, 23), 24).wrapping_mul(4);
    let target = addr.wrapping_add(8).wrapping_add(off as u32);
    let op = if bit_set(raw, 24) { Op::Bl } else { Op::B };
    (op, vec![Operand::Addr(target)])
}

/// LDR / STR word with a 12-bit immediate offset. A PC base is resolved to
/// the literal it addresses.
fn transfer<B: Bus>(bus: &mut B, addr: u32, raw: u32) -> Result<(Op, Vec<Operand>), DecodeError> {
    let op = if bit_set(raw, 20) { Op::Ldr } else { Op::Str };
    let rd = Operand::Reg(bit_range(raw, 12, 15) as u8);
    let rn = bit_range(raw, 16, 19);
    let off = bit_range(raw, 0, 11);

    if rn == PC {
        let pc = addr.wrapping_add(8);
        let lit = if bit_set(raw, 23) { pc.wrapping_add(off) } else { pc.wrapping_sub(off) };
        let value = fetch(bus, lit, 4)?;
        return Ok((op, vec![rd, Operand::Imm(value)]));
    }
    Ok((op, vec![rd, Operand::Reg(rn as u8), Operand::Imm(off)]))
}

fn psr_or_alu(addr: u32, raw: u32) -> (Op, Vec<Operand>) {
    let opcode = bit_range(raw, 21, 24);

    if !bit_set(raw, 18) && (0x8..=0xB).contains(&opcode) {
        let fields = PsrFields::from_instr(raw);
        let op = if bit_set(raw, 22) { Op::MsrSpsr } else { Op::MsrCpsr };
        let operands = vec![
            Operand::Reg(bit_range(raw, 0, 3) as u8),
            Operand::Flag(fields.contains(PsrFields::FLAGS)),
            Operand::Flag(fields.contains(PsrFields::CONTROL)),
            Operand::Imm(fields.mask()),
        ];
        return (op, operands);
    }

    let rd = Operand::Reg(bit_range(raw, 12, 15) as u8);
    let rn = bit_range(raw, 16, 19);
    let op2 = shifter_operand(raw);

    match opcode {
        0x4 => match op2 {
            Operand::Imm(v) if rn == PC => {
                let value = addr.wrapping_add(8).wrapping_add(v);
                (Op::Add, vec![rd, Operand::Addr(value)])
            }
            _ => (Op::Add, vec![rd, Operand::Reg(rn as u8), op2]),
        },
        0xD => (Op::Mov, vec![rd, op2]),
        _ => (Op::Unclassified, Vec::new()),
    }
}

/// Second operand of a data-processing word. Immediates are rotated in
/// place and a plain register is passed through. Shifted registers are not
/// evaluated here and read as zero.
fn shifter_operand(raw: u32) -> Operand {
    if bit_set(raw, 25) {
        let rot = bit_range(raw, 8, 11) * 2;
        Operand::Imm(rotate_right(bit_range(raw, 0, 7), 32, rot))
    } else if bit_range(raw, 4, 11) == 0 {
        Operand::Reg(bit_range(raw, 0, 3) as u8)
    } else {
        Operand::Imm(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psr_mask_combines_fields() {
        assert_eq!(PsrFields::from_instr(0x0008_0000).mask(), 0xFF00_0000);
        assert_eq!(PsrFields::from_instr(0x0001_0000).mask(), 0xFF);
        assert_eq!(PsrFields::from_instr(0x0009_0000).mask(), 0xFF00_00FF);
        assert_eq!(PsrFields::from_instr(0x0006_0000).mask(), 0);
    }

    #[test]
    fn shifter_operand_forms() {
        // MOV r0, #0xFF000000 (imm 0xFF, rot 4 -> ror 8)
        assert_eq!(shifter_operand(0xE3A0_04FF), Operand::Imm(0xFF00_0000));
        assert_eq!(shifter_operand(0xE1A0_1002), Operand::Reg(2));
        // MOV r1, r2, LSL #1
        assert_eq!(shifter_operand(0xE1A0_1082), Operand::Imm(0));
    }
}
