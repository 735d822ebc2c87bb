use crate::cond::Condition;
use crate::disasm::fmt_decoded;
use crate::memory::Bus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    W16 = 2,
    W32 = 4,
}

impl Width {
    #[inline]
    pub fn stride(self) -> u32 {
        self as u32
    }
}

/// Operation tag. The execution side dispatches on this together with the
/// operand shapes and the instruction width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    /// No format matched.
    Unclassified,
    /// ARM data-processing word with a register-shifted operand, recognized
    /// but not decoded further.
    DataProcessing,
    B,
    Bl,
    Bx,
    Mov,
    Add,
    Sub,
    Cmp,
    And,
    Tst,
    Neg,
    Orr,
    Mul,
    Bic,
    Lsl,
    Lsr,
    Asr,
    Nop,
    MsrCpsr,
    MsrSpsr,
    Ldr,
    Str,
    Ldrb,
    Strb,
    Ldrh,
    Strh,
    Push,
    Pop,
    Stmia,
    Ldmia,
}

impl Op {
    pub fn name(self) -> &'static str {
        match self {
            Op::Unclassified => "???",
            Op::DataProcessing => "<data-processing>",
            Op::B => "B",
            Op::Bl => "BL",
            Op::Bx => "BX",
            Op::Mov => "MOV",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Cmp => "CMP",
            Op::And => "AND",
            Op::Tst => "TST",
            Op::Neg => "NEG",
            Op::Orr => "ORR",
            Op::Mul => "MUL",
            Op::Bic => "BIC",
            Op::Lsl => "LSL",
            Op::Lsr => "LSR",
            Op::Asr => "ASR",
            Op::Nop => "NOP",
            Op::MsrCpsr | Op::MsrSpsr => "MSR",
            Op::Ldr => "LDR",
            Op::Str => "STR",
            Op::Ldrb => "LDRB",
            Op::Strb => "STRB",
            Op::Ldrh => "LDRH",
            Op::Strh => "STRH",
            Op::Push => "PUSH",
            Op::Pop => "POP",
            Op::Stmia => "STMIA",
            Op::Ldmia => "LDMIA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Register index, 0..=15.
    Reg(u8),
    Imm(u32),
    /// Signed displacement that is not folded into an address.
    Offset(i32),
    /// Absolute program-image address.
    Addr(u32),
    /// Low-register inclusion mask (bit n = rn).
    RegList(u8),
    Flag(bool),
}

impl Operand {
    /// The operand as a plain number, for positional consumers.
    pub fn value(self) -> u32 {
        match self {
            Operand::Reg(r) => r as u32,
            Operand::Imm(v) | Operand::Addr(v) => v,
            Operand::Offset(o) => o as u32,
            Operand::RegList(l) => l as u32,
            Operand::Flag(f) => f as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub op: Op,
    pub operands: Vec<Operand>,
    /// Always present for ARM words; THUMB only sets it on conditional branches.
    pub cond: Option<Condition>,
    pub mnemonic: String,
    pub addr: u32,
    pub raw: u32,
    pub width: Width,
}

impl Decoded {
    /// Assemble an entry and render its mnemonic.
    pub fn new(
        op: Op,
        operands: Vec<Operand>,
        cond: Option<Condition>,
        addr: u32,
        raw: u32,
        width: Width,
    ) -> Self {
        let mut d = Self {
            op,
            operands,
            cond,
            mnemonic: String::new(),
            addr,
            raw,
            width,
        };
        d.mnemonic = fmt_decoded(&d);
        d
    }

    pub fn unclassified(width: Width, addr: u32, raw: u32) -> Self {
        Self {
            op: Op::Unclassified,
            operands: Vec::new(),
            cond: None,
            mnemonic: Op::Unclassified.name().to_string(),
            addr,
            raw,
            width,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.op != Op::Unclassified
    }

    /// Operand values as plain numbers.
    pub fn values(&self) -> Vec<u32> {
        self.operands.iter().map(|o| o.value()).collect()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Bus error at {addr:#010x}: {source}")]
    Bus {
        addr: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("Slot {slot} at {addr:#010x} lies outside the image")]
    SlotOutOfRange { slot: usize, addr: u32 },
}

/// One instruction encoding. `decode` classifies `raw`, fetched from `addr`,
/// and may read further words (PC-relative literals, the second half of a
/// THUMB long branch) through `bus`.
pub trait Decoder {
    const WIDTH: Width;

    fn decode<B: Bus>(&self, bus: &mut B, addr: u32, raw: u32) -> Result<Decoded, DecodeError>;
}

/// Read through the bus, tagging failures with the faulting address.
pub(crate) fn fetch<B: Bus>(bus: &mut B, addr: u32, size: u8) -> Result<u32, DecodeError> {
    bus.read(addr, size)
        .map_err(|source| DecodeError::Bus { addr, source })
}
