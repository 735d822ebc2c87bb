use serde::{Deserialize, Serialize};
use std::fmt;

/// ARM condition field (bits 28..31 of an ARM word, bits 8..11 of a THUMB
/// conditional branch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Eq,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
    Nv,
}

impl Condition {
    pub const ALL: [Condition; 16] = [
        Condition::Eq,
        Condition::Ne,
        Condition::Cs,
        Condition::Cc,
        Condition::Mi,
        Condition::Pl,
        Condition::Vs,
        Condition::Vc,
        Condition::Hi,
        Condition::Ls,
        Condition::Ge,
        Condition::Lt,
        Condition::Gt,
        Condition::Le,
        Condition::Al,
        Condition::Nv,
    ];

    /// Only the low four bits of `bits` are looked at.
    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        Self::ALL[(bits & 0xF) as usize]
    }

    #[inline]
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Mnemonic suffix; `Al` renders as nothing.
    pub fn suffix(self) -> &'static str {
        match self {
            Condition::Eq => "EQ",
            Condition::Ne => "NE",
            Condition::Cs => "CS",
            Condition::Cc => "CC",
            Condition::Mi => "MI",
            Condition::Pl => "PL",
            Condition::Vs => "VS",
            Condition::Vc => "VC",
            Condition::Hi => "HI",
            Condition::Ls => "LS",
            Condition::Ge => "GE",
            Condition::Lt => "LT",
            Condition::Gt => "GT",
            Condition::Le => "LE",
            Condition::Al => "",
            Condition::Nv => "NV",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Where a resolved branch target lies relative to the branching instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Backward,
    Forward,
    SelfLoop,
}

impl Direction {
    pub fn marker(self) -> &'static str {
        match self {
            Direction::Backward => "↑",
            Direction::Forward => "↓",
            Direction::SelfLoop => "←",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

pub fn direction(target: u32, current: u32) -> Direction {
    use std::cmp::Ordering::*;
    match target.cmp(&current) {
        Less => Direction::Backward,
        Greater => Direction::Forward,
        Equal => Direction::SelfLoop,
    }
}
