pub mod bits;
pub mod cond;
pub mod decoder;
pub mod disasm;
pub mod engine;
pub mod memory;

pub mod isa {
    pub mod arm; // ARMv4T, 32-bit words
    pub mod thumb; // ARMv4T THUMB, 16-bit halfwords
}

pub use cond::{Condition, Direction};
pub use decoder::{Decoded, DecodeError, Decoder, Op, Operand, Width};
pub use engine::{DecodeStats, DecodeTable, Engine, EngineConfig};
pub use memory::{Bus, LinearMemory, MemoryError};
