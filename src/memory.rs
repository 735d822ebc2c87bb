use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Read access to the loaded program image. All reads are little-endian and
/// take absolute addresses.
pub trait Bus {
    fn read_u8(&mut self, addr: u32) -> Result<u8>;
    fn read_u16(&mut self, addr: u32) -> Result<u16>;
    fn read_u32(&mut self, addr: u32) -> Result<u32>;

    /// Number of image bytes mapped from the image base upwards.
    fn size(&self) -> u32;

    /// Sized read; `size` must be 1, 2 or 4.
    fn read(&mut self, addr: u32, size: u8) -> Result<u32> {
        match size {
            1 => Ok(self.read_u8(addr)? as u32),
            2 => Ok(self.read_u16(addr)? as u32),
            4 => self.read_u32(addr),
            _ => Err(MemoryError::BadSize { size }.into()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Read of {size} byte(s) at {addr:#010x} is outside the image")]
    OutOfRange { addr: u32, size: u8 },
    #[error("Unsupported access size {size}")]
    BadSize { size: u8 },
}

/// A flat program image mapped at `base`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
    pub base: u32,
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self {
            mem: vec![0; size],
            base: 0,
        }
    }

    pub fn from_bytes(base: u32, bytes: &[u8]) -> Self {
        Self {
            mem: bytes.to_vec(),
            base,
        }
    }

    /// Lay out 32-bit words back to back from `base`.
    pub fn from_words(base: u32, words: &[u32]) -> Self {
        let mem = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        Self { mem, base }
    }

    /// Lay out 16-bit halfwords back to back from `base`.
    pub fn from_halfwords(base: u32, halves: &[u16]) -> Self {
        let mem = halves.iter().flat_map(|h| h.to_le_bytes()).collect();
        Self { mem, base }
    }

    fn span(&self, addr: u32, size: u8) -> Result<std::ops::Range<usize>, MemoryError> {
        let oob = MemoryError::OutOfRange { addr, size };
        let off = addr.checked_sub(self.base).ok_or(oob)? as usize;
        let end = off.checked_add(size as usize).ok_or(oob)?;
        if end > self.mem.len() {
            return Err(oob);
        }
        Ok(off..end)
    }

    pub fn write_u16(&mut self, addr: u32, val: u16) -> Result<()> {
        let r = self.span(addr, 2)?;
        self.mem[r].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u32, val: u32) -> Result<()> {
        let r = self.span(addr, 4)?;
        self.mem[r].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }
}

impl Bus for LinearMemory {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        let r = self.span(addr, 1)?;
        Ok(self.mem[r.start])
    }
    fn read_u16(&mut self, addr: u32) -> Result<u16> {
        let r = self.span(addr, 2)?;
        Ok(u16::from_le_bytes([self.mem[r.start], self.mem[r.start + 1]]))
    }
    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        let r = self.span(addr, 4)?;
        let b = &self.mem[r];
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
    fn size(&self) -> u32 {
        self.mem.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_little_endian_and_rebased() {
        let mut mem = LinearMemory::from_bytes(0x0800_0000, &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(mem.read_u32(0x0800_0000).unwrap(), 0x1234_5678);
        assert_eq!(mem.read_u16(0x0800_0002).unwrap(), 0x1234);
        assert_eq!(mem.read(0x0800_0001, 1).unwrap(), 0x56);
    }

    #[test]
    fn out_of_range_reads_fail() {
        let mut mem = LinearMemory::from_bytes(0x100, &[0; 4]);
        let err = mem.read_u32(0x102).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MemoryError>(),
            Some(&MemoryError::OutOfRange { addr: 0x102, size: 4 })
        );
        assert!(mem.read_u8(0xFF).is_err());
        assert!(mem.read(0x100, 3).is_err());
    }

    #[test]
    fn writes_round_trip() {
        let mut mem = LinearMemory::new(8);
        mem.write_u32(4, 0xCAFE_BABE).unwrap();
        mem.write_u16(0, 0xBEEF).unwrap();
        assert_eq!(mem.read_u32(4).unwrap(), 0xCAFE_BABE);
        assert_eq!(mem.read_u16(0).unwrap(), 0xBEEF);
        assert!(mem.write_u32(6, 0).is_err());
    }
}
