use anyhow::Result;
use std::path::Path;

use arm7tdmi_decode::{Bus, MemoryError};

#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    pub base: u32,
    pub bytes: Vec<u8>,
    pub perms: &'static str, // e.g., "r-x"
    pub kind: &'static str,  // e.g., "raw"
}

impl Segment {
    pub fn end(&self) -> u32 {
        self.base.wrapping_add(self.bytes.len() as u32)
    }

    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.end()
    }
}

#[derive(Debug, Clone)]
pub struct Image {
    pub segments: Vec<Segment>,
}

impl Image {
    /// Lowest mapped address, or 0 for an empty image.
    pub fn base(&self) -> u32 {
        self.segments.iter().map(|s| s.base).min().unwrap_or(0)
    }

    /// Bytes from the lowest mapped address to the highest segment end.
    pub fn span(&self) -> u32 {
        let end = self.segments.iter().map(Segment::end).max().unwrap_or(0);
        end.saturating_sub(self.base())
    }
}

/// Load a flat ROM dump at `base`, dropping `skip` leading bytes and keeping
/// at most `len` bytes after that.
pub fn load_raw_bin(path: &Path, base: u32, skip: usize, len: Option<usize>) -> Result<Image> {
    let file = std::fs::read(path)?;
    anyhow::ensure!(skip <= file.len(), "--skip exceeds file size");
    let mut payload = &file[skip..];
    if let Some(lim) = len {
        anyhow::ensure!(lim <= payload.len(), "--len exceeds remaining file size after skip");
        payload = &payload[..lim];
    }
    let seg = Segment { name: "rom".into(), base, bytes: payload.to_vec(), perms: "r-x", kind: "raw" };
    Ok(Image { segments: vec![seg] })
}

pub fn read_u8(img: &Image, addr: u32) -> Option<u8> {
    img.segments
        .iter()
        .find(|s| s.contains(addr))
        .map(|s| s.bytes[(addr - s.base) as usize])
}

pub fn read_u16(img: &Image, addr: u32) -> Option<u16> {
    let b0 = read_u8(img, addr)?;
    let b1 = read_u8(img, addr.wrapping_add(1))?;
    Some(u16::from_le_bytes([b0, b1]))
}

pub fn read_u32(img: &Image, addr: u32) -> Option<u32> {
    let lo = read_u16(img, addr)?;
    let hi = read_u16(img, addr.wrapping_add(2))?;
    Some(((hi as u32) << 16) | lo as u32)
}

impl Bus for Image {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        read_u8(self, addr).ok_or_else(|| MemoryError::OutOfRange { addr, size: 1 }.into())
    }

    fn read_u16(&mut self, addr: u32) -> Result<u16> {
        read_u16(self, addr).ok_or_else(|| MemoryError::OutOfRange { addr, size: 2 }.into())
    }

    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        read_u32(self, addr).ok_or_else(|| MemoryError::OutOfRange { addr, size: 4 }.into())
    }

    fn size(&self) -> u32 {
        self.span()
    }
}
