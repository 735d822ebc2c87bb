use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::bits::bit_range;
use crate::cond::Condition;
use crate::decoder::{fetch, Decoded, DecodeError, Decoder, Op, Operand, Width};
use crate::isa::arm::ArmDecoder;
use crate::isa::thumb::ThumbDecoder;
use crate::memory::Bus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Absolute address of slot 0 in both encodings.
    pub base: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // GBA cartridge ROM window
            base: 0x0800_0000,
        }
    }
}

/// Decoded entries, one vector per encoding, indexed by slot.
///
/// Each slot holds a single [`Decoded`] value, so its operation, operands,
/// mnemonic and condition are always replaced together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeTable {
    arm: Vec<Option<Decoded>>,
    thumb: Vec<Option<Decoded>>,
}

impl DecodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preallocate room for `arm` word slots and `thumb` halfword slots.
    pub fn with_slots(arm: usize, thumb: usize) -> Self {
        Self {
            arm: vec![None; arm],
            thumb: vec![None; thumb],
        }
    }

    fn lane(&self, width: Width) -> &Vec<Option<Decoded>> {
        match width {
            Width::W32 => &self.arm,
            Width::W16 => &self.thumb,
        }
    }

    fn lane_mut(&mut self, width: Width) -> &mut Vec<Option<Decoded>> {
        match width {
            Width::W32 => &mut self.arm,
            Width::W16 => &mut self.thumb,
        }
    }

    pub fn insert(&mut self, slot: usize, d: Decoded) -> &Decoded {
        let lane = self.lane_mut(d.width);
        if lane.len() <= slot {
            lane.resize(slot + 1, None);
        }
        lane[slot].insert(d)
    }

    pub fn get(&self, width: Width, slot: usize) -> Option<&Decoded> {
        self.lane(width).get(slot).and_then(Option::as_ref)
    }

    pub fn op(&self, width: Width, slot: usize) -> Option<Op> {
        self.get(width, slot).map(|d| d.op)
    }

    pub fn operands(&self, width: Width, slot: usize) -> Option<&[Operand]> {
        self.get(width, slot).map(|d| d.operands.as_slice())
    }

    pub fn mnemonic(&self, width: Width, slot: usize) -> Option<&str> {
        self.get(width, slot).map(|d| d.mnemonic.as_str())
    }

    pub fn condition(&self, width: Width, slot: usize) -> Option<Condition> {
        self.get(width, slot).and_then(|d| d.cond)
    }

    /// Number of slots with room allocated in the given lane.
    pub fn len(&self, width: Width) -> usize {
        self.lane(width).len()
    }

    pub fn is_empty(&self) -> bool {
        self.arm.is_empty() && self.thumb.is_empty()
    }

    /// Decoded entries of one lane in slot order.
    pub fn iter(&self, width: Width) -> impl Iterator<Item = (usize, &Decoded)> {
        self.lane(width)
            .iter()
            .enumerate()
            .filter_map(|(slot, d)| d.as_ref().map(|d| (slot, d)))
    }
}

/// Outcome of [`Engine::decode_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    pub decoded: usize,
    pub unclassified: usize,
    pub faults: usize,
}

/// Owns the program image and the decode table, and decodes one slot per
/// call.
pub struct Engine<B: Bus> {
    pub cfg: EngineConfig,
    pub bus: B,
    table: DecodeTable,
    arm: ArmDecoder,
    thumb: ThumbDecoder,
}

impl<B: Bus> Engine<B> {
    pub fn new(cfg: EngineConfig, bus: B) -> Self {
        let size = bus.size();
        let table = DecodeTable::with_slots((size / 4) as usize, (size / 2) as usize);
        Self {
            cfg,
            bus,
            table,
            arm: ArmDecoder::new(),
            thumb: ThumbDecoder::new(),
        }
    }

    pub fn table(&self) -> &DecodeTable {
        &self.table
    }

    pub fn into_table(self) -> DecodeTable {
        self.table
    }

    /// Absolute address of `slot` in the given encoding.
    pub fn slot_addr(&self, width: Width, slot: usize) -> u32 {
        self.cfg
            .base
            .wrapping_add((slot as u32).wrapping_mul(width.stride()))
    }

    /// Number of whole instructions of `width` the image holds.
    pub fn slot_count(&self, width: Width) -> usize {
        (self.bus.size() / width.stride()) as usize
    }

    /// Decode the ARM word at `slot`.
    pub fn decode_word_instruction(&mut self, slot: usize) -> Result<&Decoded, DecodeError> {
        let dec = self.arm;
        self.decode_slot(&dec, slot)
    }

    /// Decode the THUMB halfword at `slot`.
    pub fn decode_halfword_instruction(&mut self, slot: usize) -> Result<&Decoded, DecodeError> {
        let dec = self.thumb;
        self.decode_slot(&dec, slot)
    }

    fn decode_slot<D: Decoder>(&mut self, dec: &D, slot: usize) -> Result<&Decoded, DecodeError> {
        let width = D::WIDTH;
        let addr = self.slot_addr(width, slot);
        if slot >= self.slot_count(width) {
            return Err(DecodeError::SlotOutOfRange { slot, addr });
        }

        let decoded = fetch(&mut self.bus, addr, width.stride() as u8)
            .and_then(|raw| dec.decode(&mut self.bus, addr, raw));
        match decoded {
            Ok(d) => {
                trace!(slot, addr = format_args!("{addr:#010x}"), raw = format_args!("{:#x}", d.raw), mnemonic = %d.mnemonic, "decoded");
                if !d.is_classified() {
                    debug!(slot, ?width, raw = format_args!("{:#x}", d.raw), "unclassified instruction");
                }
                Ok(self.table.insert(slot, d))
            }
            Err(e) => {
                // Leave the slot marked unknown rather than stale.
                let raw = self.bus.read(addr, width.stride() as u8).unwrap_or(0);
                let mut d = Decoded::unclassified(width, addr, raw);
                if width == Width::W32 {
                    d.cond = Some(Condition::from_bits(bit_range(raw, 28, 31)));
                }
                self.table.insert(slot, d);
                Err(e)
            }
        }
    }

    /// Decode every ARM slot, then every THUMB slot, of the image. Faults are
    /// logged and counted; they never stop the sweep.
    pub fn decode_all(&mut self) -> DecodeStats {
        let mut stats = DecodeStats::default();
        for width in [Width::W32, Width::W16] {
            for slot in 0..self.slot_count(width) {
                let res = match width {
                    Width::W32 => self.decode_word_instruction(slot),
                    Width::W16 => self.decode_halfword_instruction(slot),
                };
                match res {
                    Ok(d) if d.is_classified() => stats.decoded += 1,
                    Ok(_) => stats.unclassified += 1,
                    Err(e) => {
                        warn!(slot, ?width, "decode fault: {e}");
                        stats.faults += 1;
                    }
                }
            }
        }
        debug!(?stats, "decode_all finished");
        stats
    }
}
