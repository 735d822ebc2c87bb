use proptest::prelude::*;

use arm7tdmi_decode::bits::rotate_right;
use arm7tdmi_decode::cond::direction;
use arm7tdmi_decode::{Engine, EngineConfig, LinearMemory, Op, Operand, Width};

const BASE: u32 = 0x0800_0000;

fn arm(words: &[u32]) -> Engine<LinearMemory> {
    Engine::new(EngineConfig::default(), LinearMemory::from_words(BASE, words))
}

fn thumb(halves: &[u16]) -> Engine<LinearMemory> {
    Engine::new(EngineConfig::default(), LinearMemory::from_halfwords(BASE, halves))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// Any condition and register in the BX pattern decodes to BX Rn.
    #[test]
    fn bx_pattern(cond in 0u32..16, rn in 0u32..16) {
        let raw = (cond << 28) | 0x012F_FF10 | rn;
        let mut e = arm(&[raw]);
        let d = e.decode_word_instruction(0).unwrap();
        prop_assert_eq!(d.op, Op::Bx);
        prop_assert_eq!(&d.operands, &vec![Operand::Reg(rn as u8)]);
    }

    /// Target is PC + 8 + signed offset * 4 and the marker follows its side.
    #[test]
    fn arm_branch_target(cond in 0u32..15, link in any::<bool>(), off in 0u32..(1 << 24), slot in 0usize..4) {
        let raw = (cond << 28) | (0b101 << 25) | (u32::from(link) << 24) | off;
        let mut words = [0u32; 4];
        words[slot] = raw;
        let mut e = arm(&words);
        let d = e.decode_word_instruction(slot).unwrap();

        let addr = BASE + 4 * slot as u32;
        let signed = ((off << 8) as i32) >> 8;
        let target = (addr as i64 + 8 + 4 * signed as i64) as u32;
        prop_assert_eq!(d.op, if link { Op::Bl } else { Op::B });
        prop_assert_eq!(&d.operands, &vec![Operand::Addr(target)]);
        let marker = direction(target, addr).marker();
        prop_assert!(d.mnemonic.ends_with(&format!(" ;{marker}")), "{}", d.mnemonic);
    }

    /// Rotating back by the complement restores the value.
    #[test]
    fn rotate_right_inverts(v in any::<u32>(), half in 0u32..16) {
        let a = half * 2;
        prop_assert_eq!(rotate_right(rotate_right(v, 32, a), 32, 32 - a), v);
    }

    /// Decoding the same slot twice gives the same entry, in both lanes.
    #[test]
    fn decode_is_idempotent(words in proptest::collection::vec(any::<u32>(), 4), slot in 0usize..4) {
        let mut e = arm(&words);
        let first = e.decode_word_instruction(slot).cloned().ok();
        let stored = e.table().get(Width::W32, slot).cloned();
        let second = e.decode_word_instruction(slot).cloned().ok();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(e.table().get(Width::W32, slot).cloned(), stored);

        let first = e.decode_halfword_instruction(slot).cloned().ok();
        let second = e.decode_halfword_instruction(slot).cloned().ok();
        prop_assert_eq!(first, second);
    }

    /// ADD Rd, Rs, #imm3 takes its fields from bits 0-2, 3-5 and 6-8.
    #[test]
    fn thumb_add_immediate_fields(rd in 0u16..8, rs in 0u16..8, imm in 0u16..8) {
        let raw = 0x1C00 | (imm << 6) | (rs << 3) | rd;
        let mut e = thumb(&[raw]);
        let d = e.decode_halfword_instruction(0).unwrap();
        prop_assert_eq!(d.op, Op::Add);
        prop_assert_eq!(
            &d.operands,
            &vec![Operand::Reg(rd as u8), Operand::Reg(rs as u8), Operand::Imm(imm as u32)]
        );
    }

    /// A BL pair built from any even offset in (-0x400000, 0x400000) resolves
    /// back to it.
    #[test]
    fn thumb_long_branch_link(half in (1 - (1i32 << 21))..(1i32 << 21)) {
        let off = half * 2;
        let hi = 0xF000 | ((off >> 12) as u16 & 0x7FF);
        let lo = 0xF800 | ((off >> 1) as u16 & 0x7FF);
        let mut e = thumb(&[hi, lo]);
        let d = e.decode_halfword_instruction(0).unwrap();
        prop_assert_eq!(d.op, Op::Bl);
        prop_assert_eq!(
            &d.operands,
            &vec![Operand::Addr((BASE + 4).wrapping_add(off as u32)), Operand::Addr((BASE + 4) | 1)]
        );
    }
}
