use crate::bits::bit_range;
use crate::cond::direction;
use crate::decoder::{Decoded, Op, Operand, Width};
use bitvec::prelude::*;

/// Render the assembler text for a decoded instruction.
pub fn fmt_decoded(d: &Decoded) -> String {
    use Operand::*;
    let mn = format!("{}{}", d.op.name(), d.cond.map(|c| c.suffix()).unwrap_or(""));
    match (d.op, d.operands.as_slice()) {
        (Op::Unclassified | Op::DataProcessing, _) => d.op.name().to_string(),
        (Op::Nop, _) => mn,
        (Op::Bx, [Reg(r)]) => format!("{mn} {}", reg(*r)),
        (Op::B | Op::Bl, [Addr(t), ..]) => {
            format!("{mn} {t:#x} ;{}", direction(*t, d.addr))
        }
        (Op::MsrCpsr | Op::MsrSpsr, [Reg(m), Flag(f), Flag(c), ..]) => {
            let psr = if d.op == Op::MsrSpsr { "spsr" } else { "cpsr" };
            let f = if *f { "f" } else { "" };
            let c = if *c { "c" } else { "" };
            format!("{mn} {psr}_{f}{c},{}", reg(*m))
        }
        (Op::Push | Op::Pop, [RegList(l), Flag(extra)]) => {
            let extra = match (extra, d.op) {
                (false, _) => None,
                (true, Op::Push) => Some("lr"),
                (true, _) => Some("pc"),
            };
            format!("{mn} {}", reg_list(*l, extra))
        }
        (Op::Stmia | Op::Ldmia, [Reg(b), RegList(l)]) => {
            format!("{mn} {}!,{}", reg(*b), reg_list(*l, None))
        }
        // Literal resolved from the image or a PC-relative sum.
        (_, [Reg(r), Imm(v)]) if is_transfer(d.op) => format!("{mn} {},=#{v:#x}", reg(*r)),
        (_, [Reg(r), Addr(v)]) => format!("{mn} {},=#{v:#x}", reg(*r)),
        (_, [Reg(r), Reg(b), Imm(o)]) if is_transfer(d.op) => {
            format!("{mn} {},[{},{o:#x}]", reg(*r), reg(*b))
        }
        (_, [Reg(r), Reg(b), Reg(o)]) if is_transfer(d.op) => {
            format!("{mn} {},[{},{}]", reg(*r), reg(*b), reg(*o))
        }
        (Op::Add, [Reg(r), Reg(s), Imm(0)]) if d.width == Width::W16 && bit_range(d.raw, 11, 15) == 0b00011 => {
            format!("MOV {},{}", reg(*r), reg(*s))
        }
        (_, [Reg(r), Offset(o)]) => format!("{mn} {},{}", reg(*r), signed_hex(*o)),
        // The trailing ARM operand is the evaluated shifter value, so it
        // prints as a number even when it came from a register field.
        (_, [head @ .., op2]) if d.width == Width::W32 => {
            let mut text: Vec<String> = head.iter().map(|o| operand(*o)).collect();
            text.push(format!("{:#x}", op2.value()));
            format!("{mn} {}", text.join(","))
        }
        (_, ops) => {
            let text: Vec<String> = ops.iter().map(|o| operand(*o)).collect();
            format!("{mn} {}", text.join(","))
        }
    }
}

fn is_transfer(op: Op) -> bool {
    matches!(
        op,
        Op::Ldr | Op::Str | Op::Ldrb | Op::Strb | Op::Ldrh | Op::Strh
    )
}

fn reg(r: u8) -> String {
    match r {
        13 => "sp".to_string(),
        14 => "lr".to_string(),
        15 => "pc".to_string(),
        _ => format!("r{r}"),
    }
}

fn signed_hex(v: i32) -> String {
    if v < 0 {
        format!("-{:#x}", v.unsigned_abs())
    } else {
        format!("{v:#x}")
    }
}

fn reg_list(mask: u8, extra: Option<&str>) -> String {
    let mut names: Vec<String> = mask.view_bits::<Lsb0>().iter_ones().map(|r| reg(r as u8)).collect();
    names.extend(extra.map(str::to_string));
    format!("{{{}}}", names.join(","))
}

fn operand(o: Operand) -> String {
    match o {
        Operand::Reg(r) => reg(r),
        Operand::Imm(v) | Operand::Addr(v) => format!("{v:#x}"),
        Operand::Offset(v) => signed_hex(v),
        Operand::RegList(l) => reg_list(l, None),
        Operand::Flag(f) => u8::from(f).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cond::Condition;

    fn mk(op: Op, operands: Vec<Operand>, cond: Option<Condition>, width: Width) -> Decoded {
        Decoded {
            op,
            operands,
            cond,
            mnemonic: String::new(),
            addr: 0x0800_0000,
            raw: 0,
            width,
        }
    }

    #[test]
    fn renders_register_lists() {
        let d = mk(Op::Push, vec![Operand::RegList(0b1001_0001), Operand::Flag(true)], None, Width::W16);
        assert_eq!(fmt_decoded(&d), "PUSH {r0,r4,r7,lr}");
        let d = mk(Op::Pop, vec![Operand::RegList(0), Operand::Flag(true)], None, Width::W16);
        assert_eq!(fmt_decoded(&d), "POP {pc}");
        let d = mk(Op::Ldmia, vec![Operand::Reg(2), Operand::RegList(0b11)], None, Width::W16);
        assert_eq!(fmt_decoded(&d), "LDMIA r2!,{r0,r1}");
    }

    #[test]
    fn renders_memory_forms() {
        let d = mk(
            Op::Ldr,
            vec![Operand::Reg(0), Operand::Reg(13), Operand::Imm(0x10)],
            Some(Condition::Ne),
            Width::W32,
        );
        assert_eq!(fmt_decoded(&d), "LDRNE r0,[sp,0x10]");
        let d = mk(Op::Str, vec![Operand::Reg(1), Operand::Reg(2), Operand::Reg(3)], None, Width::W16);
        assert_eq!(fmt_decoded(&d), "STR r1,[r2,r3]");
        let d = mk(Op::Ldr, vec![Operand::Reg(3), Operand::Imm(0xDEAD)], None, Width::W16);
        assert_eq!(fmt_decoded(&d), "LDR r3,=#0xdead");
    }

    #[test]
    fn renders_signed_offsets_and_alias() {
        let d = mk(Op::Add, vec![Operand::Reg(13), Operand::Offset(-0x1C)], None, Width::W16);
        assert_eq!(fmt_decoded(&d), "ADD sp,-0x1c");
        // ADD r4, r5, #0
        let mut d = mk(Op::Add, vec![Operand::Reg(4), Operand::Reg(5), Operand::Imm(0)], None, Width::W16);
        d.raw = 0x1C2C;
        assert_eq!(fmt_decoded(&d), "MOV r4,r5");
        // ADD r4, sp, #0 keeps its own form
        let d = mk(Op::Add, vec![Operand::Reg(4), Operand::Reg(13), Operand::Imm(0)], None, Width::W16);
        assert_eq!(fmt_decoded(&d), "ADD r4,sp,0x0");
    }

    #[test]
    fn renders_branch_markers() {
        let mut d = mk(Op::B, vec![Operand::Addr(0x0800_0000)], Some(Condition::Al), Width::W32);
        assert_eq!(fmt_decoded(&d), "B 0x8000000 ;←");
        d.operands = vec![Operand::Addr(0x0800_0100)];
        assert_eq!(fmt_decoded(&d), "B 0x8000100 ;↓");
        d.cond = Some(Condition::Gt);
        d.operands = vec![Operand::Addr(0x07FF_FFF0)];
        assert_eq!(fmt_decoded(&d), "BGT 0x7fffff0 ;↑");
    }
}
