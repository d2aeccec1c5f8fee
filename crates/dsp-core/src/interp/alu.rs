use crate::flags::{
    is_carry, is_carry2, is_over_s32, is_overflow, update_sr16, update_sr64, update_sr_logic_zero,
};
use crate::opcodes::ArithOp;
use crate::state::{sign_extend_40, Acc, AxHalf, DspRegisters, ACC40_MASK};

#[inline]
fn acc_bit8(opcode: u16) -> Acc {
    Acc::from_field(opcode >> 8)
}

#[inline]
fn acc_bit11(opcode: u16) -> Acc {
    Acc::from_field(opcode >> 11)
}

#[inline]
fn ax_bit9(opcode: u16) -> usize {
    usize::from((opcode >> 9) & 1)
}

/// Mid-level immediate: `(s16)imm << 16`.
#[inline]
fn mid_imm16(imm: u16) -> i64 {
    i64::from(imm as i16) << 16
}

/// Short mid-level immediate taken from the low opcode byte.
#[inline]
fn mid_imm8(opcode: u16) -> i64 {
    i64::from(opcode as u8 as i8) << 16
}

fn add_with_flags(regs: &mut DspRegisters, dst: Acc, lhs: i64, rhs: i64) {
    let res = sign_extend_40(lhs.wrapping_add(rhs));
    regs.set_acc(dst, res);
    regs.sr = update_sr64(regs.sr, res, is_carry(lhs, res), is_overflow(lhs, rhs, res));
}

fn sub_with_flags(regs: &mut DspRegisters, dst: Acc, lhs: i64, rhs: i64) {
    let res = sign_extend_40(lhs.wrapping_sub(rhs));
    regs.set_acc(dst, res);
    regs.sr = cmp_flags(regs.sr, lhs, rhs, res);
}

fn cmp_flags(sr: u16, lhs: i64, rhs: i64, res: i64) -> u16 {
    update_sr64(
        sr,
        res,
        is_carry2(lhs, res),
        is_overflow(lhs, rhs.wrapping_neg(), res),
    )
}

fn compare(regs: &mut DspRegisters, lhs: i64, rhs: i64) {
    let res = sign_extend_40(lhs.wrapping_sub(rhs));
    regs.sr = cmp_flags(regs.sr, lhs, rhs, res);
}

/// Store `value` and set flags as a move/shift/logic result (carry and overflow cleared).
fn set_with_flags(regs: &mut DspRegisters, dst: Acc, value: i64) {
    regs.set_acc(dst, value);
    regs.sr = update_sr64(regs.sr, regs.acc(dst), false, false);
}

fn logic_mid(regs: &mut DspRegisters, dst: Acc, accm: u16) {
    regs.set_acc_m(dst, accm);
    regs.sr = update_sr16(regs.sr, accm as i16, false, false, is_over_s32(regs.acc(dst)));
}

/// Round `.h:.m` to nearest, ties to even, and clear `.l`.
fn round_long_acc(acc: i64) -> i64 {
    if acc & 0x10000 != 0 {
        acc.wrapping_add(0x8000) & !0xFFFF
    } else {
        acc.wrapping_add(0x7FFF) & !0xFFFF
    }
}

/// Signed seven-bit shift amount used by the `*N`, `*NR` and `*NRX` shifts.
fn shift_amount(field: u16) -> i32 {
    let low = i32::from(field & 0x3F);
    if low == 0 {
        0
    } else if field & 0x40 != 0 {
        low - 0x40
    } else {
        low
    }
}

/// Right shift amount for `LSR`/`ASR`, encoded as `0x40 - n`.
fn right_shift_amount(opcode: u16) -> u32 {
    match u32::from(opcode & 0x3F) {
        0 => 0,
        n => 0x40 - n,
    }
}

/// `positive_left` selects whether positive amounts shift left (`*NR`, `*NRX`) or right (`*N`).
fn logical_shift(acc: i64, amount: i32, positive_left: bool) -> i64 {
    let value = (acc & ACC40_MASK) as u64;
    let left = if positive_left { amount } else { -amount };
    let out = match left.cmp(&0) {
        core::cmp::Ordering::Greater => value << left,
        core::cmp::Ordering::Less => value >> -left,
        core::cmp::Ordering::Equal => value,
    };
    out as i64
}

fn arithmetic_shift(acc: i64, amount: i32, positive_left: bool) -> i64 {
    let left = if positive_left { amount } else { -amount };
    match left.cmp(&0) {
        core::cmp::Ordering::Greater => acc << left,
        core::cmp::Ordering::Less => acc >> -left,
        core::cmp::Ordering::Equal => acc,
    }
}

/// Execute one decoded arithmetic-group instruction. `imm` is the extension word for two-word forms.
pub fn execute(regs: &mut DspRegisters, op: ArithOp, opcode: u16, imm: u16) {
    match op {
        ArithOp::Clr => set_with_flags(regs, acc_bit11(opcode), 0),
        ArithOp::Clrl => {
            let dst = acc_bit8(opcode);
            let rounded = round_long_acc(regs.acc(dst));
            set_with_flags(regs, dst, rounded);
        }
        ArithOp::Andcf => {
            let val = regs.acc_m(acc_bit8(opcode));
            regs.sr = update_sr_logic_zero(regs.sr, val & imm == imm);
        }
        ArithOp::Andf => {
            let val = regs.acc_m(acc_bit8(opcode));
            regs.sr = update_sr_logic_zero(regs.sr, val & imm == 0);
        }
        ArithOp::Tst => {
            let val = regs.acc(acc_bit11(opcode));
            regs.sr = update_sr64(regs.sr, val, false, false);
        }
        ArithOp::Tstaxh => {
            let val = regs.ax_h(usize::from((opcode >> 8) & 1)) as i16;
            regs.sr = update_sr16(regs.sr, val, false, false, false);
        }
        ArithOp::Cmp => {
            let (lhs, rhs) = (regs.acc(Acc::Acc0), regs.acc(Acc::Acc1));
            compare(regs, lhs, rhs);
        }
        ArithOp::Cmpar => {
            let rhs = regs.ax_half_widened(AxHalf::high(usize::from((opcode >> 12) & 1)));
            let lhs = regs.acc(acc_bit11(opcode));
            compare(regs, lhs, rhs);
        }
        ArithOp::Cmpi => {
            let lhs = regs.acc(acc_bit8(opcode));
            compare(regs, lhs, mid_imm16(imm));
        }
        ArithOp::Cmpis => {
            let lhs = regs.acc(acc_bit8(opcode));
            compare(regs, lhs, mid_imm8(opcode));
        }
        ArithOp::Xorr | ArithOp::Andr | ArithOp::Orr => {
            let dst = acc_bit8(opcode);
            let (a, b) = (regs.acc_m(dst), regs.ax_h(ax_bit9(opcode)));
            let accm = match op {
                ArithOp::Xorr => a ^ b,
                ArithOp::Andr => a & b,
                _ => a | b,
            };
            logic_mid(regs, dst, accm);
        }
        ArithOp::Andc | ArithOp::Orc | ArithOp::Xorc => {
            let dst = acc_bit8(opcode);
            let (a, b) = (regs.acc_m(dst), regs.acc_m(dst.other()));
            let accm = match op {
                ArithOp::Andc => a & b,
                ArithOp::Orc => a | b,
                _ => a ^ b,
            };
            logic_mid(regs, dst, accm);
        }
        ArithOp::Not => {
            let dst = acc_bit8(opcode);
            let accm = regs.acc_m(dst) ^ 0xFFFF;
            logic_mid(regs, dst, accm);
        }
        ArithOp::Xori | ArithOp::Andi | ArithOp::Ori => {
            let dst = acc_bit8(opcode);
            let a = regs.acc_m(dst);
            let accm = match op {
                ArithOp::Xori => a ^ imm,
                ArithOp::Andi => a & imm,
                _ => a | imm,
            };
            logic_mid(regs, dst, accm);
        }
        ArithOp::Addr => {
            let dst = acc_bit8(opcode);
            let rhs = regs.ax_half_widened(AxHalf::from_field(opcode >> 9));
            add_with_flags(regs, dst, regs.acc(dst), rhs);
        }
        ArithOp::Addax => {
            let dst = acc_bit8(opcode);
            add_with_flags(regs, dst, regs.acc(dst), regs.long_acx(ax_bit9(opcode)));
        }
        ArithOp::Add => {
            let dst = acc_bit8(opcode);
            add_with_flags(regs, dst, regs.acc(dst), regs.acc(dst.other()));
        }
        ArithOp::Addp => {
            let dst = acc_bit8(opcode);
            add_with_flags(regs, dst, regs.acc(dst), regs.long_prod());
        }
        ArithOp::Addaxl => {
            let dst = acc_bit8(opcode);
            let rhs = i64::from(regs.ax_l(ax_bit9(opcode)));
            add_with_flags(regs, dst, regs.acc(dst), rhs);
        }
        ArithOp::Addi => {
            let dst = acc_bit8(opcode);
            add_with_flags(regs, dst, regs.acc(dst), mid_imm16(imm));
        }
        ArithOp::Addis => {
            let dst = acc_bit8(opcode);
            add_with_flags(regs, dst, regs.acc(dst), mid_imm8(opcode));
        }
        ArithOp::Incm => {
            let dst = acc_bit8(opcode);
            add_with_flags(regs, dst, regs.acc(dst), 0x10000);
        }
        ArithOp::Inc => {
            let dst = acc_bit8(opcode);
            add_with_flags(regs, dst, regs.acc(dst), 1);
        }
        ArithOp::Subr => {
            let dst = acc_bit8(opcode);
            let rhs = regs.ax_half_widened(AxHalf::from_field(opcode >> 9));
            sub_with_flags(regs, dst, regs.acc(dst), rhs);
        }
        ArithOp::Subax => {
            let dst = acc_bit8(opcode);
            sub_with_flags(regs, dst, regs.acc(dst), regs.long_acx(ax_bit9(opcode)));
        }
        ArithOp::Sub => {
            let dst = acc_bit8(opcode);
            sub_with_flags(regs, dst, regs.acc(dst), regs.acc(dst.other()));
        }
        ArithOp::Subp => {
            let dst = acc_bit8(opcode);
            sub_with_flags(regs, dst, regs.acc(dst), regs.long_prod());
        }
        ArithOp::Decm => {
            let dst = acc_bit8(opcode);
            sub_with_flags(regs, dst, regs.acc(dst), 0x10000);
        }
        ArithOp::Dec => {
            let dst = acc_bit8(opcode);
            sub_with_flags(regs, dst, regs.acc(dst), 1);
        }
        ArithOp::Neg => {
            let dst = acc_bit8(opcode);
            set_with_flags(regs, dst, regs.acc(dst).wrapping_neg());
        }
        ArithOp::Abs => {
            let dst = acc_bit11(opcode);
            let val = regs.acc(dst);
            set_with_flags(regs, dst, if val < 0 { val.wrapping_neg() } else { val });
        }
        ArithOp::Movr => {
            let dst = acc_bit8(opcode);
            let val = regs.ax_half_widened(AxHalf::from_field(opcode >> 9));
            set_with_flags(regs, dst, val);
        }
        ArithOp::Movax => {
            let dst = acc_bit8(opcode);
            set_with_flags(regs, dst, regs.long_acx(ax_bit9(opcode)));
        }
        ArithOp::Mov => {
            let dst = acc_bit8(opcode);
            set_with_flags(regs, dst, regs.acc(dst.other()));
        }
        ArithOp::Lsl16 => {
            let dst = acc_bit8(opcode);
            set_with_flags(regs, dst, regs.acc(dst) << 16);
        }
        ArithOp::Lsr16 => {
            let dst = acc_bit8(opcode);
            set_with_flags(regs, dst, logical_shift(regs.acc(dst), 16, false));
        }
        ArithOp::Asr16 => {
            let dst = acc_bit11(opcode);
            set_with_flags(regs, dst, regs.acc(dst) >> 16);
        }
        ArithOp::Lsl | ArithOp::Asl => {
            let dst = acc_bit8(opcode);
            set_with_flags(regs, dst, regs.acc(dst) << (opcode & 0x3F));
        }
        ArithOp::Lsr => {
            let dst = acc_bit8(opcode);
            let val = ((regs.acc(dst) & ACC40_MASK) as u64) >> right_shift_amount(opcode);
            set_with_flags(regs, dst, val as i64);
        }
        ArithOp::Asr => {
            let dst = acc_bit8(opcode);
            set_with_flags(regs, dst, regs.acc(dst) >> right_shift_amount(opcode));
        }
        ArithOp::Lsrn => {
            let amount = shift_amount(regs.acc_m(Acc::Acc1));
            let val = logical_shift(regs.acc(Acc::Acc0), amount, false);
            set_with_flags(regs, Acc::Acc0, val);
        }
        ArithOp::Asrn => {
            let amount = shift_amount(regs.acc_m(Acc::Acc1));
            let val = arithmetic_shift(regs.acc(Acc::Acc0), amount, false);
            set_with_flags(regs, Acc::Acc0, val);
        }
        ArithOp::Lsrnrx | ArithOp::Asrnrx => {
            let dst = acc_bit8(opcode);
            let amount = shift_amount(regs.ax_h(ax_bit9(opcode)));
            let val = if op == ArithOp::Lsrnrx {
                logical_shift(regs.acc(dst), amount, true)
            } else {
                arithmetic_shift(regs.acc(dst), amount, true)
            };
            set_with_flags(regs, dst, val);
        }
        ArithOp::Lsrnr | ArithOp::Asrnr => {
            let dst = acc_bit8(opcode);
            let amount = shift_amount(regs.acc_m(dst.other()));
            let val = if op == ArithOp::Lsrnr {
                logical_shift(regs.acc(dst), amount, true)
            } else {
                arithmetic_shift(regs.acc(dst), amount, true)
            };
            set_with_flags(regs, dst, val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clrl_rounds_half_to_even() {
        assert_eq!(round_long_acc(0x0_8000), 0);
        assert_eq!(round_long_acc(0x1_8000), 0x2_0000);
        assert_eq!(round_long_acc(0x0_8001), 0x1_0000);
        assert_eq!(round_long_acc(0x1_7FFF), 0x1_0000);
    }

    #[test]
    fn shift_amount_is_signed_seven_bits() {
        assert_eq!(shift_amount(0x0000), 0);
        assert_eq!(shift_amount(0x0040), 0);
        assert_eq!(shift_amount(0x0005), 5);
        assert_eq!(shift_amount(0x007F), -1);
        assert_eq!(shift_amount(0xFF41), -63);
        assert_eq!(right_shift_amount(0x1440), 0);
        assert_eq!(right_shift_amount(0x147F), 1);
    }

    #[test]
    fn logical_shift_drops_padding() {
        let padded = 0xFFFF_FF00_1234_5678_u64 as i64;
        assert_eq!(logical_shift(padded, 16, false), 0x1234);
        assert_eq!(arithmetic_shift(padded, 16, false) as u64, 0xFFFF_FFFF_FF00_1234);
    }
}
