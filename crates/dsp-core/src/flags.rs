//! Status register bits and the flag evaluation primitives shared by every arithmetic op.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u16 {
        /// Unsigned carry. The subtract-family borrow test writes the same bit.
        const CARRY = 1 << 0;
        const OVERFLOW = 1 << 1;
        const ARITH_ZERO = 1 << 2;
        const SIGN = 1 << 3;
        /// Result does not fit in a signed 32-bit value.
        const OVER_S32 = 1 << 4;
        /// Bits 30 and 31 of the result are equal.
        const TOP2BITS = 1 << 5;
        const LOGIC_ZERO = 1 << 6;
        /// Set together with `OVERFLOW`; never cleared by a flag producer.
        const OVERFLOW_STICKY = 1 << 7;

        const _ = !0;
    }
}

/// Bits rewritten by every arithmetic flag producer.
pub const SR_CMP_MASK: u16 = 0x003F;

/// Carry for `lhs + rhs = res`.
#[inline]
pub fn is_carry(lhs: i64, res: i64) -> bool {
    lhs as u64 > res as u64
}

/// Borrow-style carry for `lhs - rhs = res`.
#[inline]
pub fn is_carry2(lhs: i64, res: i64) -> bool {
    lhs as u64 >= res as u64
}

/// Signed overflow of `lhs + rhs = res`. Subtractions pass the negated operand as `rhs`.
#[inline]
pub fn is_overflow(lhs: i64, rhs: i64, res: i64) -> bool {
    ((lhs ^ res) & (rhs ^ res)) < 0
}

#[inline]
pub fn is_over_s32(value: i64) -> bool {
    value != i64::from(value as i32)
}

#[inline]
pub fn top_two_bits_equal(value: i64) -> bool {
    ((value >> 30) ^ (value >> 31)) & 1 == 0
}

/// Recompute the arithmetic flags from a canonical 40-bit result.
pub fn update_sr64(sr: u16, value: i64, carry: bool, overflow: bool) -> u16 {
    let mut flags = StatusFlags::from_bits_retain(sr & !SR_CMP_MASK);
    flags.set(StatusFlags::CARRY, carry);
    if overflow {
        flags |= StatusFlags::OVERFLOW | StatusFlags::OVERFLOW_STICKY;
    }
    flags.set(StatusFlags::ARITH_ZERO, value == 0);
    flags.set(StatusFlags::SIGN, value < 0);
    flags.set(StatusFlags::OVER_S32, is_over_s32(value));
    flags.set(StatusFlags::TOP2BITS, top_two_bits_equal(value));
    flags.bits()
}

/// Flag update for ops that only operate on the mid word of an accumulator.
///
/// `over_s32` is evaluated by the caller on the whole accumulator.
pub fn update_sr16(sr: u16, value: i16, carry: bool, overflow: bool, over_s32: bool) -> u16 {
    let mut flags = StatusFlags::from_bits_retain(sr & !SR_CMP_MASK);
    flags.set(StatusFlags::CARRY, carry);
    if overflow {
        flags |= StatusFlags::OVERFLOW | StatusFlags::OVERFLOW_STICKY;
    }
    flags.set(StatusFlags::ARITH_ZERO, value == 0);
    flags.set(StatusFlags::SIGN, value < 0);
    flags.set(StatusFlags::OVER_S32, over_s32);
    let top = (value as u16) >> 14;
    flags.set(StatusFlags::TOP2BITS, top == 0 || top == 3);
    flags.bits()
}

pub fn update_sr_logic_zero(sr: u16, zero: bool) -> u16 {
    let mut flags = StatusFlags::from_bits_retain(sr);
    flags.set(StatusFlags::LOGIC_ZERO, zero);
    flags.bits()
}
