//! DSP register file shared between the reference interpreter and emitted blocks.

use crate::flags::StatusFlags;

/// Mask selecting the 40 architecturally meaningful accumulator bits.
pub const ACC40_MASK: i64 = 0xFF_FFFF_FFFF;

/// Reinterpret the low 40 bits of `value` as a signed 40-bit integer.
#[inline]
pub const fn sign_extend_40(value: i64) -> i64 {
    (value << 24) >> 24
}

/// Primary 40-bit accumulator selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Acc {
    Acc0 = 0,
    Acc1 = 1,
}

impl Acc {
    pub const ALL: [Acc; 2] = [Acc::Acc0, Acc::Acc1];

    /// Decode a one-bit register field (only bit 0 of `field` is used).
    #[inline]
    pub const fn from_field(field: u16) -> Self {
        if field & 1 == 0 {
            Acc::Acc0
        } else {
            Acc::Acc1
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn other(self) -> Self {
        match self {
            Acc::Acc0 => Acc::Acc1,
            Acc::Acc1 => Acc::Acc0,
        }
    }
}

/// One 16-bit half of a secondary accumulator.
///
/// The declaration order matches the two-bit source field used by `ADDR`, `SUBR` and `MOVR`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxHalf {
    L0,
    L1,
    H0,
    H1,
}

impl AxHalf {
    #[inline]
    pub const fn from_field(field: u16) -> Self {
        match field & 3 {
            0 => AxHalf::L0,
            1 => AxHalf::L1,
            2 => AxHalf::H0,
            _ => AxHalf::H1,
        }
    }

    #[inline]
    pub const fn low(ax: usize) -> Self {
        if ax == 0 {
            AxHalf::L0
        } else {
            AxHalf::L1
        }
    }

    #[inline]
    pub const fn high(ax: usize) -> Self {
        if ax == 0 {
            AxHalf::H0
        } else {
            AxHalf::H1
        }
    }

    /// Index of the owning secondary accumulator.
    #[inline]
    pub const fn ax(self) -> usize {
        match self {
            AxHalf::L0 | AxHalf::H0 => 0,
            AxHalf::L1 | AxHalf::H1 => 1,
        }
    }

    #[inline]
    pub const fn is_high(self) -> bool {
        matches!(self, AxHalf::H0 | AxHalf::H1)
    }

    /// Byte offset of this half inside [`DspRegisters`].
    #[inline]
    pub const fn offset(self) -> usize {
        if self.is_high() {
            DSP_AX_H_OFF[self.ax()]
        } else {
            DSP_AX_L_OFF[self.ax()]
        }
    }
}

/// Product register as produced by the multiply unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Product {
    pub low: u16,
    pub mid1: u16,
    pub mid2: u16,
    pub high: u16,
}

impl Product {
    /// Combined product value: `(s8)high << 32` plus the low parts, with both mids summed.
    #[inline]
    pub fn get(&self) -> i64 {
        let high = i64::from(self.high as u8 as i8) << 32;
        let low = ((i64::from(self.mid1) + i64::from(self.mid2)) << 16) | i64::from(self.low);
        high.wrapping_add(low)
    }
}

/// DSP register file layout shared with generated WASM blocks.
///
/// The state lives in linear memory at `state_ptr`. All fields are little-endian.
///
/// Layout (bytes):
/// - `acc[0..2]` (`i64` each, canonical sign-extended 40-bit values)
/// - `ax[0..2]` (`{ l: u16, h: u16 }` each)
/// - `prod` (`low`, `mid1`, `mid2`, `high`: `u16` each)
/// - `sr` (`u16`), then padding to 8-byte alignment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct DspRegisters {
    acc: [i64; 2],
    /// `[l, h]` for each secondary accumulator.
    ax: [[u16; 2]; 2],
    pub prod: Product,
    pub sr: u16,
    _pad: [u16; 3],
}

pub const DSP_ACC_OFF: [usize; 2] = [0, 8];
pub const DSP_AX_L_OFF: [usize; 2] = [16, 20];
pub const DSP_AX_H_OFF: [usize; 2] = [18, 22];
pub const DSP_PROD_LOW_OFF: usize = 24;
pub const DSP_PROD_MID1_OFF: usize = 26;
pub const DSP_PROD_MID2_OFF: usize = 28;
pub const DSP_PROD_HIGH_OFF: usize = 30;
pub const DSP_SR_OFF: usize = 32;
pub const DSP_STATE_SIZE: usize = 40;
pub const DSP_STATE_ALIGN: usize = 8;

impl DspRegisters {
    /// Value held in the accumulator slot, ready for 64-bit arithmetic.
    ///
    /// The slot is canonical unless it was written through [`Self::set_acc_raw`].
    #[inline]
    pub fn acc(&self, acc: Acc) -> i64 {
        self.acc[acc.index()]
    }

    /// Store `value` truncated to 40 bits and sign-extended.
    #[inline]
    pub fn set_acc(&mut self, acc: Acc, value: i64) {
        self.acc[acc.index()] = sign_extend_40(value);
    }

    /// Overwrite the storage slot without canonicalizing it.
    #[inline]
    pub fn set_acc_raw(&mut self, acc: Acc, value: i64) {
        self.acc[acc.index()] = value;
    }

    #[inline]
    pub fn acc_l(&self, acc: Acc) -> u16 {
        self.acc[acc.index()] as u16
    }

    #[inline]
    pub fn acc_m(&self, acc: Acc) -> u16 {
        (self.acc[acc.index()] >> 16) as u16
    }

    #[inline]
    pub fn acc_h(&self, acc: Acc) -> u8 {
        (self.acc[acc.index()] >> 32) as u8
    }

    /// Replace bits 16..32 of `acc`, leaving `.h` and `.l` alone.
    pub fn set_acc_m(&mut self, acc: Acc, value: u16) {
        let old = self.acc(acc);
        let new = (old & !0xFFFF_0000) | (i64::from(value) << 16);
        self.set_acc(acc, new);
    }

    #[inline]
    pub fn ax_l(&self, ax: usize) -> u16 {
        self.ax[ax][0]
    }

    #[inline]
    pub fn ax_h(&self, ax: usize) -> u16 {
        self.ax[ax][1]
    }

    #[inline]
    pub fn set_ax_l(&mut self, ax: usize, value: u16) {
        self.ax[ax][0] = value;
    }

    #[inline]
    pub fn set_ax_h(&mut self, ax: usize, value: u16) {
        self.ax[ax][1] = value;
    }

    #[inline]
    pub fn ax_half(&self, half: AxHalf) -> u16 {
        let slot = usize::from(half.is_high());
        self.ax[half.ax()][slot]
    }

    /// A secondary accumulator half as a mid-level operand: `(s16)half << 16`.
    #[inline]
    pub fn ax_half_widened(&self, half: AxHalf) -> i64 {
        i64::from(self.ax_half(half) as i16) << 16
    }

    /// Whole secondary accumulator: `(s16)h << 16 | l`.
    #[inline]
    pub fn long_acx(&self, ax: usize) -> i64 {
        (i64::from(self.ax_h(ax) as i16) << 16) | i64::from(self.ax_l(ax))
    }

    #[inline]
    pub fn long_prod(&self) -> i64 {
        self.prod.get()
    }

    #[inline]
    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.sr)
    }

    /// Store the register file at `mem[base..base + DSP_STATE_SIZE]` in the JIT layout.
    ///
    /// # Panics
    ///
    /// Panics if that range does not fit in `mem`.
    pub fn write_to_mem(&self, mem: &mut [u8], base: usize) {
        assert!(
            state_fits(mem.len(), base),
            "DspRegisters write out of bounds"
        );
        for acc in Acc::ALL {
            let off = base + DSP_ACC_OFF[acc.index()];
            mem[off..off + 8].copy_from_slice(&self.acc[acc.index()].to_le_bytes());
        }
        for ax in 0..2 {
            write_u16(mem, base + DSP_AX_L_OFF[ax], self.ax[ax][0]);
            write_u16(mem, base + DSP_AX_H_OFF[ax], self.ax[ax][1]);
        }
        write_u16(mem, base + DSP_PROD_LOW_OFF, self.prod.low);
        write_u16(mem, base + DSP_PROD_MID1_OFF, self.prod.mid1);
        write_u16(mem, base + DSP_PROD_MID2_OFF, self.prod.mid2);
        write_u16(mem, base + DSP_PROD_HIGH_OFF, self.prod.high);
        write_u16(mem, base + DSP_SR_OFF, self.sr);
    }

    /// Load a register file previously stored with [`DspRegisters::write_to_mem`].
    ///
    /// # Panics
    ///
    /// Panics if `mem[base..base + DSP_STATE_SIZE]` does not fit in `mem`.
    pub fn read_from_mem(mem: &[u8], base: usize) -> Self {
        assert!(
            state_fits(mem.len(), base),
            "DspRegisters read out of bounds"
        );
        let mut acc = [0i64; 2];
        for (i, slot) in acc.iter_mut().enumerate() {
            let off = base + DSP_ACC_OFF[i];
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&mem[off..off + 8]);
            *slot = i64::from_le_bytes(buf);
        }
        let mut ax = [[0u16; 2]; 2];
        for (i, pair) in ax.iter_mut().enumerate() {
            pair[0] = read_u16(mem, base + DSP_AX_L_OFF[i]);
            pair[1] = read_u16(mem, base + DSP_AX_H_OFF[i]);
        }
        Self {
            acc,
            ax,
            prod: Product {
                low: read_u16(mem, base + DSP_PROD_LOW_OFF),
                mid1: read_u16(mem, base + DSP_PROD_MID1_OFF),
                mid2: read_u16(mem, base + DSP_PROD_MID2_OFF),
                high: read_u16(mem, base + DSP_PROD_HIGH_OFF),
            },
            sr: read_u16(mem, base + DSP_SR_OFF),
            _pad: [0; 3],
        }
    }
}

fn state_fits(len: usize, base: usize) -> bool {
    base.checked_add(DSP_STATE_SIZE).is_some_and(|end| end <= len)
}

fn write_u16(mem: &mut [u8], off: usize, value: u16) {
    mem[off..off + 2].copy_from_slice(&value.to_le_bytes());
}

fn read_u16(mem: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([mem[off], mem[off + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    #[should_panic(expected = "DspRegisters write out of bounds")]
    fn write_past_the_end_panics() {
        let mut mem = vec![0u8; DSP_STATE_SIZE];
        DspRegisters::default().write_to_mem(&mut mem, 1);
    }

    #[test]
    #[should_panic(expected = "DspRegisters read out of bounds")]
    fn read_with_overflowing_base_panics() {
        let mem = vec![0u8; DSP_STATE_SIZE];
        DspRegisters::read_from_mem(&mem, usize::MAX - 2);
    }

    #[test]
    fn layout_constants_match_struct() {
        assert_eq!(offset_of!(DspRegisters, acc), DSP_ACC_OFF[0]);
        assert_eq!(DSP_ACC_OFF[1], DSP_ACC_OFF[0] + 8);
        assert_eq!(offset_of!(DspRegisters, ax), DSP_AX_L_OFF[0]);
        assert_eq!(DSP_AX_H_OFF[0], DSP_AX_L_OFF[0] + 2);
        assert_eq!(DSP_AX_L_OFF[1], DSP_AX_L_OFF[0] + 4);
        assert_eq!(DSP_AX_H_OFF[1], DSP_AX_L_OFF[0] + 6);
        let prod = offset_of!(DspRegisters, prod);
        assert_eq!(prod + offset_of!(Product, low), DSP_PROD_LOW_OFF);
        assert_eq!(prod + offset_of!(Product, mid1), DSP_PROD_MID1_OFF);
        assert_eq!(prod + offset_of!(Product, mid2), DSP_PROD_MID2_OFF);
        assert_eq!(prod + offset_of!(Product, high), DSP_PROD_HIGH_OFF);
        assert_eq!(offset_of!(DspRegisters, sr), DSP_SR_OFF);
        assert_eq!(core::mem::size_of::<DspRegisters>(), DSP_STATE_SIZE);
        assert_eq!(core::mem::align_of::<DspRegisters>(), DSP_STATE_ALIGN);
    }

    #[test]
    fn sub_fields_view_the_canonical_value() {
        let mut regs = DspRegisters::default();
        regs.set_acc(Acc::Acc1, 0x12_3456_789A);
        assert_eq!(regs.acc_h(Acc::Acc1), 0x12);
        assert_eq!(regs.acc_m(Acc::Acc1), 0x3456);
        assert_eq!(regs.acc_l(Acc::Acc1), 0x789A);

        regs.set_acc_m(Acc::Acc1, 0xFFFF);
        assert_eq!(regs.acc(Acc::Acc1), 0x12_FFFF_789A);
    }

    #[test]
    fn negative_accumulator_is_sign_extended() {
        let mut regs = DspRegisters::default();
        regs.set_acc(Acc::Acc0, 0x80_0000_0000);
        assert_eq!(regs.acc(Acc::Acc0), -(1 << 39));
        assert_eq!(regs.acc(Acc::Acc0) as u64, 0xFFFF_FF80_0000_0000);
    }

    #[test]
    fn widened_operands() {
        let mut regs = DspRegisters::default();
        regs.set_ax_h(0, 0x8000);
        regs.set_ax_l(0, 0x1234);
        assert_eq!(regs.ax_half_widened(AxHalf::H0), -0x8000_0000);
        assert_eq!(regs.ax_half_widened(AxHalf::L0), 0x1234_0000);
        assert_eq!(regs.long_acx(0), -0x8000_0000 + 0x1234);

        regs.prod = Product {
            low: 0x0001,
            mid1: 0xFFFF,
            mid2: 0x0001,
            high: 0x00FF,
        };
        // (s8)0xFF << 32 plus the mid carry into bit 32 cancels out.
        assert_eq!(regs.long_prod(), 1);
    }

    #[test]
    fn memory_image_preserves_raw_slots() {
        let mut regs = DspRegisters::default();
        regs.set_acc_raw(Acc::Acc0, 0x7FFF_FF00_0000_0001);
        regs.set_ax_h(1, 0xBEEF);
        regs.prod.mid2 = 0x4242;
        regs.sr = 0xA5C3;

        let mut mem = vec![0u8; 64];
        regs.write_to_mem(&mut mem, 8);
        assert_eq!(DspRegisters::read_from_mem(&mem, 8), regs);
    }
}
