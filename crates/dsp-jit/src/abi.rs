//! Offsets of [`dsp_core::DspRegisters`] fields relative to `state_ptr`, as encoded in emitted
//! memory accesses.

use dsp_core::{Acc, AxHalf};

pub const DSP_ACC_OFF: [u32; 2] = [0, 8];
pub const DSP_AX_L_OFF: [u32; 2] = [16, 20];
pub const DSP_AX_H_OFF: [u32; 2] = [18, 22];
pub const DSP_PROD_LOW_OFF: u32 = 24;
pub const DSP_PROD_MID1_OFF: u32 = 26;
pub const DSP_PROD_MID2_OFF: u32 = 28;
pub const DSP_PROD_HIGH_OFF: u32 = 30;
pub const DSP_SR_OFF: u32 = 32;
pub const DSP_STATE_SIZE: u32 = 40;
pub const DSP_STATE_ALIGN: u32 = 8;

#[inline]
pub const fn acc_off(acc: Acc) -> u32 {
    DSP_ACC_OFF[acc.index()]
}

#[inline]
pub const fn ax_half_off(half: AxHalf) -> u32 {
    if half.is_high() {
        DSP_AX_H_OFF[half.ax()]
    } else {
        DSP_AX_L_OFF[half.ax()]
    }
}
