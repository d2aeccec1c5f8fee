use dsp_core::state as core_state;
use dsp_core::{Acc, AxHalf};
use dsp_jit::abi as jit_abi;

fn assert_fits_u32(name: &str, value: usize) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| panic!("{name}={value} does not fit in u32"))
}

#[test]
fn register_file_abi_matches_dsp_core() {
    for i in 0..2 {
        assert_eq!(
            jit_abi::DSP_ACC_OFF[i],
            assert_fits_u32("DSP_ACC_OFF[i]", core_state::DSP_ACC_OFF[i]),
            "ACC[{i}] offset mismatch"
        );
        assert_eq!(
            jit_abi::DSP_AX_L_OFF[i],
            assert_fits_u32("DSP_AX_L_OFF[i]", core_state::DSP_AX_L_OFF[i]),
            "AX[{i}].l offset mismatch"
        );
        assert_eq!(
            jit_abi::DSP_AX_H_OFF[i],
            assert_fits_u32("DSP_AX_H_OFF[i]", core_state::DSP_AX_H_OFF[i]),
            "AX[{i}].h offset mismatch"
        );
    }

    assert_eq!(
        jit_abi::DSP_PROD_LOW_OFF,
        assert_fits_u32("DSP_PROD_LOW_OFF", core_state::DSP_PROD_LOW_OFF)
    );
    assert_eq!(
        jit_abi::DSP_PROD_MID1_OFF,
        assert_fits_u32("DSP_PROD_MID1_OFF", core_state::DSP_PROD_MID1_OFF)
    );
    assert_eq!(
        jit_abi::DSP_PROD_MID2_OFF,
        assert_fits_u32("DSP_PROD_MID2_OFF", core_state::DSP_PROD_MID2_OFF)
    );
    assert_eq!(
        jit_abi::DSP_PROD_HIGH_OFF,
        assert_fits_u32("DSP_PROD_HIGH_OFF", core_state::DSP_PROD_HIGH_OFF)
    );
    assert_eq!(
        jit_abi::DSP_SR_OFF,
        assert_fits_u32("DSP_SR_OFF", core_state::DSP_SR_OFF)
    );
    assert_eq!(
        jit_abi::DSP_STATE_SIZE,
        assert_fits_u32("DSP_STATE_SIZE", core_state::DSP_STATE_SIZE)
    );
    assert_eq!(
        jit_abi::DSP_STATE_ALIGN,
        assert_fits_u32("DSP_STATE_ALIGN", core_state::DSP_STATE_ALIGN)
    );
}

#[test]
fn helper_offsets_agree_with_tables() {
    for acc in Acc::ALL {
        assert_eq!(jit_abi::acc_off(acc), jit_abi::DSP_ACC_OFF[acc.index()]);
    }
    for ax in 0..2 {
        assert_eq!(jit_abi::ax_half_off(AxHalf::low(ax)), jit_abi::DSP_AX_L_OFF[ax]);
        assert_eq!(jit_abi::ax_half_off(AxHalf::high(ax)), jit_abi::DSP_AX_H_OFF[ax]);
        assert_eq!(
            jit_abi::ax_half_off(AxHalf::high(ax)) as usize,
            AxHalf::high(ax).offset()
        );
    }
}

#[test]
fn accesses_are_naturally_aligned() {
    for off in jit_abi::DSP_ACC_OFF {
        assert_eq!(off % 8, 0, "i64 accumulator slot at {off} is misaligned");
    }
    let halves = jit_abi::DSP_AX_L_OFF
        .iter()
        .chain(jit_abi::DSP_AX_H_OFF.iter())
        .chain([
            &jit_abi::DSP_PROD_LOW_OFF,
            &jit_abi::DSP_PROD_MID1_OFF,
            &jit_abi::DSP_PROD_MID2_OFF,
            &jit_abi::DSP_PROD_HIGH_OFF,
            &jit_abi::DSP_SR_OFF,
        ]);
    for &off in halves {
        assert_eq!(off % 2, 0, "u16 field at {off} is misaligned");
        assert!(off + 2 <= jit_abi::DSP_STATE_SIZE);
    }
}
