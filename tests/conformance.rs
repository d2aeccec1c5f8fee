#![cfg(not(target_arch = "wasm32"))]

use dsp_recompiler::dsp_core::opcodes::{OpInfo, ARITH_OPCODES};
use dsp_recompiler::dsp_core::{Acc, DspRegisters, ReferenceInterpreter, StatusFlags};
use dsp_recompiler::dsp_jit::{capability, JitOptions, JitRuntime};
use proptest::prelude::*;

/// Any word outside the arithmetic group; ends a block.
const BLOCK_END: u16 = 0x0290;

const ACC_VALUES: [i64; 10] = [
    0,
    1,
    -1,
    0x7F_FFFF_FFFF,
    -0x80_0000_0000,
    0x7FFF_FFFF,
    0x8000_0000,
    -0x8000_0001,
    0x12_3456_789A,
    -0x1_0000,
];

const AX_VALUES: [(u16, u16); 4] = [(0, 0), (0xFFFF, 0xFFFF), (0x0001, 0x8000), (0x8001, 0x7FFF)];

const EXT_WORDS: [u16; 5] = [0x0000, 0x0001, 0x7FFF, 0x8000, 0xFFFF];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

/// Encodings of `info` covering every register field with a few low-byte patterns.
fn sample_words(info: &OpInfo) -> impl Iterator<Item = u16> + '_ {
    (0..=u16::MAX).filter(move |&w| {
        w & info.mask == info.value
            && (w == info.value || matches!(w & 0xFF, 0x00 | 0x01 | 0x3F | 0x7F | 0x80 | 0xC1))
    })
}

/// Encodings of every native opcode with a spread of register fields and immediates.
fn native_encodings() -> Vec<Vec<u16>> {
    let mut out = Vec::new();
    for info in ARITH_OPCODES
        .iter()
        .filter(|info| capability(info.op).is_native())
    {
        for word in sample_words(info) {
            if info.size == 2 {
                out.extend(EXT_WORDS.iter().map(|&ext| vec![word, ext]));
            } else {
                out.push(vec![word]);
            }
        }
    }
    out
}

/// Lay out each encoding as its own block and return the program with the block start pcs.
fn program(blocks: &[Vec<u16>]) -> (Vec<u16>, Vec<u16>) {
    let mut imem = Vec::new();
    let mut starts = Vec::new();
    for block in blocks {
        starts.push(imem.len() as u16);
        imem.extend_from_slice(block);
        imem.push(BLOCK_END);
    }
    (imem, starts)
}

fn grid_regs(i: usize, j: usize) -> DspRegisters {
    let mut regs = DspRegisters::default();
    regs.set_acc(Acc::Acc0, ACC_VALUES[i]);
    regs.set_acc(Acc::Acc1, ACC_VALUES[j]);
    let (l0, h0) = AX_VALUES[(i + j) % AX_VALUES.len()];
    let (l1, h1) = AX_VALUES[(3 * i + j + 1) % AX_VALUES.len()];
    regs.set_ax_l(0, l0);
    regs.set_ax_h(0, h0);
    regs.set_ax_l(1, l1);
    regs.set_ax_h(1, h1);
    regs.prod.low = l0 ^ l1;
    regs.prod.mid1 = h0;
    regs.prod.mid2 = h1;
    regs.prod.high = if i % 2 == 0 { 0x00FF } else { 0x0001 };
    regs.sr = if (i + j) % 2 == 0 {
        0
    } else {
        (StatusFlags::LOGIC_ZERO | StatusFlags::OVERFLOW_STICKY).bits() | 0x0A00
    };
    regs
}

#[track_caller]
fn check(rt: &mut JitRuntime, start: u16, regs: &DspRegisters) {
    let mut jit = *regs;
    let next = rt.run_block(&mut jit, start).unwrap();

    let mut expected = *regs;
    let expected_next = ReferenceInterpreter.run(&mut expected, rt.imem(), start, 64);

    let word = rt.imem()[usize::from(start)];
    assert_eq!(next, expected_next, "next pc for {word:#06x}");
    assert_eq!(
        jit, expected,
        "{word:#06x} diverged from the interpreter (input {regs:x?})"
    );
}

#[test]
fn native_ops_match_interpreter_over_operand_grid() {
    init_tracing();
    let (imem, starts) = program(&native_encodings());
    let mut rt = JitRuntime::new(imem, Box::new(ReferenceInterpreter), JitOptions::default())
        .unwrap();

    for &start in &starts {
        for i in 0..ACC_VALUES.len() {
            for j in 0..ACC_VALUES.len() {
                check(&mut rt, start, &grid_regs(i, j));
            }
        }
    }
    assert_eq!(rt.fallback_calls(), 0);
    assert_eq!(rt.cached_blocks(), starts.len());
}

#[test]
fn native_ops_match_interpreter_on_padded_accumulators() {
    let (imem, starts) = program(&native_encodings());
    let mut rt = JitRuntime::new(imem, Box::new(ReferenceInterpreter), JitOptions::default())
        .unwrap();

    let padded = [
        0xFFFF_FF00_1234_5678_u64 as i64,
        0x0000_0080_0000_0000_u64 as i64,
        0x7FFF_FFFF_FFFF_FFFF,
    ];
    for &start in &starts {
        for (k, &raw) in padded.iter().enumerate() {
            let mut regs = grid_regs(k, k + 1);
            regs.set_acc_raw(Acc::Acc0, raw);
            regs.set_acc_raw(Acc::Acc1, raw.rotate_left(8));
            check(&mut rt, start, &regs);
        }
    }
}

fn single_word_group_ops() -> Vec<u16> {
    ARITH_OPCODES
        .iter()
        .filter(|info| info.size == 1)
        .flat_map(sample_words)
        .collect()
}

fn regs_strategy() -> impl Strategy<Value = DspRegisters> {
    (
        any::<[i64; 2]>(),
        any::<[u16; 4]>(),
        any::<[u16; 4]>(),
        any::<u16>(),
    )
        .prop_map(|(acc, ax, prod, sr)| {
            let mut regs = DspRegisters::default();
            regs.set_acc(Acc::Acc0, acc[0]);
            regs.set_acc(Acc::Acc1, acc[1]);
            regs.set_ax_l(0, ax[0]);
            regs.set_ax_h(0, ax[1]);
            regs.set_ax_l(1, ax[2]);
            regs.set_ax_h(1, ax[3]);
            regs.prod.low = prod[0];
            regs.prod.mid1 = prod[1];
            regs.prod.mid2 = prod[2];
            regs.prod.high = prod[3];
            regs.sr = sr;
            regs
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn random_blocks_match_interpreter(
        picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..12),
        regs in regs_strategy(),
    ) {
        let ops = single_word_group_ops();
        let mut imem: Vec<u16> = picks.iter().map(|idx| ops[idx.index(ops.len())]).collect();
        imem.push(BLOCK_END);

        let mut rt = JitRuntime::new(imem.clone(), Box::new(ReferenceInterpreter), JitOptions::default())
            .unwrap();
        let mut jit = regs;
        let next = rt.run_block(&mut jit, 0).unwrap();

        let mut expected = regs;
        let expected_next = ReferenceInterpreter.run(&mut expected, &imem, 0, 64);

        prop_assert_eq!(next, expected_next);
        prop_assert_eq!(jit, expected, "program {:04x?}", imem);
    }
}
