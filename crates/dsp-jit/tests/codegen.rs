use dsp_core::opcodes::ARITH_OPCODES;
use dsp_core::{ArithOp, CodeFlags};
use dsp_jit::{
    capability, compile_block, Capability, CompiledBlock, FallbackReason, JitOptions, Route,
    SrPath,
};
use wasmparser::{Operator, Parser, Payload};

const INTERPRET_FN: u32 = 0;

fn validate_wasm(bytes: &[u8]) {
    let mut validator = wasmparser::Validator::new();
    validator.validate_all(bytes).unwrap();
}

fn compile(imem: &[u16], options: &JitOptions) -> CompiledBlock {
    let mut flags = CodeFlags::new(imem.len());
    flags.analyze_block(imem, 0, options.limits.max_insts);
    let block = compile_block(imem, 0, &flags, options).unwrap();
    validate_wasm(&block.wasm);
    block
}

/// Operators of the block function, in emission order.
fn block_operators(bytes: &[u8]) -> Vec<String> {
    let mut ops = Vec::new();
    for payload in Parser::new(0).parse_all(bytes) {
        if let Payload::CodeSectionEntry(body) = payload.expect("parse wasm") {
            let mut reader = body.get_operators_reader().expect("operators reader");
            while !reader.eof() {
                let op = reader.read().expect("read operator");
                ops.push(match op {
                    Operator::Call { function_index } => format!("call {function_index}"),
                    Operator::I32Store16 { .. } => "sr_store".to_string(),
                    other => format!("{other:?}"),
                });
            }
        }
    }
    ops
}

fn count(ops: &[String], name: &str) -> usize {
    ops.iter().filter(|op| op.as_str() == name).count()
}

fn encoding(op: ArithOp) -> Vec<u16> {
    let info = ARITH_OPCODES
        .iter()
        .find(|info| info.op == op)
        .expect("opcode in table");
    let mut imem = vec![info.value];
    if info.size == 2 {
        imem.push(0x1234);
    }
    imem
}

#[test]
fn every_opcode_compiles_to_a_valid_module() {
    for info in ARITH_OPCODES {
        let imem = encoding(info.op);
        let block = compile(&imem, &JitOptions::default());
        assert_eq!(block.next_pc as usize, imem.len(), "{}", info.name);

        let ops = block_operators(&block.wasm);
        let calls = count(&ops, &format!("call {INTERPRET_FN}"));
        if capability(info.op).is_native() {
            assert_eq!(calls, 0, "{} should be emitted natively", info.name);
            assert_eq!(block.routes[0].route, Route::Native(SrPath::Full));
        } else {
            assert_eq!(calls, 1, "{} should call the interpreter", info.name);
        }
    }
}

#[test]
fn lsl16_never_emits_native_code() {
    assert!(matches!(
        capability(ArithOp::Lsl16),
        Capability::DisabledPendingFix { .. }
    ));
    for native_emission in [true, false] {
        // lsl16 $ac0 ; lsl16 $ac1
        let imem = [0xF000, 0xF100];
        let options = JitOptions {
            native_emission,
            ..JitOptions::default()
        };
        let block = compile(&imem, &options);
        let ops = block_operators(&block.wasm);
        assert_eq!(count(&ops, "call 0"), 2);
        assert_eq!(count(&ops, "I64Shl"), 0);
        if native_emission {
            for routed in &block.routes {
                assert!(matches!(
                    routed.route,
                    Route::Interpreter(FallbackReason::DisabledPendingFix(_))
                ));
            }
        }
    }
}

#[test]
fn disabled_native_emission_routes_everything() {
    // add $ac0, $ac1 ; inc $ac0 ; abs $ac0
    let imem = [0x4C00, 0x7600, 0xA100];
    let options = JitOptions {
        native_emission: false,
        ..JitOptions::default()
    };
    let block = compile(&imem, &options);
    assert_eq!(block.fallback_count(), 3);
    for routed in &block.routes {
        assert_eq!(
            routed.route,
            Route::Interpreter(FallbackReason::HostUnsupported)
        );
    }
    let ops = block_operators(&block.wasm);
    assert_eq!(count(&ops, "call 0"), 3);
    assert_eq!(count(&ops, "sr_store"), 0);
}

#[test]
fn elided_producers_do_not_write_sr() {
    // add $ac0, $ac1 ; sub $ac1, $ac0 ; inc $ac0
    let imem = [0x4C00, 0x5D00, 0x7600];
    let block = compile(&imem, &JitOptions::default());
    assert_eq!(
        block.routes.iter().map(|r| r.route).collect::<Vec<_>>(),
        vec![
            Route::Native(SrPath::Deferred),
            Route::Native(SrPath::Deferred),
            Route::Native(SrPath::Full),
        ]
    );
    assert_eq!(count(&block_operators(&block.wasm), "sr_store"), 1);

    // Without analyzer data every producer updates SR.
    let unanalyzed = compile_block(&imem, 0, &CodeFlags::default(), &JitOptions::default())
        .unwrap();
    validate_wasm(&unanalyzed.wasm);
    assert_eq!(count(&block_operators(&unanalyzed.wasm), "sr_store"), 3);
}

#[test]
fn pending_sr_is_committed_before_interpreter_calls() {
    // add $ac0, $ac1 ; xorr $ac0.m, $ax0.h
    let imem = [0x4C00, 0x3000];
    let block = compile(&imem, &JitOptions::default());
    assert_eq!(block.routes[0].route, Route::Native(SrPath::Deferred));

    let ops = block_operators(&block.wasm);
    let store = ops.iter().position(|op| op == "sr_store").expect("sr commit");
    let call = ops.iter().position(|op| op == "call 0").expect("fallback call");
    assert!(store < call);
    assert_eq!(count(&ops, "sr_store"), 1);
}

#[test]
fn logic_zero_ops_keep_the_producer_live() {
    // add $ac0, $ac1 ; andf $ac0.m, #0x10
    let imem = [0x4C00, 0x02A0, 0x0010];
    let block = compile(&imem, &JitOptions::default());
    assert_eq!(block.routes[0].route, Route::Native(SrPath::Full));
}

#[test]
fn deferred_update_at_block_end_is_committed() {
    // add $ac0, $ac1 ; inc $ac0, analyzed as one run but compiled as a single-instruction block
    let imem = [0x4C00, 0x7600];
    let mut flags = CodeFlags::new(imem.len());
    flags.analyze_block(&imem, 0, 64);
    let options = JitOptions {
        limits: dsp_jit::BlockLimits { max_insts: 1 },
        ..JitOptions::default()
    };
    let block = compile_block(&imem, 0, &flags, &options).unwrap();
    validate_wasm(&block.wasm);
    assert_eq!(block.next_pc, 1);
    assert_eq!(block.routes[0].route, Route::Native(SrPath::Deferred));
    assert_eq!(count(&block_operators(&block.wasm), "sr_store"), 1);
}

#[test]
fn abs_emits_a_single_branch() {
    let block = compile(&[0xA100], &JitOptions::default());
    let ops = block_operators(&block.wasm);
    assert_eq!(ops.iter().filter(|op| op.starts_with("If")).count(), 1);
}
