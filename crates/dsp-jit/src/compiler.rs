//! Straight-line block compiler: one WASM module per block.

use dsp_core::{opcodes, CodeFlags};
use thiserror::Error;
use tracing::debug;
use wasm_encoder::{
    CodeSection, EntityType, ExportKind, ExportSection, FunctionSection, ImportSection,
    MemoryType, Module, TypeSection, ValType,
};

use crate::emitter::{BlockEmitter, Route, RoutedInst};
use crate::wasm::{EXPORT_BLOCK_FN, IMPORT_DSP_INTERPRET, IMPORT_MEMORY, IMPORT_MODULE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLimits {
    /// Upper bound on instructions per block.
    pub max_insts: usize,
}

impl Default for BlockLimits {
    fn default() -> Self {
        Self { max_insts: 64 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitOptions {
    /// Emit native code for opcodes whose capability allows it. When `false` every instruction is
    /// routed to the interpreter import, e.g. on hosts without a working code generator.
    pub native_emission: bool,

    pub limits: BlockLimits,

    /// Minimum size (in 64KiB pages) declared for the imported `env.memory`.
    pub memory_min_pages: u32,
}

impl Default for JitOptions {
    fn default() -> Self {
        Self {
            native_emission: true,
            limits: BlockLimits::default(),
            memory_min_pages: 1,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("start pc {pc:#06x} is outside instruction memory ({len} words)")]
    PcOutOfRange { pc: u16, len: usize },
    #[error("opcode {opcode:#06x} at {pc:#06x} is not an arithmetic instruction")]
    EmptyBlock { pc: u16, opcode: u16 },
    #[error("instruction at {pc:#06x} runs past the end of instruction memory")]
    TruncatedInstruction { pc: u16 },
    /// The block would have to end at a pc that does not fit in 16 bits.
    #[error("instruction at {pc:#06x} runs past the end of the 16-bit pc space")]
    PcSpaceOverflow { pc: u16 },
}

#[derive(Debug, Clone)]
pub struct CompiledBlock {
    pub wasm: Vec<u8>,
    pub start_pc: u16,
    /// Pc of the first instruction not covered by the block; also what `block` returns.
    pub next_pc: u16,
    pub routes: Vec<RoutedInst>,
}

impl CompiledBlock {
    pub fn inst_count(&self) -> usize {
        self.routes.len()
    }

    pub fn fallback_count(&self) -> usize {
        self.routes
            .iter()
            .filter(|r| matches!(r.route, Route::Interpreter(_)))
            .count()
    }
}

/// Compile the straight-line arithmetic run starting at `start_pc`.
///
/// `flags` must already hold the analyzer results for the run; addresses the analyzer never
/// visited are treated as requiring a full SR update.
pub fn compile_block(
    imem: &[u16],
    start_pc: u16,
    flags: &CodeFlags,
    options: &JitOptions,
) -> Result<CompiledBlock, CompileError> {
    let Some(&first) = imem.get(usize::from(start_pc)) else {
        return Err(CompileError::PcOutOfRange {
            pc: start_pc,
            len: imem.len(),
        });
    };
    let Some(first_info) = opcodes::decode(first) else {
        return Err(CompileError::EmptyBlock {
            pc: start_pc,
            opcode: first,
        });
    };
    let first_end = usize::from(start_pc) + usize::from(first_info.size);
    if first_end > imem.len() {
        return Err(CompileError::TruncatedInstruction { pc: start_pc });
    }
    if first_end > usize::from(u16::MAX) {
        return Err(CompileError::PcSpaceOverflow { pc: start_pc });
    }

    let mut module = Module::new();

    let mut types = TypeSection::new();
    let ty_interpret = types.len();
    types
        .ty()
        .function([ValType::I32, ValType::I32, ValType::I32], []);
    let ty_block = types.len();
    types.ty().function([ValType::I32], [ValType::I64]);
    module.section(&types);

    let mut imports = ImportSection::new();
    imports.import(
        IMPORT_MODULE,
        IMPORT_MEMORY,
        MemoryType {
            minimum: u64::from(options.memory_min_pages),
            maximum: None,
            memory64: false,
            shared: false,
            page_size_log2: None,
        },
    );
    imports.import(
        IMPORT_MODULE,
        IMPORT_DSP_INTERPRET,
        EntityType::Function(ty_interpret),
    );
    module.section(&imports);

    let interpret_fn = 0u32;
    let block_fn = 1u32;

    let mut funcs = FunctionSection::new();
    funcs.function(ty_block);
    module.section(&funcs);

    let mut exports = ExportSection::new();
    exports.export(EXPORT_BLOCK_FN, ExportKind::Func, block_fn);
    module.section(&exports);

    let mut emitter = BlockEmitter::new(imem, flags, options.native_emission, interpret_fn);
    let mut pc = start_pc;
    let mut insts = 0usize;
    while insts < options.limits.max_insts.max(1) {
        let Some(&opcode) = imem.get(usize::from(pc)) else {
            break;
        };
        let Some(info) = opcodes::decode(opcode) else {
            break;
        };
        let next = usize::from(pc) + usize::from(info.size);
        if next > imem.len() || next > usize::from(u16::MAX) {
            break;
        }
        emitter.emit(opcode, pc);
        pc = next as u16;
        insts += 1;
    }

    let (func, routes) = emitter.finish(pc);
    let mut code = CodeSection::new();
    code.function(&func);
    module.section(&code);

    let block = CompiledBlock {
        wasm: module.finish(),
        start_pc,
        next_pc: pc,
        routes,
    };
    debug!(
        start_pc,
        next_pc = block.next_pc,
        insts = block.inst_count(),
        fallbacks = block.fallback_count(),
        bytes = block.wasm.len(),
        "compiled DSP block"
    );
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{FallbackReason, SrPath};

    fn analyzed(imem: &[u16]) -> CodeFlags {
        let mut flags = CodeFlags::new(imem.len());
        flags.analyze_block(imem, 0, 64);
        flags
    }

    #[test]
    fn block_ends_at_first_foreign_opcode() {
        // add $ac0, $ac1 ; inc $ac0 ; (jump)
        let imem = [0x4C00, 0x7600, 0x0290];
        let flags = analyzed(&imem);
        let block = compile_block(&imem, 0, &flags, &JitOptions::default()).unwrap();
        assert_eq!(block.next_pc, 2);
        assert_eq!(block.inst_count(), 2);
        assert_eq!(block.routes[0].route, Route::Native(SrPath::Deferred));
        assert_eq!(block.routes[1].route, Route::Native(SrPath::Full));
    }

    #[test]
    fn max_insts_caps_the_block() {
        let imem = [0x7600; 8];
        let flags = analyzed(&imem);
        let options = JitOptions {
            limits: BlockLimits { max_insts: 3 },
            ..JitOptions::default()
        };
        let block = compile_block(&imem, 0, &flags, &options).unwrap();
        assert_eq!(block.next_pc, 3);
    }

    #[test]
    fn two_word_instruction_advances_by_two() {
        // addi $ac0, #0x0010 ; inc $ac0
        let imem = [0x0200, 0x0010, 0x7600];
        let flags = analyzed(&imem);
        let block = compile_block(&imem, 0, &flags, &JitOptions::default()).unwrap();
        assert_eq!(block.next_pc, 3);
        assert_eq!(block.routes[1].pc, 2);
    }

    #[test]
    fn lsl16_is_routed_to_the_interpreter() {
        let imem = [0xF000];
        let flags = analyzed(&imem);
        let block = compile_block(&imem, 0, &flags, &JitOptions::default()).unwrap();
        assert!(matches!(
            block.routes[0].route,
            Route::Interpreter(FallbackReason::DisabledPendingFix(_))
        ));
        assert_eq!(block.fallback_count(), 1);
    }

    #[test]
    fn errors() {
        let flags = CodeFlags::default();
        let options = JitOptions::default();
        assert_eq!(
            compile_block(&[0x7600], 1, &flags, &options).unwrap_err(),
            CompileError::PcOutOfRange { pc: 1, len: 1 }
        );
        assert_eq!(
            compile_block(&[0x0290], 0, &flags, &options).unwrap_err(),
            CompileError::EmptyBlock {
                pc: 0,
                opcode: 0x0290
            }
        );
        assert_eq!(
            compile_block(&[0x0200], 0, &flags, &options).unwrap_err(),
            CompileError::TruncatedInstruction { pc: 0 }
        );
    }

    #[test]
    fn last_pc_of_a_full_address_space_is_rejected() {
        let imem = vec![0x7600; 0x1_0000];
        let options = JitOptions::default();
        let mut flags = CodeFlags::new(imem.len());
        flags.analyze_block(&imem, 0xFFFF, 64);
        assert_eq!(
            compile_block(&imem, 0xFFFF, &flags, &options).unwrap_err(),
            CompileError::PcSpaceOverflow { pc: 0xFFFF }
        );

        // One word earlier still fits: the block ends exactly at 0xffff.
        let block = compile_block(&imem, 0xFFFE, &flags, &options).unwrap();
        assert_eq!(block.inst_count(), 1);
        assert_eq!(block.next_pc, 0xFFFF);
    }
}
