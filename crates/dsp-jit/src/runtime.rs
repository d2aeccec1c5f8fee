//! Block cache and dispatch.

use std::collections::HashMap;
use std::ops::Range;

use dsp_core::{CodeFlags, DspRegisters, Interpreter};
use thiserror::Error;
use tracing::debug;

use crate::backend::{BackendError, WasmtimeBackend};
use crate::compiler::{compile_block, CompileError, JitOptions};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JitError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedBlock {
    table_index: u32,
    /// Instruction words covered, `start..end`.
    span: Range<u16>,
}

impl CachedBlock {
    fn overlaps(&self, range: &Range<u16>) -> bool {
        self.span.start < range.end && range.start < self.span.end
    }
}

/// Owns instruction memory, analyzer state, and compiled blocks keyed by start pc.
pub struct JitRuntime {
    options: JitOptions,
    backend: WasmtimeBackend,
    imem: Vec<u16>,
    code_flags: CodeFlags,
    cache: HashMap<u16, CachedBlock>,
}

impl JitRuntime {
    pub fn new(
        imem: Vec<u16>,
        interpreter: Box<dyn Interpreter>,
        options: JitOptions,
    ) -> Result<Self, JitError> {
        let mut backend = WasmtimeBackend::new_with_memory_pages(
            interpreter,
            options.memory_min_pages.max(1),
            WasmtimeBackend::DEFAULT_STATE_PTR,
        )?;
        backend.set_imem(&imem);
        Ok(Self {
            options,
            backend,
            code_flags: CodeFlags::new(imem.len()),
            imem,
            cache: HashMap::new(),
        })
    }

    pub fn options(&self) -> &JitOptions {
        &self.options
    }

    pub fn imem(&self) -> &[u16] {
        &self.imem
    }

    pub fn code_flags(&self) -> &CodeFlags {
        &self.code_flags
    }

    pub fn is_compiled(&self, pc: u16) -> bool {
        self.cache.contains_key(&pc)
    }

    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    pub fn fallback_calls(&self) -> u64 {
        self.backend.fallback_calls()
    }

    /// Execute the block starting at `pc`, compiling it first if needed. Returns the next pc.
    pub fn run_block(&mut self, regs: &mut DspRegisters, pc: u16) -> Result<u16, JitError> {
        let table_index = match self.cache.get(&pc) {
            Some(block) => block.table_index,
            None => self.compile(pc)?,
        };
        Ok(self.backend.execute(table_index, regs)?)
    }

    fn compile(&mut self, pc: u16) -> Result<u32, JitError> {
        self.code_flags
            .analyze_block(&self.imem, pc, self.options.limits.max_insts);
        let block = compile_block(&self.imem, pc, &self.code_flags, &self.options)?;
        let table_index = self.backend.add_compiled_block(&block.wasm)?;
        self.cache.insert(
            pc,
            CachedBlock {
                table_index,
                span: block.start_pc..block.next_pc,
            },
        );
        Ok(table_index)
    }

    /// Overwrite instruction memory at `addr` and drop every block that covered the old words.
    pub fn write_imem(&mut self, addr: u16, words: &[u16]) {
        let start = usize::from(addr).min(self.imem.len());
        let end = (start + words.len()).min(self.imem.len());
        self.imem[start..end].copy_from_slice(&words[..end - start]);
        self.backend.set_imem(&self.imem);
        self.invalidate(start as u16..end as u16);
    }

    /// Forget compiled blocks and analyzer flags overlapping `range`.
    pub fn invalidate(&mut self, range: Range<u16>) {
        if range.is_empty() {
            return;
        }
        let before = self.cache.len();
        let mut stale = range.clone();
        self.cache.retain(|_, block| {
            let overlaps = block.overlaps(&range);
            if overlaps {
                stale.start = stale.start.min(block.span.start);
                stale.end = stale.end.max(block.span.end);
            }
            !overlaps
        });
        // Flags of a dropped block were computed with its whole span in view.
        self.code_flags.invalidate(stale);
        debug!(
            start = range.start,
            end = range.end,
            dropped = before - self.cache.len(),
            "invalidated cached DSP blocks"
        );
    }
}
