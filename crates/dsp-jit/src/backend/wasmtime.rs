use dsp_core::{DspRegisters, Interpreter};
use tracing::warn;
use wasmtime::{Caller, Config, Engine, Linker, Memory, MemoryType, Module, Store, TypedFunc};

use super::BackendError;
use crate::abi;
use crate::wasm::{
    EXPORT_BLOCK_FN, IMPORT_DSP_INTERPRET, IMPORT_MEMORY, IMPORT_MODULE, WASM32_MAX_PAGES,
};

struct HostState {
    interpreter: Box<dyn Interpreter>,
    imem: Vec<u16>,
    fallback_calls: u64,
    fault: Option<String>,
}

/// `wasmtime`-powered backend that executes compiled DSP blocks.
///
/// ## ABI (`export block(state_ptr: i32) -> i64`)
///
/// Every block imports the same linear memory. Before a call the register file is written at
/// `state_ptr` using the layout in [`crate::abi`]; the block mutates it in place and returns the pc
/// of the first instruction it did not execute. Instructions routed to `env.dsp_interpret` are run
/// by the host [`Interpreter`] against the same memory image.
pub struct WasmtimeBackend {
    engine: Engine,
    store: Store<HostState>,
    linker: Linker<HostState>,
    memory: Memory,
    state_ptr: i32,
    blocks: Vec<TypedFunc<i32, i64>>,
}

impl WasmtimeBackend {
    pub const DEFAULT_MEMORY_PAGES: u32 = 1;

    /// Default location of the register file within linear memory.
    pub const DEFAULT_STATE_PTR: i32 = 0x100;

    pub fn new(interpreter: Box<dyn Interpreter>) -> Result<Self, BackendError> {
        Self::new_with_memory_pages(interpreter, Self::DEFAULT_MEMORY_PAGES, Self::DEFAULT_STATE_PTR)
    }

    pub fn new_with_memory_pages(
        interpreter: Box<dyn Interpreter>,
        memory_pages: u32,
        state_ptr: i32,
    ) -> Result<Self, BackendError> {
        if memory_pages == 0 || memory_pages > WASM32_MAX_PAGES {
            return Err(BackendError::Engine(format!(
                "memory_pages must be in 1..={WASM32_MAX_PAGES}, got {memory_pages}"
            )));
        }
        let byte_len = memory_pages as usize * 65_536;
        let state_end = usize::try_from(state_ptr)
            .ok()
            .and_then(|p| p.checked_add(abi::DSP_STATE_SIZE as usize));
        match state_end {
            Some(end) if end <= byte_len && state_ptr as u32 % abi::DSP_STATE_ALIGN == 0 => {}
            _ => {
                return Err(BackendError::Engine(format!(
                    "state_ptr 0x{state_ptr:x} must be {}-byte aligned and leave room for the \
                     register file in {byte_len} bytes",
                    abi::DSP_STATE_ALIGN
                )))
            }
        }

        let config = Config::new();
        let engine = Engine::new(&config).map_err(|e| BackendError::Engine(e.to_string()))?;
        let mut store = Store::new(
            &engine,
            HostState {
                interpreter,
                imem: Vec::new(),
                fallback_calls: 0,
                fault: None,
            },
        );
        let mut linker = Linker::new(&engine);

        let memory = Memory::new(&mut store, MemoryType::new(memory_pages, None))
            .map_err(|e| BackendError::Engine(e.to_string()))?;
        linker
            .define(&mut store, IMPORT_MODULE, IMPORT_MEMORY, memory)
            .map_err(|e| BackendError::Engine(e.to_string()))?;
        define_interpret(&mut linker, memory)?;

        Ok(Self {
            engine,
            store,
            linker,
            memory,
            state_ptr,
            blocks: Vec::new(),
        })
    }

    /// Instruction memory seen by the interpreter fallback.
    pub fn set_imem(&mut self, imem: &[u16]) {
        let host = self.store.data_mut();
        host.imem.clear();
        host.imem.extend_from_slice(imem);
    }

    /// Instantiate a block module and append it to the internal table.
    ///
    /// Returns the table index used by [`Self::execute`].
    pub fn add_compiled_block(&mut self, wasm_bytes: &[u8]) -> Result<u32, BackendError> {
        let module = Module::new(&self.engine, wasm_bytes)
            .map_err(|e| BackendError::Instantiate(e.to_string()))?;
        let instance = self
            .linker
            .instantiate(&mut self.store, &module)
            .map_err(|e| BackendError::Instantiate(e.to_string()))?;
        let func = instance
            .get_typed_func::<i32, i64>(&mut self.store, EXPORT_BLOCK_FN)
            .map_err(|e| BackendError::Instantiate(e.to_string()))?;
        let idx = self.blocks.len() as u32;
        self.blocks.push(func);
        Ok(idx)
    }

    /// Run block `table_index` against `regs` and return the next pc.
    pub fn execute(
        &mut self,
        table_index: u32,
        regs: &mut DspRegisters,
    ) -> Result<u16, BackendError> {
        let func = self
            .blocks
            .get(table_index as usize)
            .cloned()
            .ok_or(BackendError::UnknownBlock(table_index))?;

        let base = self.state_ptr as usize;
        regs.write_to_mem(self.memory.data_mut(&mut self.store), base);
        self.store.data_mut().fault = None;

        let ret = func
            .call(&mut self.store, self.state_ptr)
            .map_err(|e| BackendError::Trap(e.to_string()))?;
        if let Some(fault) = self.store.data_mut().fault.take() {
            return Err(BackendError::Trap(fault));
        }

        *regs = DspRegisters::read_from_mem(self.memory.data(&self.store), base);
        u16::try_from(ret).map_err(|_| BackendError::Trap(format!("block returned pc {ret}")))
    }

    /// Number of instructions executed through the interpreter import so far.
    pub fn fallback_calls(&self) -> u64 {
        self.store.data().fallback_calls
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

fn define_interpret(linker: &mut Linker<HostState>, memory: Memory) -> Result<(), BackendError> {
    let mem = memory;
    linker
        .func_wrap(
            IMPORT_MODULE,
            IMPORT_DSP_INTERPRET,
            move |mut caller: Caller<'_, HostState>, state_ptr: i32, opcode: i32, pc: i32| {
                let base = state_ptr as u32 as usize;
                let in_bounds = base
                    .checked_add(abi::DSP_STATE_SIZE as usize)
                    .is_some_and(|end| end <= mem.data(&caller).len());
                if !in_bounds {
                    warn!(state_ptr, "interpreter fallback with out-of-bounds state pointer");
                    caller.data_mut().fault =
                        Some(format!("state_ptr 0x{state_ptr:x} out of bounds"));
                    return;
                }

                let mut regs = DspRegisters::read_from_mem(mem.data(&caller), base);
                let host = caller.data_mut();
                host.fallback_calls += 1;
                host.interpreter
                    .execute_one(&mut regs, &host.imem, opcode as u16, pc as u16);
                regs.write_to_mem(mem.data_mut(&mut caller), base);
            },
        )
        .map_err(|e| BackendError::Engine(e.to_string()))?;
    Ok(())
}
