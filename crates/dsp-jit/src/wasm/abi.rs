/// Module name for all imports required by emitted DSP blocks.
pub const IMPORT_MODULE: &str = "env";

/// Imported linear memory holding the register file at `state_ptr`.
pub const IMPORT_MEMORY: &str = "memory";

/// Maximum number of 64KiB pages in a wasm32 linear memory (4GiB).
pub const WASM32_MAX_PAGES: u32 = 65_536;

/// Export name of the block entry point.
///
/// Signature: `block(state_ptr: i32) -> i64`, returning the pc of the first instruction the block
/// did not execute.
pub const EXPORT_BLOCK_FN: &str = "block";

/// Single-instruction interpreter fallback.
///
/// Signature: `env.dsp_interpret(state_ptr: i32, opcode: i32, pc: i32)`. The host executes the
/// instruction against the register file in linear memory. Emitted code flushes every deferred SR
/// update before the call.
pub const IMPORT_DSP_INTERPRET: &str = "dsp_interpret";
