//! WASM block compiler for the DSP arithmetic group.
//!
//! - [`compiler`]: straight-line block discovery and module assembly.
//! - [`emitter`]: per-instruction emission, SR elision, and interpreter routing.
//! - [`backend`] / [`runtime`]: native execution through `wasmtime` with a per-pc block cache.

pub mod abi;
pub mod capability;
pub mod compiler;
pub mod emitter;
pub mod wasm;
pub mod writeback;

#[cfg(not(target_arch = "wasm32"))]
pub mod backend;
#[cfg(not(target_arch = "wasm32"))]
pub mod runtime;

pub use capability::{capability, Capability};
pub use compiler::{compile_block, BlockLimits, CompileError, CompiledBlock, JitOptions};
pub use emitter::{BlockEmitter, CarryRule, FallbackReason, Route, RoutedInst, SrPath, SrRule};

#[cfg(not(target_arch = "wasm32"))]
pub use backend::{BackendError, WasmtimeBackend};
#[cfg(not(target_arch = "wasm32"))]
pub use runtime::{JitError, JitRuntime};
