//! Native execution of compiled blocks.

mod wasmtime;

pub use self::wasmtime::WasmtimeBackend;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("wasm engine setup failed: {0}")]
    Engine(String),
    #[error("failed to instantiate block module: {0}")]
    Instantiate(String),
    #[error("block trapped: {0}")]
    Trap(String),
    #[error("no compiled block at table index {0}")]
    UnknownBlock(u32),
}
