//! WASM ABI shared by the block compiler and the execution backends.

pub mod abi;

pub use abi::*;
