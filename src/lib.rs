//! DSP arithmetic recompiler.
//!
//! [`dsp_core`] holds the architectural model and the reference interpreter; [`dsp_jit`] compiles
//! straight-line runs of arithmetic instructions to WASM and executes them.

pub use dsp_core;
pub use dsp_jit;
