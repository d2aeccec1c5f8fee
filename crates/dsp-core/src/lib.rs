//! Architectural model of the DSP arithmetic unit: register file, status flags, the arithmetic
//! instruction group, the SR liveness analyzer, and a reference interpreter.

pub mod analyzer;
pub mod flags;
pub mod interp;
pub mod opcodes;
pub mod state;

pub use analyzer::{CodeFlag, CodeFlags};
pub use flags::StatusFlags;
pub use interp::{Interpreter, ReferenceInterpreter};
pub use opcodes::{ArithOp, OpInfo, SrEffect};
pub use state::{Acc, AxHalf, DspRegisters, Product};
