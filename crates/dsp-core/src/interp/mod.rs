//! Reference interpreter for the arithmetic instruction group.
//!
//! This is the full-semantics executor that JIT blocks call back into for instructions they do not
//! emit natively. It is also the oracle the conformance tests compare emitted code against.

pub mod alu;

use tracing::warn;

use crate::opcodes;
use crate::state::DspRegisters;

/// Single-step executor used as the fallback target of emitted code.
pub trait Interpreter {
    /// Execute the instruction `opcode` located at `pc`, mutating `regs`.
    ///
    /// Two-word instructions read their extension word from `imem[pc + 1]`.
    fn execute_one(&mut self, regs: &mut DspRegisters, imem: &[u16], opcode: u16, pc: u16);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceInterpreter;

impl ReferenceInterpreter {
    /// Interpret up to `max_insts` consecutive arithmetic instructions starting at `pc`.
    ///
    /// Stops early at the first word outside the arithmetic group or at the end of `imem`.
    /// Returns the pc of the first instruction that was not executed.
    pub fn run(&mut self, regs: &mut DspRegisters, imem: &[u16], mut pc: u16, max_insts: usize) -> u16 {
        for _ in 0..max_insts {
            let Some(&opcode) = imem.get(usize::from(pc)) else {
                break;
            };
            let Some(info) = opcodes::decode(opcode) else {
                break;
            };
            self.execute_one(regs, imem, opcode, pc);
            pc = pc.wrapping_add(info.size);
        }
        pc
    }
}

impl Interpreter for ReferenceInterpreter {
    fn execute_one(&mut self, regs: &mut DspRegisters, imem: &[u16], opcode: u16, pc: u16) {
        let Some(info) = opcodes::decode(opcode) else {
            warn!(pc, opcode, "opcode outside the arithmetic group; ignoring");
            return;
        };
        let imm = if info.size > 1 {
            imem.get(usize::from(pc) + 1).copied().unwrap_or(0)
        } else {
            0
        };
        alu::execute(regs, info.op, opcode, imm);
    }
}
