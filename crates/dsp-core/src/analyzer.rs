//! Per-PC instruction metadata consumed by the block compiler.
//!
//! The SR liveness pass works backwards over a straight-line block: the status register is live at
//! the block end, a full flag producer kills it, and a producer that runs while SR is live is
//! marked [`CodeFlag::UPDATE_SR`]. Anything that only touches the logic-zero bit is transparent.
//!
//! A producer without `UPDATE_SR` still owes the sticky overflow bit, which no later update clears;
//! the emitter accounts for that separately.

use std::ops::Range;

use bitflags::bitflags;

use crate::opcodes::{self, OpInfo, SrEffect};

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct CodeFlag: u8 {
        /// First word of a decoded instruction.
        const START_OF_INST = 1 << 0;
        /// Some later consumer observes the flags this instruction produces.
        const UPDATE_SR = 1 << 1;
    }
}

/// PC-indexed analyzer table. Addresses without an entry report no flags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeFlags {
    flags: Vec<CodeFlag>,
}

impl CodeFlags {
    pub fn new(len: usize) -> Self {
        Self {
            flags: vec![CodeFlag::empty(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    #[inline]
    pub fn get(&self, pc: u16) -> CodeFlag {
        self.flags
            .get(usize::from(pc))
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&mut self, pc: u16, flag: CodeFlag) {
        let idx = usize::from(pc);
        if idx >= self.flags.len() {
            self.flags.resize(idx + 1, CodeFlag::empty());
        }
        self.flags[idx] = flag;
    }

    #[inline]
    pub fn is_start_of_instruction(&self, pc: u16) -> bool {
        self.get(pc).contains(CodeFlag::START_OF_INST)
    }

    #[inline]
    pub fn requires_sr_update(&self, pc: u16) -> bool {
        self.get(pc).contains(CodeFlag::UPDATE_SR)
    }

    /// Forget everything known about `range`; the next analysis recomputes it.
    pub fn invalidate(&mut self, range: Range<u16>) {
        let end = usize::from(range.end).min(self.flags.len());
        let start = usize::from(range.start).min(end);
        self.flags[start..end].fill(CodeFlag::empty());
    }

    /// Analyze the straight-line run of arithmetic instructions starting at `start`.
    ///
    /// The run ends at the first word outside the arithmetic group, at an instruction truncated by
    /// the end of `imem`, or after `max_insts` instructions. Returns the pc just past the run.
    pub fn analyze_block(&mut self, imem: &[u16], start: u16, max_insts: usize) -> u16 {
        let insts = straight_line_run(imem, start, max_insts);

        for &(pc, info) in &insts {
            self.set(pc, CodeFlag::START_OF_INST);
            for ext in 1..info.size {
                self.set(pc + ext, CodeFlag::empty());
            }
        }

        let mut sr_live = true;
        for &(pc, info) in insts.iter().rev() {
            if info.sr == SrEffect::Full {
                if sr_live {
                    self.set(pc, CodeFlag::START_OF_INST | CodeFlag::UPDATE_SR);
                }
                sr_live = false;
            }
        }

        insts
            .last()
            .map_or(start, |&(pc, info)| pc + info.size)
    }
}

fn straight_line_run(imem: &[u16], start: u16, max_insts: usize) -> Vec<(u16, &'static OpInfo)> {
    let mut insts = Vec::new();
    let mut pc = start;
    while insts.len() < max_insts {
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
        insts.push((pc, info));
        pc = next as u16;
    }
    insts
}
