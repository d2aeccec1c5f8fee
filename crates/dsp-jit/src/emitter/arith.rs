//! Native handlers for the arithmetic group.

use dsp_core::state::ACC40_MASK;
use dsp_core::{Acc, ArithOp, AxHalf};
use wasm_encoder::{BlockType, Instruction};

use super::{BlockEmitter, CarryRule, ScratchSlot, SrPath, SrRule};

use ScratchSlot::{Lhs, Res, Rhs};

#[inline]
fn acc_bit8(opcode: u16) -> Acc {
    Acc::from_field(opcode >> 8)
}

#[inline]
fn acc_bit11(opcode: u16) -> Acc {
    Acc::from_field(opcode >> 11)
}

#[inline]
fn ax_bit9(opcode: u16) -> usize {
    usize::from((opcode >> 9) & 1)
}

const ADD: SrRule = SrRule::Arith(CarryRule::Carry);
const SUB: SrRule = SrRule::Arith(CarryRule::Carry2);

impl BlockEmitter<'_> {
    /// Emit `op` natively, or return `None` without emitting anything if it has no handler.
    pub(super) fn emit_native(&mut self, op: ArithOp, opcode: u16) -> Option<SrPath> {
        let path = match op {
            ArithOp::Clr => {
                let dst = acc_bit11(opcode);
                self.set_const(Res, 0);
                self.commit_result(dst);
                self.finish_sr(dst, SrRule::Value)
            }
            ArithOp::Tst => {
                let acc = acc_bit11(opcode);
                self.load_acc(acc, Res);
                self.finish_sr(acc, SrRule::Value)
            }
            ArithOp::Cmp => {
                self.load_acc(Acc::Acc0, Lhs);
                self.load_acc(Acc::Acc1, Rhs);
                self.emit_sub();
                self.finish_sr(Acc::Acc0, SUB)
            }
            ArithOp::Cmpar => {
                let acc = acc_bit11(opcode);
                self.load_acc(acc, Lhs);
                self.load_ax_half_widened(AxHalf::high(usize::from((opcode >> 12) & 1)), Rhs);
                self.emit_sub();
                self.finish_sr(acc, SUB)
            }
            ArithOp::Cmpi => {
                let acc = acc_bit8(opcode);
                self.load_acc(acc, Lhs);
                self.set_const(Rhs, i64::from(self.ext_word() as i16) << 16);
                self.emit_sub();
                self.finish_sr(acc, SUB)
            }
            ArithOp::Cmpis => {
                let acc = acc_bit8(opcode);
                self.load_acc(acc, Lhs);
                self.set_const(Rhs, i64::from(opcode as u8 as i8) << 16);
                self.emit_sub();
                self.finish_sr(acc, SUB)
            }
            ArithOp::Addr => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.load_ax_half_widened(AxHalf::from_field(opcode >> 9), Rhs);
                self.add_into(dst)
            }
            ArithOp::Addax => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.load_long_acx(ax_bit9(opcode), Rhs);
                self.add_into(dst)
            }
            ArithOp::Add => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.load_acc(dst.other(), Rhs);
                self.add_into(dst)
            }
            ArithOp::Addp => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.load_long_prod(Rhs);
                self.add_into(dst)
            }
            ArithOp::Addi => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.set_const(Rhs, i64::from(self.ext_word() as i16) << 16);
                self.add_into(dst)
            }
            ArithOp::Addis => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.set_const(Rhs, i64::from(opcode as u8 as i8) << 16);
                self.add_into(dst)
            }
            ArithOp::Incm => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.set_const(Rhs, 0x10000);
                self.add_into(dst)
            }
            ArithOp::Inc => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.set_const(Rhs, 1);
                self.add_into(dst)
            }
            ArithOp::Subr => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.load_ax_half_widened(AxHalf::from_field(opcode >> 9), Rhs);
                self.sub_into(dst)
            }
            ArithOp::Subax => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.load_long_acx(ax_bit9(opcode), Rhs);
                self.sub_into(dst)
            }
            ArithOp::Sub => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.load_acc(dst.other(), Rhs);
                self.sub_into(dst)
            }
            ArithOp::Subp => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.load_long_prod(Rhs);
                self.sub_into(dst)
            }
            ArithOp::Decm => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.set_const(Rhs, 0x10000);
                self.sub_into(dst)
            }
            ArithOp::Dec => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.set_const(Rhs, 1);
                self.sub_into(dst)
            }
            ArithOp::Neg => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Lhs);
                self.func.instruction(&Instruction::I64Const(0));
                self.get(Lhs);
                self.func.instruction(&Instruction::I64Sub);
                self.set(Res);
                self.commit_result(dst);
                self.finish_sr(dst, SrRule::Value)
            }
            ArithOp::Abs => {
                let dst = acc_bit11(opcode);
                self.load_acc(dst, Res);
                self.get(Res);
                self.func.instruction(&Instruction::I64Const(0));
                self.func.instruction(&Instruction::I64LtS);
                self.func.instruction(&Instruction::If(BlockType::Empty));
                self.func.instruction(&Instruction::I64Const(0));
                self.get(Res);
                self.func.instruction(&Instruction::I64Sub);
                self.set(Res);
                self.func.instruction(&Instruction::End);
                self.commit_result(dst);
                self.finish_sr(dst, SrRule::Value)
            }
            ArithOp::Movr => {
                let dst = acc_bit8(opcode);
                self.load_ax_half_widened(AxHalf::from_field(opcode >> 9), Res);
                self.commit_result(dst);
                self.finish_sr(dst, SrRule::Value)
            }
            ArithOp::Movax => {
                let dst = acc_bit8(opcode);
                self.load_long_acx(ax_bit9(opcode), Res);
                self.commit_result(dst);
                self.finish_sr(dst, SrRule::Value)
            }
            ArithOp::Mov => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst.other(), Res);
                self.commit_result(dst);
                self.finish_sr(dst, SrRule::Value)
            }
            ArithOp::Lsr16 => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Res);
                // Padding above bit 39 must not reach the result.
                self.get(Res);
                self.func.instruction(&Instruction::I64Const(ACC40_MASK));
                self.func.instruction(&Instruction::I64And);
                self.func.instruction(&Instruction::I64Const(16));
                self.func.instruction(&Instruction::I64ShrU);
                self.set(Res);
                self.commit_result(dst);
                self.finish_sr(dst, SrRule::Value)
            }
            ArithOp::Asr16 => {
                let dst = acc_bit11(opcode);
                self.load_acc(dst, Res);
                self.shift_result(Instruction::I64ShrS, 16);
                self.commit_result(dst);
                self.finish_sr(dst, SrRule::Value)
            }
            ArithOp::Lsl | ArithOp::Asl => {
                let dst = acc_bit8(opcode);
                self.load_acc(dst, Res);
                self.shift_result(Instruction::I64Shl, i64::from(opcode & 0x3F));
                self.commit_result(dst);
                self.finish_sr(dst, SrRule::Value)
            }
            ArithOp::Lsl16
            | ArithOp::Clrl
            | ArithOp::Andcf
            | ArithOp::Andf
            | ArithOp::Tstaxh
            | ArithOp::Xorr
            | ArithOp::Andr
            | ArithOp::Orr
            | ArithOp::Andc
            | ArithOp::Orc
            | ArithOp::Xorc
            | ArithOp::Not
            | ArithOp::Xori
            | ArithOp::Andi
            | ArithOp::Ori
            | ArithOp::Addaxl
            | ArithOp::Lsr
            | ArithOp::Asr
            | ArithOp::Lsrn
            | ArithOp::Asrn
            | ArithOp::Lsrnrx
            | ArithOp::Asrnrx
            | ArithOp::Lsrnr
            | ArithOp::Asrnr => return None,
        };
        Some(path)
    }

    fn add_into(&mut self, dst: Acc) -> SrPath {
        self.emit_add();
        self.store_acc(dst, Res);
        self.finish_sr(dst, ADD)
    }

    fn sub_into(&mut self, dst: Acc) -> SrPath {
        self.emit_sub();
        self.store_acc(dst, Res);
        self.finish_sr(dst, SUB)
    }

    fn shift_result(&mut self, shift: Instruction<'static>, amount: i64) {
        self.get(Res);
        self.func.instruction(&Instruction::I64Const(amount));
        self.func.instruction(&shift);
        self.set(Res);
    }
}
