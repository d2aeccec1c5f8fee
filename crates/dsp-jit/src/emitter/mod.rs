//! Per-instruction WASM emission.
//!
//! A [`BlockEmitter`] appends the body of one block function. Every arithmetic handler follows the
//! same shape: decode register fields, load operands into the fixed scratch slots, compute into
//! [`ScratchSlot::Res`], write the accumulator, then either emit the SR update or park it in the
//! [`WriteBackLog`] depending on the analyzer flags for the current pc.
//!
//! Overflow is the one flag an elided producer cannot drop: the sticky bit is never cleared by a
//! later update, so a deferred add/subtract still ORs its overflow into a sticky local that the
//! next SR store folds in.
//!
//! Scratch convention: `Lhs` holds the accumulator operand, `Rhs` the second operand (negated after
//! a subtraction so the overflow test can treat it as an addend), `Res` the new value. Handlers
//! never nest, so the same three locals serve every instruction.

mod arith;

use dsp_core::flags::{StatusFlags, SR_CMP_MASK};
use dsp_core::{opcodes, Acc, CodeFlags};
use tracing::trace;
use wasm_encoder::{Function, Instruction, MemArg, ValType};

use crate::abi;
use crate::capability::{capability, Capability};
use crate::writeback::WriteBackLog;

/// Role of a scratch local.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ScratchSlot {
    Lhs = 0,
    Rhs = 1,
    Res = 2,
}

const SCRATCH_SLOTS: u32 = 3;

/// Which carry test an add/subtract handler uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CarryRule {
    /// `(u64)lhs > (u64)res`
    Carry,
    /// `(u64)lhs >= (u64)res`
    Carry2,
}

/// How SR is derived from the scratch slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SrRule {
    /// Carry variant plus overflow from `Lhs`, `Rhs` and `Res`.
    Arith(CarryRule),
    /// Zero/sign group from `Res` only; carry and overflow are cleared.
    Value,
}

impl SrRule {
    fn inputs(self) -> &'static [ScratchSlot] {
        match self {
            SrRule::Arith(_) => &[ScratchSlot::Lhs, ScratchSlot::Rhs, ScratchSlot::Res],
            SrRule::Value => &[ScratchSlot::Res],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SrPath {
    /// SR was rewritten in place.
    Full,
    /// The update was queued in the write-back log.
    Deferred,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    /// Native emission is turned off for this host.
    HostUnsupported,
    InterpreterOnly,
    DisabledPendingFix(&'static str),
    /// The word is not part of the arithmetic group.
    Unrecognized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Native(SrPath),
    Interpreter(FallbackReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutedInst {
    pub pc: u16,
    pub opcode: u16,
    pub route: Route,
}

/// Local indices of the block function.
///
/// Param 0 is `state_ptr`. The i64 locals are the three scratch slots followed by a parked copy of
/// them per accumulator for the write-back log, then the i32 locals used to assemble SR and to
/// collect sticky overflow from deferred producers.
#[derive(Clone, Copy, Debug)]
struct LocalsLayout;

impl LocalsLayout {
    const I64_LOCALS: u32 = SCRATCH_SLOTS * 3;
    const I32_LOCALS: u32 = 2;

    fn state_ptr_local(self) -> u32 {
        0
    }

    fn scratch_local(self, slot: ScratchSlot) -> u32 {
        1 + slot as u32
    }

    fn pending_local(self, acc: Acc, slot: ScratchSlot) -> u32 {
        1 + SCRATCH_SLOTS * (1 + acc.index() as u32) + slot as u32
    }

    fn sr_local(self) -> u32 {
        1 + Self::I64_LOCALS
    }

    fn sticky_local(self) -> u32 {
        2 + Self::I64_LOCALS
    }
}

pub struct BlockEmitter<'a> {
    func: Function,
    layout: LocalsLayout,
    imem: &'a [u16],
    flags: &'a CodeFlags,
    native_emission: bool,
    interpret_fn: u32,
    log: WriteBackLog,
    /// The sticky local may hold a bit not yet stored to SR.
    sticky_pending: bool,
    pc: u16,
    routes: Vec<RoutedInst>,
}

impl<'a> BlockEmitter<'a> {
    pub fn new(
        imem: &'a [u16],
        flags: &'a CodeFlags,
        native_emission: bool,
        interpret_fn: u32,
    ) -> Self {
        Self {
            func: Function::new(vec![
                (LocalsLayout::I64_LOCALS, ValType::I64),
                (LocalsLayout::I32_LOCALS, ValType::I32),
            ]),
            layout: LocalsLayout,
            imem,
            flags,
            native_emission,
            interpret_fn,
            log: WriteBackLog::new(),
            sticky_pending: false,
            pc: 0,
            routes: Vec::new(),
        }
    }

    /// Emit the instruction `opcode` found at `pc`.
    pub fn emit(&mut self, opcode: u16, pc: u16) {
        self.pc = pc;
        let Some(info) = opcodes::decode(opcode) else {
            self.emit_fallback(opcode, FallbackReason::Unrecognized);
            return;
        };
        let route = match capability(info.op) {
            Capability::DisabledPendingFix { reason } => {
                self.emit_fallback(opcode, FallbackReason::DisabledPendingFix(reason))
            }
            Capability::InterpreterOnly => {
                self.emit_fallback(opcode, FallbackReason::InterpreterOnly)
            }
            Capability::Native if !self.native_emission => {
                self.emit_fallback(opcode, FallbackReason::HostUnsupported)
            }
            Capability::Native => match self.emit_native(info.op, opcode) {
                Some(path) => Route::Native(path),
                None => self.emit_fallback(opcode, FallbackReason::InterpreterOnly),
            },
        };
        self.routes.push(RoutedInst { pc, opcode, route });
    }

    pub fn routes(&self) -> &[RoutedInst] {
        &self.routes
    }

    /// Flush outstanding SR work and terminate the function, returning `next_pc`.
    pub fn finish(mut self, next_pc: u16) -> (Function, Vec<RoutedInst>) {
        self.commit_pending();
        self.func
            .instruction(&Instruction::I64Const(i64::from(next_pc)));
        self.func.instruction(&Instruction::End);
        (self.func, self.routes)
    }

    /// Emit the SR update for the most recent deferred entry and empty the log.
    pub fn commit_pending(&mut self) {
        if let Some(entry) = self.log.take_newest() {
            let l = self.layout;
            self.emit_sr_update(
                entry.rule,
                l.pending_local(entry.acc, ScratchSlot::Lhs),
                l.pending_local(entry.acc, ScratchSlot::Rhs),
                l.pending_local(entry.acc, ScratchSlot::Res),
            );
        }
    }

    /// Drop outstanding SR work; the caller is about to overwrite SR anyway.
    pub fn clear_log(&mut self) {
        let dropped = self.log.clear();
        if dropped > 0 {
            trace!(pc = self.pc, dropped, "deferred SR updates overwritten");
        }
    }

    fn emit_fallback(&mut self, opcode: u16, reason: FallbackReason) -> Route {
        trace!(pc = self.pc, opcode, ?reason, "routing instruction to interpreter");
        self.commit_pending();
        self.func
            .instruction(&Instruction::LocalGet(self.layout.state_ptr_local()));
        self.func
            .instruction(&Instruction::I32Const(i32::from(opcode)));
        self.func
            .instruction(&Instruction::I32Const(i32::from(self.pc)));
        self.func.instruction(&Instruction::Call(self.interpret_fn));
        Route::Interpreter(reason)
    }

    /// Extension word of a two-word instruction.
    fn ext_word(&self) -> u16 {
        self.imem
            .get(usize::from(self.pc) + 1)
            .copied()
            .unwrap_or(0)
    }

    fn sr_required(&self) -> bool {
        !self.flags.is_start_of_instruction(self.pc) || self.flags.requires_sr_update(self.pc)
    }

    /// Either rewrite SR now or park the inputs of `rule` for a later commit.
    fn finish_sr(&mut self, key: Acc, rule: SrRule) -> SrPath {
        if self.sr_required() {
            self.clear_log();
            let l = self.layout;
            self.emit_sr_update(
                rule,
                l.scratch_local(ScratchSlot::Lhs),
                l.scratch_local(ScratchSlot::Rhs),
                l.scratch_local(ScratchSlot::Res),
            );
            SrPath::Full
        } else {
            if let SrRule::Arith(_) = rule {
                self.collect_sticky_overflow();
            }
            self.queue_write_back(key, rule);
            SrPath::Deferred
        }
    }

    /// `sticky |= overflow(Lhs, Rhs, Res) ? OVERFLOW_STICKY : 0`
    fn collect_sticky_overflow(&mut self) {
        let l = self.layout;
        let (lhs, rhs, res) = (
            l.scratch_local(ScratchSlot::Lhs),
            l.scratch_local(ScratchSlot::Rhs),
            l.scratch_local(ScratchSlot::Res),
        );
        self.or_flag_into(l.sticky_local(), StatusFlags::OVERFLOW_STICKY, |this| {
            this.emit_overflow_cond(lhs, rhs, res)
        });
        self.sticky_pending = true;
    }

    fn queue_write_back(&mut self, acc: Acc, rule: SrRule) {
        for &slot in rule.inputs() {
            self.func
                .instruction(&Instruction::LocalGet(self.layout.scratch_local(slot)));
            self.func
                .instruction(&Instruction::LocalSet(self.layout.pending_local(acc, slot)));
        }
        if let Some(old) = self.log.queue(acc, rule) {
            trace!(pc = self.pc, ?acc, superseded = ?old.rule, "deferred SR update superseded");
        }
    }

    // ---- register file access ----

    fn state_ptr(&mut self) {
        self.func
            .instruction(&Instruction::LocalGet(self.layout.state_ptr_local()));
    }

    fn get(&mut self, slot: ScratchSlot) {
        self.func
            .instruction(&Instruction::LocalGet(self.layout.scratch_local(slot)));
    }

    fn set(&mut self, slot: ScratchSlot) {
        self.func
            .instruction(&Instruction::LocalSet(self.layout.scratch_local(slot)));
    }

    fn set_const(&mut self, slot: ScratchSlot, value: i64) {
        self.func.instruction(&Instruction::I64Const(value));
        self.set(slot);
    }

    fn load_acc(&mut self, acc: Acc, slot: ScratchSlot) {
        self.state_ptr();
        self.func
            .instruction(&Instruction::I64Load(memarg(abi::acc_off(acc), 3)));
        self.set(slot);
    }

    fn store_acc(&mut self, acc: Acc, slot: ScratchSlot) {
        self.state_ptr();
        self.get(slot);
        self.func
            .instruction(&Instruction::I64Store(memarg(abi::acc_off(acc), 3)));
    }

    /// `(s16)half << 16`
    fn load_ax_half_widened(&mut self, half: dsp_core::AxHalf, slot: ScratchSlot) {
        self.state_ptr();
        self.func
            .instruction(&Instruction::I64Load16S(memarg(abi::ax_half_off(half), 1)));
        self.func.instruction(&Instruction::I64Const(16));
        self.func.instruction(&Instruction::I64Shl);
        self.set(slot);
    }

    /// `(s16)ax.h << 16 | ax.l`
    fn load_long_acx(&mut self, ax: usize, slot: ScratchSlot) {
        self.state_ptr();
        self.func
            .instruction(&Instruction::I64Load16S(memarg(abi::DSP_AX_H_OFF[ax], 1)));
        self.func.instruction(&Instruction::I64Const(16));
        self.func.instruction(&Instruction::I64Shl);
        self.state_ptr();
        self.func
            .instruction(&Instruction::I64Load16U(memarg(abi::DSP_AX_L_OFF[ax], 1)));
        self.func.instruction(&Instruction::I64Or);
        self.set(slot);
    }

    /// `(s8)high << 32` plus `(mid1 + mid2) << 16 | low`.
    fn load_long_prod(&mut self, slot: ScratchSlot) {
        self.state_ptr();
        self.func
            .instruction(&Instruction::I64Load8S(memarg(abi::DSP_PROD_HIGH_OFF, 0)));
        self.func.instruction(&Instruction::I64Const(32));
        self.func.instruction(&Instruction::I64Shl);

        self.state_ptr();
        self.func
            .instruction(&Instruction::I64Load16U(memarg(abi::DSP_PROD_MID1_OFF, 1)));
        self.state_ptr();
        self.func
            .instruction(&Instruction::I64Load16U(memarg(abi::DSP_PROD_MID2_OFF, 1)));
        self.func.instruction(&Instruction::I64Add);
        self.func.instruction(&Instruction::I64Const(16));
        self.func.instruction(&Instruction::I64Shl);
        self.state_ptr();
        self.func
            .instruction(&Instruction::I64Load16U(memarg(abi::DSP_PROD_LOW_OFF, 1)));
        self.func.instruction(&Instruction::I64Or);

        self.func.instruction(&Instruction::I64Add);
        self.set(slot);
    }

    /// Sign-extend bit 39 of `slot` over the upper 24 bits.
    fn canonicalize(&mut self, slot: ScratchSlot) {
        self.get(slot);
        self.func.instruction(&Instruction::I64Const(24));
        self.func.instruction(&Instruction::I64Shl);
        self.func.instruction(&Instruction::I64Const(24));
        self.func.instruction(&Instruction::I64ShrS);
        self.set(slot);
    }

    /// Canonicalize `Res` and write it to `acc`.
    fn commit_result(&mut self, acc: Acc) {
        self.canonicalize(ScratchSlot::Res);
        self.store_acc(acc, ScratchSlot::Res);
    }

    /// `Res = Lhs + Rhs`, canonicalized.
    fn emit_add(&mut self) {
        self.get(ScratchSlot::Lhs);
        self.get(ScratchSlot::Rhs);
        self.func.instruction(&Instruction::I64Add);
        self.set(ScratchSlot::Res);
        self.canonicalize(ScratchSlot::Res);
    }

    /// `Res = Lhs - Rhs`, canonicalized; `Rhs` is negated afterwards for the overflow test.
    fn emit_sub(&mut self) {
        self.get(ScratchSlot::Lhs);
        self.get(ScratchSlot::Rhs);
        self.func.instruction(&Instruction::I64Sub);
        self.set(ScratchSlot::Res);
        self.canonicalize(ScratchSlot::Res);

        self.func.instruction(&Instruction::I64Const(0));
        self.get(ScratchSlot::Rhs);
        self.func.instruction(&Instruction::I64Sub);
        self.set(ScratchSlot::Rhs);
    }

    // ---- status register ----

    fn emit_sr_update(&mut self, rule: SrRule, lhs: u32, rhs: u32, res: u32) {
        let sr = self.layout.sr_local();

        self.state_ptr();
        self.func
            .instruction(&Instruction::I32Load16U(memarg(abi::DSP_SR_OFF, 1)));
        self.func
            .instruction(&Instruction::I32Const(i32::from(!SR_CMP_MASK)));
        self.func.instruction(&Instruction::I32And);
        if self.sticky_pending {
            let sticky = self.layout.sticky_local();
            self.func.instruction(&Instruction::LocalGet(sticky));
            self.func.instruction(&Instruction::I32Or);
            self.func.instruction(&Instruction::I32Const(0));
            self.func.instruction(&Instruction::LocalSet(sticky));
            self.sticky_pending = false;
        }
        self.func.instruction(&Instruction::LocalSet(sr));

        if let SrRule::Arith(carry) = rule {
            self.emit_or_flag(StatusFlags::CARRY, |this| {
                this.func.instruction(&Instruction::LocalGet(lhs));
                this.func.instruction(&Instruction::LocalGet(res));
                this.func.instruction(&match carry {
                    CarryRule::Carry => Instruction::I64GtU,
                    CarryRule::Carry2 => Instruction::I64GeU,
                });
            });
            self.emit_or_flag(
                StatusFlags::OVERFLOW | StatusFlags::OVERFLOW_STICKY,
                |this| this.emit_overflow_cond(lhs, rhs, res),
            );
        }

        self.emit_or_flag(StatusFlags::ARITH_ZERO, |this| {
            this.func.instruction(&Instruction::LocalGet(res));
            this.func.instruction(&Instruction::I64Eqz);
        });
        self.emit_or_flag(StatusFlags::SIGN, |this| {
            this.func.instruction(&Instruction::LocalGet(res));
            this.func.instruction(&Instruction::I64Const(0));
            this.func.instruction(&Instruction::I64LtS);
        });
        self.emit_or_flag(StatusFlags::OVER_S32, |this| {
            this.func.instruction(&Instruction::LocalGet(res));
            this.func.instruction(&Instruction::LocalGet(res));
            this.func.instruction(&Instruction::I32WrapI64);
            this.func.instruction(&Instruction::I64ExtendI32S);
            this.func.instruction(&Instruction::I64Ne);
        });
        // Bits 30 and 31 agree.
        self.emit_or_flag(StatusFlags::TOP2BITS, |this| {
            this.func.instruction(&Instruction::LocalGet(res));
            this.func.instruction(&Instruction::I64Const(30));
            this.func.instruction(&Instruction::I64ShrU);
            this.func.instruction(&Instruction::LocalGet(res));
            this.func.instruction(&Instruction::I64Const(31));
            this.func.instruction(&Instruction::I64ShrU);
            this.func.instruction(&Instruction::I64Xor);
            this.func.instruction(&Instruction::I64Const(1));
            this.func.instruction(&Instruction::I64And);
            this.func.instruction(&Instruction::I64Eqz);
        });

        self.state_ptr();
        self.func.instruction(&Instruction::LocalGet(sr));
        self.func
            .instruction(&Instruction::I32Store16(memarg(abi::DSP_SR_OFF, 1)));
    }

    /// `((lhs ^ res) & (rhs ^ res)) < 0`
    fn emit_overflow_cond(&mut self, lhs: u32, rhs: u32, res: u32) {
        self.func.instruction(&Instruction::LocalGet(lhs));
        self.func.instruction(&Instruction::LocalGet(res));
        self.func.instruction(&Instruction::I64Xor);
        self.func.instruction(&Instruction::LocalGet(rhs));
        self.func.instruction(&Instruction::LocalGet(res));
        self.func.instruction(&Instruction::I64Xor);
        self.func.instruction(&Instruction::I64And);
        self.func.instruction(&Instruction::I64Const(0));
        self.func.instruction(&Instruction::I64LtS);
    }

    /// `sr |= cond ? mask : 0`, where `emit_cond` leaves an i32 0/1 on the stack.
    fn emit_or_flag(&mut self, mask: StatusFlags, emit_cond: impl FnOnce(&mut Self)) {
        let sr = self.layout.sr_local();
        self.or_flag_into(sr, mask, emit_cond);
    }

    fn or_flag_into(&mut self, dst: u32, mask: StatusFlags, emit_cond: impl FnOnce(&mut Self)) {
        self.func.instruction(&Instruction::LocalGet(dst));
        emit_cond(self);
        if mask.bits() != 1 {
            self.func
                .instruction(&Instruction::I32Const(i32::from(mask.bits())));
            self.func.instruction(&Instruction::I32Mul);
        }
        self.func.instruction(&Instruction::I32Or);
        self.func.instruction(&Instruction::LocalSet(dst));
    }
}

fn memarg(offset: u32, align: u32) -> MemArg {
    MemArg {
        offset: u64::from(offset),
        align,
        memory_index: 0,
    }
}
