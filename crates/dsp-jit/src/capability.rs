//! Per-opcode emission capability.

use dsp_core::ArithOp;

/// Whether an instruction may be emitted natively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Native,
    /// No native handler exists; the interpreter always runs it.
    InterpreterOnly,
    /// A native handler existed but is known to miscompile. Never emitted, on any host.
    DisabledPendingFix { reason: &'static str },
}

impl Capability {
    #[inline]
    pub const fn is_native(self) -> bool {
        matches!(self, Capability::Native)
    }
}

pub const fn capability(op: ArithOp) -> Capability {
    match op {
        ArithOp::Clr
        | ArithOp::Tst
        | ArithOp::Cmp
        | ArithOp::Cmpar
        | ArithOp::Cmpi
        | ArithOp::Cmpis
        | ArithOp::Addr
        | ArithOp::Addax
        | ArithOp::Add
        | ArithOp::Addp
        | ArithOp::Addi
        | ArithOp::Addis
        | ArithOp::Incm
        | ArithOp::Inc
        | ArithOp::Subr
        | ArithOp::Subax
        | ArithOp::Sub
        | ArithOp::Subp
        | ArithOp::Decm
        | ArithOp::Dec
        | ArithOp::Neg
        | ArithOp::Abs
        | ArithOp::Movr
        | ArithOp::Movax
        | ArithOp::Mov
        | ArithOp::Lsr16
        | ArithOp::Asr16
        | ArithOp::Lsl
        | ArithOp::Asl => Capability::Native,
        ArithOp::Lsl16 => Capability::DisabledPendingFix {
            reason: "native lsl16 corrupts audio in Twilight Princess (Wii); root cause unknown",
        },
        ArithOp::Clrl
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
        | ArithOp::Asrnr => Capability::InterpreterOnly,
    }
}
