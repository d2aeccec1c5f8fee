//! Encodings of the arithmetic/logic instruction group.
//!
//! Matching is a linear mask/value scan; the group is small enough that no lookup table is built.

/// Every instruction in the arithmetic group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Clr,
    Clrl,
    Andcf,
    Andf,
    Tst,
    Tstaxh,
    Cmp,
    Cmpar,
    Cmpi,
    Cmpis,
    Xorr,
    Andr,
    Orr,
    Andc,
    Orc,
    Xorc,
    Not,
    Xori,
    Andi,
    Ori,
    Addr,
    Addax,
    Add,
    Addp,
    Addaxl,
    Addi,
    Addis,
    Incm,
    Inc,
    Subr,
    Subax,
    Sub,
    Subp,
    Decm,
    Dec,
    Neg,
    Abs,
    Movr,
    Movax,
    Mov,
    Lsl16,
    Lsr16,
    Asr16,
    Lsl,
    Lsr,
    Asl,
    Asr,
    Lsrn,
    Asrn,
    Lsrnrx,
    Asrnrx,
    Lsrnr,
    Asrnr,
}

/// How an instruction touches the status register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SrEffect {
    /// Rewrites the carry/overflow/zero/sign group.
    Full,
    /// Only sets or clears the logic-zero bit.
    LogicZero,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpInfo {
    pub op: ArithOp,
    pub name: &'static str,
    pub mask: u16,
    pub value: u16,
    /// Instruction length in 16-bit words; two-word forms carry an immediate at `pc + 1`.
    pub size: u16,
    pub sr: SrEffect,
}

impl OpInfo {
    #[inline]
    pub const fn matches(&self, opcode: u16) -> bool {
        opcode & self.mask == self.value
    }
}

const fn op(op: ArithOp, name: &'static str, mask: u16, value: u16, size: u16) -> OpInfo {
    OpInfo {
        op,
        name,
        mask,
        value,
        size,
        sr: SrEffect::Full,
    }
}

const fn lz(op: ArithOp, name: &'static str, mask: u16, value: u16, size: u16) -> OpInfo {
    OpInfo {
        op,
        name,
        mask,
        value,
        size,
        sr: SrEffect::LogicZero,
    }
}

pub const ARITH_OPCODES: &[OpInfo] = &[
    op(ArithOp::Clr, "clr", 0xF700, 0x8100, 1),
    op(ArithOp::Clrl, "clrl", 0xFE00, 0xFC00, 1),
    lz(ArithOp::Andcf, "andcf", 0xFEFF, 0x02C0, 2),
    lz(ArithOp::Andf, "andf", 0xFEFF, 0x02A0, 2),
    op(ArithOp::Tst, "tst", 0xF700, 0xB100, 1),
    op(ArithOp::Tstaxh, "tstaxh", 0xFE00, 0x8600, 1),
    op(ArithOp::Cmp, "cmp", 0xFF00, 0x8200, 1),
    op(ArithOp::Cmpar, "cmpar", 0xE700, 0xC100, 1),
    op(ArithOp::Cmpi, "cmpi", 0xFEFF, 0x0280, 2),
    op(ArithOp::Cmpis, "cmpis", 0xFE00, 0x0600, 1),
    op(ArithOp::Xorr, "xorr", 0xFC80, 0x3000, 1),
    op(ArithOp::Andr, "andr", 0xFC80, 0x3400, 1),
    op(ArithOp::Orr, "orr", 0xFC80, 0x3800, 1),
    op(ArithOp::Andc, "andc", 0xFE80, 0x3C00, 1),
    op(ArithOp::Orc, "orc", 0xFE80, 0x3E00, 1),
    op(ArithOp::Xorc, "xorc", 0xFE80, 0x3080, 1),
    op(ArithOp::Not, "not", 0xFE80, 0x3280, 1),
    op(ArithOp::Xori, "xori", 0xFEFF, 0x0220, 2),
    op(ArithOp::Andi, "andi", 0xFEFF, 0x0240, 2),
    op(ArithOp::Ori, "ori", 0xFEFF, 0x0260, 2),
    op(ArithOp::Addr, "addr", 0xF800, 0x4000, 1),
    op(ArithOp::Addax, "addax", 0xFC00, 0x4800, 1),
    op(ArithOp::Add, "add", 0xFE00, 0x4C00, 1),
    op(ArithOp::Addp, "addp", 0xFE00, 0x4E00, 1),
    op(ArithOp::Addaxl, "addaxl", 0xFC00, 0x7000, 1),
    op(ArithOp::Addi, "addi", 0xFEFF, 0x0200, 2),
    op(ArithOp::Addis, "addis", 0xFE00, 0x0400, 1),
    op(ArithOp::Incm, "incm", 0xFE00, 0x7400, 1),
    op(ArithOp::Inc, "inc", 0xFE00, 0x7600, 1),
    op(ArithOp::Subr, "subr", 0xF800, 0x5000, 1),
    op(ArithOp::Subax, "subax", 0xFC00, 0x5800, 1),
    op(ArithOp::Sub, "sub", 0xFE00, 0x5C00, 1),
    op(ArithOp::Subp, "subp", 0xFE00, 0x5E00, 1),
    op(ArithOp::Decm, "decm", 0xFE00, 0x7800, 1),
    op(ArithOp::Dec, "dec", 0xFE00, 0x7A00, 1),
    op(ArithOp::Neg, "neg", 0xFE00, 0x7C00, 1),
    op(ArithOp::Abs, "abs", 0xF700, 0xA100, 1),
    op(ArithOp::Movr, "movr", 0xF800, 0x6000, 1),
    op(ArithOp::Movax, "movax", 0xFC00, 0x6800, 1),
    op(ArithOp::Mov, "mov", 0xFE00, 0x6C00, 1),
    op(ArithOp::Lsl16, "lsl16", 0xFE00, 0xF000, 1),
    op(ArithOp::Lsr16, "lsr16", 0xFE00, 0xF400, 1),
    op(ArithOp::Asr16, "asr16", 0xF700, 0x9100, 1),
    op(ArithOp::Lsl, "lsl", 0xFEC0, 0x1400, 1),
    op(ArithOp::Lsr, "lsr", 0xFEC0, 0x1440, 1),
    op(ArithOp::Asl, "asl", 0xFEC0, 0x1480, 1),
    op(ArithOp::Asr, "asr", 0xFEC0, 0x14C0, 1),
    op(ArithOp::Lsrn, "lsrn", 0xFFFF, 0x02CA, 1),
    op(ArithOp::Asrn, "asrn", 0xFFFF, 0x02CB, 1),
    op(ArithOp::Lsrnrx, "lsrnrx", 0xFC80, 0x3480, 1),
    op(ArithOp::Asrnrx, "asrnrx", 0xFC80, 0x3880, 1),
    op(ArithOp::Lsrnr, "lsrnr", 0xFE80, 0x3C80, 1),
    op(ArithOp::Asrnr, "asrnr", 0xFE80, 0x3E80, 1),
];

/// Find the arithmetic-group entry for `opcode`, if any.
pub fn decode(opcode: u16) -> Option<&'static OpInfo> {
    ARITH_OPCODES.iter().find(|info| info.matches(opcode))
}

/// Table entry for a known op.
pub fn info(op: ArithOp) -> &'static OpInfo {
    ARITH_OPCODES
        .iter()
        .find(|info| info.op == op)
        .unwrap_or_else(|| unreachable!("{op:?} missing from ARITH_OPCODES"))
}
