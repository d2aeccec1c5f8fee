//! Bookkeeping for accumulator results whose SR update was skipped during emission.
//!
//! The log only records *which* update is outstanding. The operand and result values themselves
//! are parked in per-accumulator WASM locals by the emitter, so committing an entry emits the SR
//! computation from those locals.

use dsp_core::Acc;

use crate::emitter::SrRule;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingWriteBack {
    pub acc: Acc,
    pub rule: SrRule,
    seq: u32,
}

/// At most one outstanding entry per accumulator. Scoped to a single block.
#[derive(Clone, Debug, Default)]
pub struct WriteBackLog {
    entries: [Option<PendingWriteBack>; 2],
    next_seq: u32,
}

impl WriteBackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deferred SR update for `acc`, returning the entry it supersedes.
    pub fn queue(&mut self, acc: Acc, rule: SrRule) -> Option<PendingWriteBack> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries[acc.index()].replace(PendingWriteBack { acc, rule, seq })
    }

    pub fn pending(&self, acc: Acc) -> Option<&PendingWriteBack> {
        self.entries[acc.index()].as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }

    /// Remove every entry and return the most recently queued one.
    ///
    /// SR only ever reflects the last producer, so older entries are dropped without being
    /// committed.
    pub fn take_newest(&mut self) -> Option<PendingWriteBack> {
        let newest = self.entries.iter().flatten().max_by_key(|e| e.seq).copied();
        self.entries = [None, None];
        newest
    }

    /// Discard all entries without committing them. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.iter().flatten().count();
        self.entries = [None, None];
        dropped
    }
}
