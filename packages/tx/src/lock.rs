//! Path locks and their collision rules.

use burrow_disk_store::LockSignal;
use burrow_path::Fp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Reading a single path's payload or listing.
    NodeRead,
    /// Writing a single path's payload.
    NodeWrite,
    /// Anything at all within a subtree, the root included.
    SubtreeWrite,
}

/// A lock held (or requested) by a locked operation.
#[derive(Debug, Clone)]
pub struct Lock {
    pub kind: LockKind,
    pub fp: Fp,
    pub signal: LockSignal,
}

impl Lock {
    pub fn new(kind: LockKind, fp: Fp) -> Self {
        Self::with_signal(kind, fp, LockSignal::new())
    }

    pub fn with_signal(kind: LockKind, fp: Fp, signal: LockSignal) -> Self {
        Self { kind, fp, signal }
    }

    pub fn is_released(&self) -> bool {
        self.signal.is_fired()
    }

    /// Whether this lock and `other` may not be held at the same time. Symmetric.
    pub fn collides_with(&self, other: &Lock) -> bool {
        use LockKind::*;

        match (self.kind, other.kind) {
            (NodeRead, NodeRead) => false,
            (NodeRead | NodeWrite, NodeRead | NodeWrite) => self.fp == other.fp,
            (SubtreeWrite, SubtreeWrite) => {
                self.fp.contains(&other.fp) || other.fp.contains(&self.fp)
            }
            (SubtreeWrite, _) => self.fp.contains(&other.fp),
            (_, SubtreeWrite) => other.fp.contains(&self.fp),
        }
    }
}
