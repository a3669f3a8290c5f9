//! Old-to-new position mapping built during compaction

use ptdict::DictPos;
use rustc_hash::FxHashMap;

use crate::error::{GcError, ReferenceKind, Result};

/// Position in the pre-compaction buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SourcePos(DictPos);

impl SourcePos {
    /// Tag a position read from the source buffer, or a stale one copied
    /// verbatim into the destination
    #[inline]
    pub const fn new(pos: DictPos) -> Self {
        Self(pos)
    }

    /// Untagged position
    #[inline]
    pub const fn get(self) -> DictPos {
        self.0
    }
}

/// Position in the compacted buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct DestPos(DictPos);

impl DestPos {
    /// Tag a position of the destination buffer
    #[inline]
    pub const fn new(pos: DictPos) -> Self {
        Self(pos)
    }

    /// Untagged position
    #[inline]
    pub const fn get(self) -> DictPos {
        self.0
    }
}

/// Relocation tables for PtNodes and PtNode arrays
///
/// Only records that were written to the destination buffer have a PtNode
/// entry. A PtNode array entry of `None` means the array was left out because
/// none of its nodes survived.
#[derive(Debug, Default)]
pub struct DictPositionRelocationMap {
    pt_nodes: FxHashMap<SourcePos, DestPos>,
    pt_node_arrays: FxHashMap<SourcePos, Option<DestPos>>,
}

impl DictPositionRelocationMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where a PtNode was written
    pub fn insert_pt_node(&mut self, old: SourcePos, new: DestPos) {
        self.pt_nodes.insert(old, new);
    }

    /// Record where a PtNode array was written, or that it was elided
    pub fn insert_pt_node_array(&mut self, old: SourcePos, new: Option<DestPos>) {
        self.pt_node_arrays.insert(old, new);
    }

    /// New position of a PtNode
    pub fn pt_node(&self, old: SourcePos) -> Option<DestPos> {
        self.pt_nodes.get(&old).copied()
    }

    /// New position of a PtNode array; `Some(None)` if it was elided
    pub fn pt_node_array(&self, old: SourcePos) -> Option<Option<DestPos>> {
        self.pt_node_arrays.get(&old).copied()
    }

    /// Translate a PtNode reference, failing if it was not written
    pub fn relocate_pt_node(&self, kind: ReferenceKind, old: SourcePos) -> Result<DestPos> {
        self.pt_node(old).ok_or(GcError::DanglingReference {
            kind,
            pos: old.get(),
        })
    }

    /// Translate a children reference, failing if the array was never placed
    pub fn relocate_pt_node_array(&self, old: SourcePos) -> Result<Option<DestPos>> {
        self.pt_node_array(old).ok_or(GcError::DanglingReference {
            kind: ReferenceKind::Children,
            pos: old.get(),
        })
    }

    /// Number of PtNodes written
    pub fn pt_node_count(&self) -> usize {
        self.pt_nodes.len()
    }

    /// Number of PtNode arrays placed or elided
    pub fn pt_node_array_count(&self) -> usize {
        self.pt_node_arrays.len()
    }

    /// Iterate over PtNode entries
    pub fn pt_nodes(&self) -> impl Iterator<Item = (SourcePos, DestPos)> + '_ {
        self.pt_nodes.iter().map(|(&old, &new)| (old, new))
    }
}
