//! Consistency check for compacted buffers
//!
//! A freshly compacted buffer must satisfy stronger properties than an
//! arbitrary dictionary buffer:
//!
//! - every PtNode array is a single segment whose size field matches its
//!   node records, unless it is too large for one size field, in which case
//!   it is a run of full segments each linked to the next one in line
//! - no PtNode is deleted, and every PtNode without a valid probability has
//!   children
//! - every parent field points at the PtNode owning the enclosing array
//! - every bigram target is a PtNode with a valid probability reachable from
//!   the root

use ptdict::traversal::traverse_all_pt_nodes_in_pt_node_array_level_preorder_depth_first;
use ptdict::node::{MAX_PT_NODE_ARRAY_SIZE, PT_NODE_ARRAY_SIZE_FIELD_SIZE};
use ptdict::{DictPos, ExtendableBuffer, PtNode, TraversingEventListener, bigram};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::error::{GcError, Result};

/// Counts gathered while verifying
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// PtNodes reached
    pub pt_nodes: usize,
    /// PtNode arrays reached
    pub pt_node_arrays: usize,
    /// Bigram entries checked
    pub bigram_entries: usize,
}

/// Verify the compacted trie rooted at `root_pos`
pub fn verify_compacted_dictionary(
    buffer: &ExtendableBuffer,
    root_pos: DictPos,
) -> Result<VerificationReport> {
    let mut verifier = CompactedTrieVerifier::new(buffer);
    traverse_all_pt_nodes_in_pt_node_array_level_preorder_depth_first(&mut verifier, root_pos)?;
    verifier.check_bigram_targets()?;
    Ok(verifier.report)
}

fn fail<T>(message: String) -> Result<T> {
    Err(GcError::VerificationFailed(message))
}

struct CompactedTrieVerifier<'a> {
    buffer: &'a ExtendableBuffer,
    /// Owning PtNode of each children array seen so far
    owners: FxHashMap<DictPos, DictPos>,
    /// Expected parent field of the nodes in each open array
    parent_stack: Vec<Option<DictPos>>,
    declared_size: usize,
    visited_in_array: usize,
    pt_nodes: FxHashSet<DictPos>,
    bigram_targets: Vec<(DictPos, DictPos)>,
    report: VerificationReport,
}

impl<'a> CompactedTrieVerifier<'a> {
    fn new(buffer: &'a ExtendableBuffer) -> Self {
        Self {
            buffer,
            owners: FxHashMap::default(),
            parent_stack: Vec::new(),
            declared_size: 0,
            visited_in_array: 0,
            pt_nodes: FxHashSet::default(),
            bigram_targets: Vec::new(),
            report: VerificationReport::default(),
        }
    }

    /// Walk the segments of the array at `array_pos` and return its node
    /// count
    ///
    /// Only a segment filled to the size field's limit may continue, and only
    /// into the segment written right after its forward link.
    fn count_nodes_in_segments(&self, array_pos: DictPos) -> Result<usize> {
        let mut segment_pos = array_pos;
        let mut total = 0;
        loop {
            let size = self
                .buffer
                .read_uint(segment_pos, PT_NODE_ARRAY_SIZE_FIELD_SIZE)? as usize;
            let mut pos = segment_pos.advance(PT_NODE_ARRAY_SIZE_FIELD_SIZE)?;
            for _ in 0..size {
                pos = PtNode::read(self.buffer, pos)?.end_pos();
            }
            total += size;
            let link_field_pos = pos;
            let Some(next) = self.buffer.read_pos_and_advance(&mut pos)? else {
                return Ok(total);
            };
            if size != MAX_PT_NODE_ARRAY_SIZE || next != pos {
                return fail(format!(
                    "PtNode array at {array_pos} continues from {link_field_pos} in a segment at {next}"
                ));
            }
            segment_pos = next;
        }
    }

    fn check_bigram_targets(&self) -> Result<()> {
        for &(entry_pos, target_pos) in &self.bigram_targets {
            if !self.pt_nodes.contains(&target_pos) {
                return fail(format!(
                    "Bigram entry at {entry_pos} targets {target_pos}, which is not a reachable PtNode"
                ));
            }
            if !PtNode::read(self.buffer, target_pos)?.has_valid_probability() {
                return fail(format!(
                    "Bigram entry at {entry_pos} targets {target_pos}, which is not a word"
                ));
            }
        }
        Ok(())
    }
}

impl TraversingEventListener for CompactedTrieVerifier<'_> {
    type Error = GcError;

    fn traversed_buffer(&self) -> &ExtendableBuffer {
        self.buffer
    }

    fn on_ascend(&mut self) -> Result<()> {
        self.parent_stack
            .pop()
            .map(|_| ())
            .ok_or(GcError::UnbalancedTraversal)
    }

    fn on_descend(&mut self, pt_node_array_pos: DictPos) -> Result<()> {
        let expected_parent = if self.parent_stack.is_empty() {
            None
        } else {
            match self.owners.get(&pt_node_array_pos) {
                Some(&owner) => Some(owner),
                None => {
                    return fail(format!(
                        "PtNode array at {pt_node_array_pos} has no owning PtNode"
                    ));
                }
            }
        };
        let size = self.count_nodes_in_segments(pt_node_array_pos)?;

        self.parent_stack.push(expected_parent);
        self.declared_size = size;
        self.visited_in_array = 0;
        self.report.pt_node_arrays += 1;
        Ok(())
    }

    fn on_reading_pt_node_array_tail(&mut self) -> Result<()> {
        if self.visited_in_array != self.declared_size {
            return fail(format!(
                "PtNode array declares {} nodes but holds {}",
                self.declared_size, self.visited_in_array
            ));
        }
        Ok(())
    }

    fn on_visiting_pt_node(&mut self, node: &PtNode, _node_code_points: &[u32]) -> Result<()> {
        let pos = node.head_pos();
        if node.is_deleted() {
            return fail(format!("Deleted PtNode at {pos} survived compaction"));
        }
        if !node.has_valid_probability() && node.children_pos().is_none() {
            return fail(format!("Useless PtNode at {pos} survived compaction"));
        }
        let expected_parent = self
            .parent_stack
            .last()
            .copied()
            .ok_or(GcError::UnbalancedTraversal)?;
        if node.parent_pos() != expected_parent {
            return fail(format!(
                "PtNode at {pos} has parent {:?}, expected {:?}",
                node.parent_pos(),
                expected_parent
            ));
        }
        if let Some(children_pos) = node.children_pos() {
            if let Some(other) = self.owners.insert(children_pos, pos) {
                return fail(format!(
                    "PtNode array at {children_pos} is shared by {other} and {pos}"
                ));
            }
        }
        for entry in bigram::read_entries(self.buffer, node.bigrams_pos())? {
            let Some(target_pos) = entry.target_pos else {
                return fail(format!("Bigram entry at {} has no target", entry.pos));
            };
            self.bigram_targets.push((entry.pos, target_pos));
            self.report.bigram_entries += 1;
        }

        self.pt_nodes.insert(pos);
        self.visited_in_array += 1;
        self.report.pt_nodes += 1;
        Ok(())
    }
}
