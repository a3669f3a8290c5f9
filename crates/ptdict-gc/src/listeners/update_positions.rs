//! Pass 4: rewrite stale source positions in the compacted buffer

use ptdict::{DictPos, ExtendableBuffer, PtNode, TraversingEventListener, bigram, writing};

use crate::error::{GcError, ReferenceKind};
use crate::relocation::{DestPos, DictPositionRelocationMap, SourcePos};

/// Translates parent, children and bigram target fields of every PtNode in
/// the destination buffer through the relocation map
pub struct UpdateAllPositionFields<'a> {
    buffer: &'a mut ExtendableBuffer,
    relocation_map: &'a DictPositionRelocationMap,
    relocated_count: usize,
}

impl<'a> UpdateAllPositionFields<'a> {
    /// Create the pass over the destination buffer
    pub fn new(
        buffer: &'a mut ExtendableBuffer,
        relocation_map: &'a DictPositionRelocationMap,
    ) -> Self {
        Self {
            buffer,
            relocation_map,
            relocated_count: 0,
        }
    }

    /// Position fields rewritten so far
    pub fn relocated_count(&self) -> usize {
        self.relocated_count
    }
}

impl TraversingEventListener for UpdateAllPositionFields<'_> {
    type Error = GcError;

    fn traversed_buffer(&self) -> &ExtendableBuffer {
        self.buffer
    }

    fn on_ascend(&mut self) -> Result<(), GcError> {
        Ok(())
    }

    fn on_descend(&mut self, _pt_node_array_pos: DictPos) -> Result<(), GcError> {
        Ok(())
    }

    fn on_reading_pt_node_array_tail(&mut self) -> Result<(), GcError> {
        Ok(())
    }

    fn on_visiting_pt_node(
        &mut self,
        node: &PtNode,
        _node_code_points: &[u32],
    ) -> Result<(), GcError> {
        let map = self.relocation_map;

        if let Some(parent_pos) = node.parent_pos() {
            let new_parent = map.relocate_pt_node(ReferenceKind::Parent, SourcePos::new(parent_pos))?;
            writing::update_parent_pos(self.buffer, node, Some(new_parent.get()))?;
            self.relocated_count += 1;
        }

        if let Some(children_pos) = node.children_pos() {
            let new_children = map.relocate_pt_node_array(SourcePos::new(children_pos))?;
            writing::update_children_pos(self.buffer, node, new_children.map(DestPos::get))?;
            self.relocated_count += 1;
        }

        if node.bigrams_pos().is_some() {
            self.relocated_count += bigram::update_all_bigram_target_pt_node_positions(
                self.buffer,
                node.bigrams_pos(),
                |target| {
                    map.relocate_pt_node(ReferenceKind::BigramTarget, SourcePos::new(target))
                        .map(DestPos::get)
                },
            )?;
        }
        Ok(())
    }
}
