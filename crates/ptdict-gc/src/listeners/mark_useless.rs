//! Pass 1: mark PtNodes that carry no word and lead to no word as deleted

use ptdict::{DictPos, ExtendableBuffer, PtNode, TraversingEventListener, writing};

use crate::error::GcError;

/// Bottom-up usefulness fold over a post-order walk
///
/// One counter per open PtNode array sits on `value_stack`; it counts the
/// useful nodes seen so far in that array. When an array is left its count
/// moves into `children_value`, where the owning node's visit picks it up.
/// A node is useful iff it has a valid probability or `children_value > 0`.
pub struct MarkUselessPtNodesAsDeleted<'a> {
    buffer: &'a mut ExtendableBuffer,
    value_stack: Vec<usize>,
    children_value: usize,
    marked_count: usize,
    useful_count: usize,
}

impl<'a> MarkUselessPtNodesAsDeleted<'a> {
    /// Create the pass over the buffer it will mutate
    pub fn new(buffer: &'a mut ExtendableBuffer) -> Self {
        Self {
            buffer,
            value_stack: Vec::new(),
            children_value: 0,
            marked_count: 0,
            useful_count: 0,
        }
    }

    /// Nodes marked deleted by this pass
    pub fn marked_count(&self) -> usize {
        self.marked_count
    }

    /// Nodes found useful
    pub fn useful_count(&self) -> usize {
        self.useful_count
    }
}

impl TraversingEventListener for MarkUselessPtNodesAsDeleted<'_> {
    type Error = GcError;

    fn traversed_buffer(&self) -> &ExtendableBuffer {
        self.buffer
    }

    fn on_ascend(&mut self) -> Result<(), GcError> {
        self.children_value = self
            .value_stack
            .pop()
            .ok_or(GcError::UnbalancedTraversal)?;
        Ok(())
    }

    fn on_descend(&mut self, _pt_node_array_pos: DictPos) -> Result<(), GcError> {
        self.value_stack.push(0);
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
        let children_value = std::mem::take(&mut self.children_value);
        if node.is_deleted() {
            return Ok(());
        }
        if !node.has_valid_probability() && children_value == 0 {
            writing::mark_pt_node_as_deleted(self.buffer, node)?;
            self.marked_count += 1;
        } else {
            *self
                .value_stack
                .last_mut()
                .ok_or(GcError::UnbalancedTraversal)? += 1;
            self.useful_count += 1;
        }
        Ok(())
    }
}
