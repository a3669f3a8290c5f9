//! Pass 2: drop bigram entries whose target is no longer a word

use ptdict::{DictPos, ExtendableBuffer, PtNode, TraversingEventListener, bigram, writing};

use crate::error::GcError;

/// Unlinks useless entries from the bigram chain of every live PtNode
pub struct PruneUselessBigrams<'a> {
    buffer: &'a mut ExtendableBuffer,
    pruned_count: usize,
}

impl<'a> PruneUselessBigrams<'a> {
    /// Create the pass over the buffer it will mutate
    pub fn new(buffer: &'a mut ExtendableBuffer) -> Self {
        Self {
            buffer,
            pruned_count: 0,
        }
    }

    /// Bigram entries unlinked so far
    pub fn pruned_count(&self) -> usize {
        self.pruned_count
    }
}

impl TraversingEventListener for PruneUselessBigrams<'_> {
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
        if node.is_deleted() || node.bigrams_pos().is_none() {
            return Ok(());
        }
        let mut head = node.bigrams_pos();
        self.pruned_count +=
            bigram::update_all_bigram_entries_and_delete_useless_entries(self.buffer, &mut head)?;
        if head != node.bigrams_pos() {
            writing::update_bigrams_pos(self.buffer, node, head)?;
        }
        Ok(())
    }
}
