//! Pass 3: copy live PtNodes into a fresh, densely packed buffer

use ptdict::{
    DictPos, ExtendableBuffer, PtNode, PtNodeParams, TraversingEventListener, bigram, writing,
};

use ptdict::node::{FORWARD_LINK_FIELD_SIZE, MAX_PT_NODE_ARRAY_SIZE};

use crate::error::GcError;
use crate::relocation::{DestPos, DictPositionRelocationMap, SourcePos};

/// Writes every non-deleted PtNode of each array as one contiguous segment
///
/// An array holding more live nodes than one size field can count is written
/// as a run of full segments, each forward-linked to the one right after it.
/// Parent and children fields are copied verbatim and still hold source
/// positions afterwards. Bigram chains are copied right after the array that
/// owns them, so their heads already point into the destination.
pub struct PlaceAndWriteValidPtNodes<'a> {
    source: &'a ExtendableBuffer,
    dest: &'a mut ExtendableBuffer,
    relocation_map: &'a mut DictPositionRelocationMap,
    root_pos: DictPos,
    elide_empty_arrays: bool,
    current_array: Option<(SourcePos, DictPos)>,
    segment_size_field_pos: DictPos,
    segment_node_count: usize,
    valid_pt_node_count: usize,
    pending_bigrams: Vec<(DictPos, DictPos)>,
    written_pt_nodes: usize,
    written_arrays: usize,
    elided_arrays: usize,
    skipped_pt_nodes: usize,
}

impl<'a> PlaceAndWriteValidPtNodes<'a> {
    /// Create the pass copying from `source` into `dest`
    pub fn new(
        source: &'a ExtendableBuffer,
        dest: &'a mut ExtendableBuffer,
        relocation_map: &'a mut DictPositionRelocationMap,
        root_pos: DictPos,
    ) -> Self {
        Self {
            source,
            dest,
            relocation_map,
            root_pos,
            elide_empty_arrays: true,
            current_array: None,
            segment_size_field_pos: DictPos::ZERO,
            segment_node_count: 0,
            valid_pt_node_count: 0,
            pending_bigrams: Vec::new(),
            written_pt_nodes: 0,
            written_arrays: 0,
            elided_arrays: 0,
            skipped_pt_nodes: 0,
        }
    }

    /// Set whether non-root arrays whose nodes were all deleted are left out
    /// instead of written with size zero
    pub fn with_elide_empty_arrays(mut self, elide: bool) -> Self {
        self.elide_empty_arrays = elide;
        self
    }

    /// PtNodes copied
    pub fn written_pt_nodes(&self) -> usize {
        self.written_pt_nodes
    }

    /// PtNode arrays written
    pub fn written_arrays(&self) -> usize {
        self.written_arrays
    }

    /// Empty PtNode arrays left out
    pub fn elided_arrays(&self) -> usize {
        self.elided_arrays
    }

    /// Deleted PtNodes skipped
    pub fn skipped_pt_nodes(&self) -> usize {
        self.skipped_pt_nodes
    }

    /// Close the full segment being written and open the next one after its
    /// forward link
    fn start_next_segment(&mut self) -> Result<(), GcError> {
        let mut pos = self.segment_size_field_pos;
        writing::write_pt_node_array_size_and_advance(self.dest, self.segment_node_count, &mut pos)?;
        let mut link_pos = self.dest.tail_position()?;
        let next_segment = link_pos.advance(FORWARD_LINK_FIELD_SIZE)?;
        writing::write_forward_link_and_advance(self.dest, Some(next_segment), &mut link_pos)?;
        let mut pos = next_segment;
        writing::write_pt_node_array_size_and_advance(self.dest, 0, &mut pos)?;
        self.segment_size_field_pos = next_segment;
        self.segment_node_count = 0;
        Ok(())
    }

    fn copy_pending_bigrams(&mut self) -> Result<(), GcError> {
        for (node_pos, head) in self.pending_bigrams.drain(..) {
            let new_head = bigram::copy_chain(self.source, Some(head), self.dest)?;
            let node = PtNode::read(self.dest, node_pos)?;
            writing::update_bigrams_pos(self.dest, &node, new_head)?;
        }
        Ok(())
    }
}

impl TraversingEventListener for PlaceAndWriteValidPtNodes<'_> {
    type Error = GcError;

    fn traversed_buffer(&self) -> &ExtendableBuffer {
        self.source
    }

    fn on_ascend(&mut self) -> Result<(), GcError> {
        Ok(())
    }

    fn on_descend(&mut self, pt_node_array_pos: DictPos) -> Result<(), GcError> {
        let size_field_pos = self.dest.tail_position()?;
        let mut pos = size_field_pos;
        writing::write_pt_node_array_size_and_advance(self.dest, 0, &mut pos)?;
        self.current_array = Some((SourcePos::new(pt_node_array_pos), size_field_pos));
        self.segment_size_field_pos = size_field_pos;
        self.segment_node_count = 0;
        self.valid_pt_node_count = 0;
        Ok(())
    }

    fn on_reading_pt_node_array_tail(&mut self) -> Result<(), GcError> {
        let (array_pos, size_field_pos) = self
            .current_array
            .take()
            .ok_or(GcError::UnbalancedTraversal)?;

        if self.valid_pt_node_count == 0
            && self.elide_empty_arrays
            && array_pos.get() != self.root_pos
        {
            self.dest.truncate(size_field_pos);
            self.relocation_map.insert_pt_node_array(array_pos, None);
            self.elided_arrays += 1;
            return Ok(());
        }

        let mut pos = self.dest.tail_position()?;
        writing::write_forward_link_and_advance(self.dest, None, &mut pos)?;
        let mut pos = self.segment_size_field_pos;
        writing::write_pt_node_array_size_and_advance(self.dest, self.segment_node_count, &mut pos)?;
        self.relocation_map
            .insert_pt_node_array(array_pos, Some(DestPos::new(size_field_pos)));
        self.written_arrays += 1;
        self.copy_pending_bigrams()
    }

    fn on_visiting_pt_node(
        &mut self,
        node: &PtNode,
        node_code_points: &[u32],
    ) -> Result<(), GcError> {
        if node.is_deleted() {
            self.skipped_pt_nodes += 1;
            return Ok(());
        }
        if self.segment_node_count == MAX_PT_NODE_ARRAY_SIZE {
            self.start_next_segment()?;
        }
        let new_pos = self.dest.tail_position()?;
        let params = PtNodeParams {
            code_points: node_code_points.to_vec(),
            bigrams_pos: None,
            ..PtNodeParams::from_node(node)
        };
        let mut pos = new_pos;
        writing::write_pt_node_and_advance(self.dest, &params, &mut pos)?;
        self.relocation_map
            .insert_pt_node(SourcePos::new(node.head_pos()), DestPos::new(new_pos));
        if let Some(head) = node.bigrams_pos() {
            self.pending_bigrams.push((new_pos, head));
        }
        self.segment_node_count += 1;
        self.valid_pt_node_count += 1;
        self.written_pt_nodes += 1;
        Ok(())
    }
}
