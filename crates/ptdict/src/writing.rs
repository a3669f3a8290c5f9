//! Low-level PtNode and PtNode array writers
//!
//! Whole records are only ever appended. Edits after the fact are limited to
//! fixed-width fields (flags, probability, positions), which keeps every
//! record's size stable and lets them be rewritten in place.

use crate::MAX_WORD_LENGTH;
use crate::buffer::ExtendableBuffer;
use crate::error::{DictError, Result};
use crate::node::{
    CODE_POINT_COUNT_FIELD_SIZE, CODE_POINT_FIELD_SIZE, FORWARD_LINK_FIELD_SIZE, MAX_CODE_POINT,
    MAX_PT_NODE_ARRAY_SIZE, NODE_FLAGS_FIELD_SIZE, PROBABILITY_FIELD_SIZE,
    PT_NODE_ARRAY_SIZE_FIELD_SIZE, PtNode, PtNodeArrayCursor, flags,
};
use crate::pos::DictPos;

/// Contents of a PtNode about to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtNodeParams {
    /// Parent PtNode
    pub parent_pos: Option<DictPos>,
    /// Edge label
    pub code_points: Vec<u32>,
    /// Unigram probability; `Some` makes the node terminal
    pub probability: Option<u8>,
    /// Child PtNode array
    pub children_pos: Option<DictPos>,
    /// Head of the bigram chain
    pub bigrams_pos: Option<DictPos>,
}

impl PtNodeParams {
    /// Copy every field of an existing node
    pub fn from_node(node: &PtNode) -> Self {
        Self {
            parent_pos: node.parent_pos(),
            code_points: node.code_points().to_vec(),
            probability: node.probability(),
            children_pos: node.children_pos(),
            bigrams_pos: node.bigrams_pos(),
        }
    }
}

/// Check that code points form a storable edge label
pub fn validate_code_points(code_points: &[u32]) -> Result<()> {
    if code_points.is_empty() {
        return Err(DictError::EmptyWord);
    }
    if code_points.len() > MAX_WORD_LENGTH {
        return Err(DictError::WordTooLong(code_points.len()));
    }
    if let Some(&cp) = code_points.iter().find(|&&cp| cp > MAX_CODE_POINT) {
        return Err(DictError::InvalidCodePoint(cp));
    }
    Ok(())
}

/// Write a PtNode array size field
pub fn write_pt_node_array_size_and_advance(
    buffer: &mut ExtendableBuffer,
    array_size: usize,
    pos: &mut DictPos,
) -> Result<()> {
    if array_size > MAX_PT_NODE_ARRAY_SIZE {
        return Err(DictError::PtNodeArrayFull(*pos));
    }
    buffer.write_uint_and_advance(pos, array_size as u32, PT_NODE_ARRAY_SIZE_FIELD_SIZE)
}

/// Write the forward link terminating a PtNode array segment
pub fn write_forward_link_and_advance(
    buffer: &mut ExtendableBuffer,
    forward_link: Option<DictPos>,
    pos: &mut DictPos,
) -> Result<()> {
    buffer.write_pos_and_advance(pos, forward_link)
}

/// Write a complete PtNode record
pub fn write_pt_node_and_advance(
    buffer: &mut ExtendableBuffer,
    params: &PtNodeParams,
    pos: &mut DictPos,
) -> Result<()> {
    validate_code_points(&params.code_points)?;
    let node_flags = if params.probability.is_some() {
        flags::TERMINAL
    } else {
        0
    };
    buffer.write_uint_and_advance(pos, u32::from(node_flags), NODE_FLAGS_FIELD_SIZE)?;
    buffer.write_pos_and_advance(pos, params.parent_pos)?;
    buffer.write_uint_and_advance(
        pos,
        params.code_points.len() as u32,
        CODE_POINT_COUNT_FIELD_SIZE,
    )?;
    for &cp in &params.code_points {
        buffer.write_uint_and_advance(pos, cp, CODE_POINT_FIELD_SIZE)?;
    }
    buffer.write_uint_and_advance(
        pos,
        u32::from(params.probability.unwrap_or(0)),
        PROBABILITY_FIELD_SIZE,
    )?;
    buffer.write_pos_and_advance(pos, params.children_pos)?;
    buffer.write_pos_and_advance(pos, params.bigrams_pos)
}

/// Append a PtNode array and return its position
///
/// The array is a single segment unless it holds more nodes than one size
/// field can count. In that case it is split into full segments, each
/// forward-linked to the one written right after it.
pub fn append_pt_node_array(
    buffer: &mut ExtendableBuffer,
    nodes: &[PtNodeParams],
) -> Result<DictPos> {
    let array_pos = buffer.tail_position()?;
    let mut pos = array_pos;
    let mut segments = nodes.chunks(MAX_PT_NODE_ARRAY_SIZE).peekable();
    if segments.peek().is_none() {
        write_pt_node_array_size_and_advance(buffer, 0, &mut pos)?;
    }
    while let Some(segment) = segments.next() {
        write_pt_node_array_size_and_advance(buffer, segment.len(), &mut pos)?;
        for params in segment {
            write_pt_node_and_advance(buffer, params, &mut pos)?;
        }
        if segments.peek().is_some() {
            let next_segment = pos.advance(FORWARD_LINK_FIELD_SIZE)?;
            write_forward_link_and_advance(buffer, Some(next_segment), &mut pos)?;
        }
    }
    write_forward_link_and_advance(buffer, None, &mut pos)?;
    Ok(array_pos)
}

/// Chain `segment_pos` after the last segment of the array at `array_pos`
pub fn link_pt_node_array_segment(
    buffer: &mut ExtendableBuffer,
    array_pos: DictPos,
    segment_pos: DictPos,
) -> Result<()> {
    let mut cursor = PtNodeArrayCursor::new(buffer, array_pos)?;
    while cursor.next_node(buffer)?.is_some() {}
    let mut link_pos = cursor.forward_link_field_pos();
    write_forward_link_and_advance(buffer, Some(segment_pos), &mut link_pos)
}

/// Set the deleted flag of a PtNode in place
pub fn mark_pt_node_as_deleted(buffer: &mut ExtendableBuffer, node: &PtNode) -> Result<()> {
    buffer.write_uint(
        node.head_pos(),
        u32::from(node.flags() | flags::DELETED),
        NODE_FLAGS_FIELD_SIZE,
    )
}

/// Make a PtNode terminal with the given probability
pub fn update_terminal_probability(
    buffer: &mut ExtendableBuffer,
    node: &PtNode,
    probability: u8,
) -> Result<()> {
    buffer.write_uint(
        node.head_pos(),
        u32::from(node.flags() | flags::TERMINAL),
        NODE_FLAGS_FIELD_SIZE,
    )?;
    buffer.write_uint(
        node.probability_field_pos(),
        u32::from(probability),
        PROBABILITY_FIELD_SIZE,
    )
}

/// Clear the terminal flag, leaving the node as an inner edge
pub fn clear_terminal(buffer: &mut ExtendableBuffer, node: &PtNode) -> Result<()> {
    buffer.write_uint(
        node.head_pos(),
        u32::from(node.flags() & !flags::TERMINAL),
        NODE_FLAGS_FIELD_SIZE,
    )
}

/// Rewrite the parent field
pub fn update_parent_pos(
    buffer: &mut ExtendableBuffer,
    node: &PtNode,
    parent_pos: Option<DictPos>,
) -> Result<()> {
    let mut pos = node.parent_pos_field_pos();
    buffer.write_pos_and_advance(&mut pos, parent_pos)
}

/// Rewrite the children field
pub fn update_children_pos(
    buffer: &mut ExtendableBuffer,
    node: &PtNode,
    children_pos: Option<DictPos>,
) -> Result<()> {
    let mut pos = node.children_pos_field_pos();
    buffer.write_pos_and_advance(&mut pos, children_pos)
}

/// Rewrite the bigram chain head
pub fn update_bigrams_pos(
    buffer: &mut ExtendableBuffer,
    node: &PtNode,
    bigrams_pos: Option<DictPos>,
) -> Result<()> {
    let mut pos = node.bigrams_pos_field_pos();
    buffer.write_pos_and_advance(&mut pos, bigrams_pos)
}
