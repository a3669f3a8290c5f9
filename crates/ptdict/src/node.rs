//! PtNode records and PtNode array headers
//!
//! ## Layout
//!
//! ```text
//! PtNode array segment:
//! ┌────────────┬──────────┬─────┬──────────┬──────────────────┐
//! │ size (u16) │ PtNode 0 │ ... │ PtNode N │ forward link (3) │
//! └────────────┴──────────┴─────┴──────────┴──────────────────┘
//!
//! PtNode:
//! ┌───────┬────────────┬──────────┬─────────────────┬──────┬──────────┬─────────┐
//! │ flags │ parent (3) │ cp count │ code points (3) │ prob │ children │ bigrams │
//! └───────┴────────────┴──────────┴─────────────────┴──────┴──────────┴─────────┘
//! ```

use crate::MAX_WORD_LENGTH;
use crate::buffer::ExtendableBuffer;
use crate::error::{DictError, Result};
use crate::pos::{DICT_POS_FIELD_SIZE, DictPos};

/// Width of the PtNode flags field
pub const NODE_FLAGS_FIELD_SIZE: usize = 1;
/// Width of the code point count field
pub const CODE_POINT_COUNT_FIELD_SIZE: usize = 1;
/// Width of one encoded code point
pub const CODE_POINT_FIELD_SIZE: usize = 3;
/// Width of the unigram probability field
pub const PROBABILITY_FIELD_SIZE: usize = 1;
/// Width of the PtNode array size field
pub const PT_NODE_ARRAY_SIZE_FIELD_SIZE: usize = 2;
/// Width of the forward link field at the end of an array segment
pub const FORWARD_LINK_FIELD_SIZE: usize = DICT_POS_FIELD_SIZE;
/// Largest node count one array segment can describe
pub const MAX_PT_NODE_ARRAY_SIZE: usize = u16::MAX as usize;
/// Largest valid Unicode scalar value
pub const MAX_CODE_POINT: u32 = 0x10_FFFF;

/// PtNode flag bits
pub mod flags {
    /// Node is logically removed
    pub const DELETED: u8 = 0x80;
    /// Node ends a word and carries a valid probability
    pub const TERMINAL: u8 = 0x40;
    /// Bits this version understands
    pub const KNOWN: u8 = DELETED | TERMINAL;
}

/// Encoded size of a PtNode with `code_point_count` code points
#[inline]
pub const fn pt_node_size(code_point_count: usize) -> usize {
    NODE_FLAGS_FIELD_SIZE
        + DICT_POS_FIELD_SIZE
        + CODE_POINT_COUNT_FIELD_SIZE
        + code_point_count * CODE_POINT_FIELD_SIZE
        + PROBABILITY_FIELD_SIZE
        + DICT_POS_FIELD_SIZE
        + DICT_POS_FIELD_SIZE
}

/// A decoded PtNode together with the positions of its rewritable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtNode {
    head_pos: DictPos,
    flags: u8,
    parent_pos: Option<DictPos>,
    code_points: Vec<u32>,
    probability: u8,
    children_pos: Option<DictPos>,
    bigrams_pos: Option<DictPos>,
    parent_pos_field_pos: DictPos,
    probability_field_pos: DictPos,
    children_pos_field_pos: DictPos,
    bigrams_pos_field_pos: DictPos,
    end_pos: DictPos,
}

impl PtNode {
    /// Decode the PtNode starting at `head_pos`
    pub fn read(buffer: &ExtendableBuffer, head_pos: DictPos) -> Result<Self> {
        let corrupted = |_| DictError::CorruptedPtNode(head_pos);
        let mut pos = head_pos;

        let flags = buffer
            .read_uint_and_advance(&mut pos, NODE_FLAGS_FIELD_SIZE)
            .map_err(corrupted)? as u8;
        if flags & !flags::KNOWN != 0 {
            return Err(DictError::CorruptedPtNode(head_pos));
        }
        let parent_pos_field_pos = pos;
        let parent_pos = buffer.read_pos_and_advance(&mut pos).map_err(corrupted)?;

        let count = buffer
            .read_uint_and_advance(&mut pos, CODE_POINT_COUNT_FIELD_SIZE)
            .map_err(corrupted)? as usize;
        if count == 0 || count > MAX_WORD_LENGTH {
            return Err(DictError::CorruptedPtNode(head_pos));
        }
        let mut code_points = Vec::with_capacity(count);
        for _ in 0..count {
            let cp = buffer
                .read_uint_and_advance(&mut pos, CODE_POINT_FIELD_SIZE)
                .map_err(corrupted)?;
            if cp > MAX_CODE_POINT {
                return Err(DictError::CorruptedPtNode(head_pos));
            }
            code_points.push(cp);
        }

        let probability_field_pos = pos;
        let probability = buffer
            .read_uint_and_advance(&mut pos, PROBABILITY_FIELD_SIZE)
            .map_err(corrupted)? as u8;
        let children_pos_field_pos = pos;
        let children_pos = buffer.read_pos_and_advance(&mut pos).map_err(corrupted)?;
        let bigrams_pos_field_pos = pos;
        let bigrams_pos = buffer.read_pos_and_advance(&mut pos).map_err(corrupted)?;

        Ok(Self {
            head_pos,
            flags,
            parent_pos,
            code_points,
            probability,
            children_pos,
            bigrams_pos,
            parent_pos_field_pos,
            probability_field_pos,
            children_pos_field_pos,
            bigrams_pos_field_pos,
            end_pos: pos,
        })
    }

    /// Position of the flags byte
    #[inline]
    pub fn head_pos(&self) -> DictPos {
        self.head_pos
    }

    /// Raw flags
    #[inline]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Check if the node is logically removed
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.flags & flags::DELETED != 0
    }

    /// Check if the node ends a word
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.flags & flags::TERMINAL != 0
    }

    /// Unigram probability, if this node ends a word
    #[inline]
    pub fn probability(&self) -> Option<u8> {
        self.is_terminal().then_some(self.probability)
    }

    /// Check if the node carries a usable unigram probability
    ///
    /// A terminal node whose probability is 0 counts as no word at all.
    #[inline]
    pub fn has_valid_probability(&self) -> bool {
        self.is_terminal() && self.probability > 0
    }

    /// Stored probability byte regardless of the terminal flag
    #[inline]
    pub fn raw_probability(&self) -> u8 {
        self.probability
    }

    /// Parent PtNode
    #[inline]
    pub fn parent_pos(&self) -> Option<DictPos> {
        self.parent_pos
    }

    /// Edge label
    #[inline]
    pub fn code_points(&self) -> &[u32] {
        &self.code_points
    }

    /// Child PtNode array
    #[inline]
    pub fn children_pos(&self) -> Option<DictPos> {
        self.children_pos
    }

    /// Check if the node has a child array
    #[inline]
    pub fn has_children(&self) -> bool {
        self.children_pos.is_some()
    }

    /// Head of the bigram chain
    #[inline]
    pub fn bigrams_pos(&self) -> Option<DictPos> {
        self.bigrams_pos
    }

    /// Position of the parent field
    #[inline]
    pub fn parent_pos_field_pos(&self) -> DictPos {
        self.parent_pos_field_pos
    }

    /// Position of the probability field
    #[inline]
    pub fn probability_field_pos(&self) -> DictPos {
        self.probability_field_pos
    }

    /// Position of the children field
    #[inline]
    pub fn children_pos_field_pos(&self) -> DictPos {
        self.children_pos_field_pos
    }

    /// Position of the bigrams field
    #[inline]
    pub fn bigrams_pos_field_pos(&self) -> DictPos {
        self.bigrams_pos_field_pos
    }

    /// Position right after the record, where the next sibling starts
    #[inline]
    pub fn end_pos(&self) -> DictPos {
        self.end_pos
    }

    /// Encoded size of this record
    #[inline]
    pub fn size(&self) -> usize {
        self.end_pos.offset() - self.head_pos.offset()
    }
}

/// Cursor over the PtNodes of one array, following forward links
///
/// The cursor only holds positions; every node is decoded fresh from the buffer
/// passed to [`PtNodeArrayCursor::next_node`], so callers may rewrite fixed-width
/// fields between steps.
#[derive(Debug, Clone)]
pub struct PtNodeArrayCursor {
    array_pos: DictPos,
    next_pos: DictPos,
    remaining_in_segment: usize,
    segments_read: usize,
    finished: bool,
}

/// Upper bound on forward-linked segments per array
const MAX_LINKED_SEGMENTS: usize = 0x10_0000;

impl PtNodeArrayCursor {
    /// Start reading the array whose first segment begins at `array_pos`
    pub fn new(buffer: &ExtendableBuffer, array_pos: DictPos) -> Result<Self> {
        let mut cursor = Self {
            array_pos,
            next_pos: array_pos,
            remaining_in_segment: 0,
            segments_read: 0,
            finished: false,
        };
        cursor.enter_segment(buffer, array_pos)?;
        Ok(cursor)
    }

    /// Position of the first segment
    #[inline]
    pub fn array_pos(&self) -> DictPos {
        self.array_pos
    }

    fn enter_segment(&mut self, buffer: &ExtendableBuffer, segment_pos: DictPos) -> Result<()> {
        self.segments_read += 1;
        if self.segments_read > MAX_LINKED_SEGMENTS {
            return Err(DictError::CorruptedPtNodeArray(self.array_pos));
        }
        let mut pos = segment_pos;
        self.remaining_in_segment = buffer
            .read_uint_and_advance(&mut pos, PT_NODE_ARRAY_SIZE_FIELD_SIZE)
            .map_err(|_| DictError::CorruptedPtNodeArray(segment_pos))?
            as usize;
        self.next_pos = pos;
        Ok(())
    }

    /// Decode the next node, or `None` once every linked segment is exhausted
    pub fn next_node(&mut self, buffer: &ExtendableBuffer) -> Result<Option<PtNode>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            if self.remaining_in_segment > 0 {
                let node = PtNode::read(buffer, self.next_pos)?;
                self.next_pos = node.end_pos();
                self.remaining_in_segment -= 1;
                return Ok(Some(node));
            }
            let mut pos = self.next_pos;
            let forward_link = buffer
                .read_pos_and_advance(&mut pos)
                .map_err(|_| DictError::CorruptedPtNodeArray(self.array_pos))?;
            match forward_link {
                Some(next_segment) => self.enter_segment(buffer, next_segment)?,
                None => self.finished = true,
            }
        }
    }

    /// Position of the forward link field of the segment being read
    ///
    /// Only meaningful once every node of the current segment was returned.
    #[inline]
    pub fn forward_link_field_pos(&self) -> DictPos {
        self.next_pos
    }
}
