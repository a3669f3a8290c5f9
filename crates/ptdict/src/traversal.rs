//! Depth-first PtNode traversal
//!
//! The engine walks the trie rooted at a PtNode array and reports four kinds of
//! events to a [`TraversingEventListener`]. Two orders are offered:
//!
//! - **Post-order**: a node's child array is walked before the node itself is
//!   visited, so aggregates over a subtree are ready when its owner is seen.
//! - **Array-level pre-order**: every node of an array is visited first, then
//!   the array tail is reported, then each child array is walked in turn. The
//!   nodes of an array are read again before descending, so a listener that
//!   rewrote a children field decides where the walk goes next.
//!
//! Neither order descends below a deleted PtNode. Any `Err` returned by the
//! listener stops the walk immediately and is handed back to the caller.

use crate::MAX_WORD_LENGTH;
use crate::buffer::ExtendableBuffer;
use crate::error::DictError;
use crate::node::{PtNode, PtNodeArrayCursor};
use crate::pos::DictPos;

/// Deepest array nesting a well-formed trie can have
pub const MAX_TRAVERSAL_DEPTH: usize = MAX_WORD_LENGTH + 1;

/// Receiver of traversal events
pub trait TraversingEventListener {
    /// Error that aborts the traversal
    type Error: From<DictError>;

    /// Buffer the engine reads PtNodes from
    fn traversed_buffer(&self) -> &ExtendableBuffer;

    /// Called when returning to the parent array
    fn on_ascend(&mut self) -> Result<(), Self::Error>;

    /// Called before the nodes of the array at `pt_node_array_pos` are read
    fn on_descend(&mut self, pt_node_array_pos: DictPos) -> Result<(), Self::Error>;

    /// Called after the last node of the current array
    fn on_reading_pt_node_array_tail(&mut self) -> Result<(), Self::Error>;

    /// Called once per PtNode
    fn on_visiting_pt_node(
        &mut self,
        node: &PtNode,
        node_code_points: &[u32],
    ) -> Result<(), Self::Error>;
}

/// Walk every reachable PtNode, visiting children before their parent
pub fn traverse_all_pt_nodes_in_postorder_depth_first<L>(
    listener: &mut L,
    root_pos: DictPos,
) -> Result<(), L::Error>
where
    L: TraversingEventListener + ?Sized,
{
    visit_array_postorder(listener, root_pos, 0)
}

/// Walk every reachable PtNode, visiting whole arrays before their children
pub fn traverse_all_pt_nodes_in_pt_node_array_level_preorder_depth_first<L>(
    listener: &mut L,
    root_pos: DictPos,
) -> Result<(), L::Error>
where
    L: TraversingEventListener + ?Sized,
{
    visit_array_level_preorder(listener, root_pos, 0)
}

fn check_depth(depth: usize) -> Result<(), DictError> {
    if depth > MAX_TRAVERSAL_DEPTH {
        return Err(DictError::TraversalTooDeep(MAX_TRAVERSAL_DEPTH));
    }
    Ok(())
}

fn visit_array_postorder<L>(listener: &mut L, array_pos: DictPos, depth: usize) -> Result<(), L::Error>
where
    L: TraversingEventListener + ?Sized,
{
    check_depth(depth)?;
    listener.on_descend(array_pos)?;
    let mut cursor = PtNodeArrayCursor::new(listener.traversed_buffer(), array_pos)?;
    while let Some(mut node) = cursor.next_node(listener.traversed_buffer())? {
        if !node.is_deleted() {
            if let Some(children_pos) = node.children_pos() {
                visit_array_postorder(listener, children_pos, depth + 1)?;
                node = PtNode::read(listener.traversed_buffer(), node.head_pos())?;
            }
        }
        listener.on_visiting_pt_node(&node, node.code_points())?;
    }
    listener.on_reading_pt_node_array_tail()?;
    listener.on_ascend()
}

fn visit_array_level_preorder<L>(
    listener: &mut L,
    array_pos: DictPos,
    depth: usize,
) -> Result<(), L::Error>
where
    L: TraversingEventListener + ?Sized,
{
    check_depth(depth)?;
    listener.on_descend(array_pos)?;
    let mut cursor = PtNodeArrayCursor::new(listener.traversed_buffer(), array_pos)?;
    while let Some(node) = cursor.next_node(listener.traversed_buffer())? {
        listener.on_visiting_pt_node(&node, node.code_points())?;
    }
    listener.on_reading_pt_node_array_tail()?;

    let mut cursor = PtNodeArrayCursor::new(listener.traversed_buffer(), array_pos)?;
    while let Some(node) = cursor.next_node(listener.traversed_buffer())? {
        if node.is_deleted() {
            continue;
        }
        if let Some(children_pos) = node.children_pos() {
            visit_array_level_preorder(listener, children_pos, depth + 1)?;
        }
    }
    listener.on_ascend()
}
