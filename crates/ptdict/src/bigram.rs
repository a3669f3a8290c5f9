//! Bigram chains
//!
//! A bigram chain is a singly linked list of fixed-size entries stored out of
//! line. The owning PtNode holds the head; new entries are prepended, so adding
//! a bigram never moves existing records.
//!
//! ```text
//! entry: │ probability (1) │ target PtNode (3) │ next entry (3) │
//! ```

use crate::buffer::ExtendableBuffer;
use crate::error::{DictError, Result};
use crate::node::PtNode;
use crate::pos::{DICT_POS_FIELD_SIZE, DictPos};

/// Width of the bigram probability field
pub const BIGRAM_PROBABILITY_FIELD_SIZE: usize = 1;
/// Encoded size of one bigram entry
pub const BIGRAM_ENTRY_SIZE: usize = BIGRAM_PROBABILITY_FIELD_SIZE + 2 * DICT_POS_FIELD_SIZE;
/// Chains longer than this are treated as looping
pub const MAX_BIGRAM_CHAIN_LENGTH: usize = 10_000;

const TARGET_FIELD_OFFSET: usize = BIGRAM_PROBABILITY_FIELD_SIZE;
const NEXT_FIELD_OFFSET: usize = BIGRAM_PROBABILITY_FIELD_SIZE + DICT_POS_FIELD_SIZE;

/// One decoded bigram entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigramEntry {
    /// Where the entry is stored
    pub pos: DictPos,
    /// Bigram probability
    pub probability: u8,
    /// Terminal PtNode of the following word
    pub target_pos: Option<DictPos>,
    /// Next entry of the chain
    pub next_pos: Option<DictPos>,
}

impl BigramEntry {
    /// Decode the entry at `pos`
    pub fn read(buffer: &ExtendableBuffer, pos: DictPos) -> Result<Self> {
        let corrupted = |_| DictError::CorruptedBigramChain(pos);
        let mut cursor = pos;
        let probability = buffer
            .read_uint_and_advance(&mut cursor, BIGRAM_PROBABILITY_FIELD_SIZE)
            .map_err(corrupted)? as u8;
        let target_pos = buffer.read_pos_and_advance(&mut cursor).map_err(corrupted)?;
        let next_pos = buffer.read_pos_and_advance(&mut cursor).map_err(corrupted)?;
        Ok(Self {
            pos,
            probability,
            target_pos,
            next_pos,
        })
    }

    fn write_and_advance(
        buffer: &mut ExtendableBuffer,
        pos: &mut DictPos,
        probability: u8,
        target_pos: Option<DictPos>,
        next_pos: Option<DictPos>,
    ) -> Result<()> {
        buffer.write_uint_and_advance(pos, u32::from(probability), BIGRAM_PROBABILITY_FIELD_SIZE)?;
        buffer.write_pos_and_advance(pos, target_pos)?;
        buffer.write_pos_and_advance(pos, next_pos)
    }
}

/// Decode every entry of the chain starting at `head`
pub fn read_entries(buffer: &ExtendableBuffer, head: Option<DictPos>) -> Result<Vec<BigramEntry>> {
    let mut entries = Vec::new();
    let mut next = head;
    while let Some(pos) = next {
        if entries.len() >= MAX_BIGRAM_CHAIN_LENGTH {
            return Err(DictError::CorruptedBigramChain(pos));
        }
        let entry = BigramEntry::read(buffer, pos)?;
        next = entry.next_pos;
        entries.push(entry);
    }
    Ok(entries)
}

/// Point the predecessor of a removed entry (or the head) at `next`
fn unlink(
    buffer: &mut ExtendableBuffer,
    head: &mut Option<DictPos>,
    prev: Option<DictPos>,
    next: Option<DictPos>,
) -> Result<()> {
    match prev {
        Some(prev_pos) => {
            let mut field = prev_pos.advance(NEXT_FIELD_OFFSET)?;
            buffer.write_pos_and_advance(&mut field, next)
        }
        None => {
            *head = next;
            Ok(())
        }
    }
}

/// Set the probability of the bigram to `target_pos`, prepending a new entry
/// if there is none. Returns `true` when an entry was added.
pub fn add_or_update_entry(
    buffer: &mut ExtendableBuffer,
    head: &mut Option<DictPos>,
    target_pos: DictPos,
    probability: u8,
) -> Result<bool> {
    for entry in read_entries(buffer, *head)? {
        if entry.target_pos == Some(target_pos) {
            buffer.write_uint(
                entry.pos,
                u32::from(probability),
                BIGRAM_PROBABILITY_FIELD_SIZE,
            )?;
            return Ok(false);
        }
    }
    let entry_pos = buffer.tail_position()?;
    let mut pos = entry_pos;
    BigramEntry::write_and_advance(buffer, &mut pos, probability, Some(target_pos), *head)?;
    *head = Some(entry_pos);
    Ok(true)
}

/// Unlink the entry pointing at `target_pos`. Returns `true` if one was found.
pub fn remove_entry(
    buffer: &mut ExtendableBuffer,
    head: &mut Option<DictPos>,
    target_pos: DictPos,
) -> Result<bool> {
    let mut prev = None;
    for entry in read_entries(buffer, *head)? {
        if entry.target_pos == Some(target_pos) {
            unlink(buffer, head, prev, entry.next_pos)?;
            return Ok(true);
        }
        prev = Some(entry.pos);
    }
    Ok(false)
}

/// Unlink every entry whose target is no longer a live word
///
/// An entry is useless when its target PtNode is deleted or has no valid
/// probability.
/// `head` is rewritten when leading entries are dropped. Returns the number of
/// entries removed.
pub fn update_all_bigram_entries_and_delete_useless_entries(
    buffer: &mut ExtendableBuffer,
    head: &mut Option<DictPos>,
) -> Result<usize> {
    let mut removed = 0;
    let mut prev = None;
    for entry in read_entries(buffer, *head)? {
        let is_useful = match entry.target_pos {
            Some(target_pos) => {
                let target = PtNode::read(buffer, target_pos)
                    .map_err(|_| DictError::CorruptedBigramChain(entry.pos))?;
                !target.is_deleted() && target.has_valid_probability()
            }
            None => false,
        };
        if is_useful {
            prev = Some(entry.pos);
        } else {
            unlink(buffer, head, prev, entry.next_pos)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Append a contiguous copy of the chain at `head` in `source` to the tail of
/// `dest` and return the new head. Targets are copied verbatim.
pub fn copy_chain(
    source: &ExtendableBuffer,
    head: Option<DictPos>,
    dest: &mut ExtendableBuffer,
) -> Result<Option<DictPos>> {
    let entries = read_entries(source, head)?;
    if entries.is_empty() {
        return Ok(None);
    }
    let new_head = dest.tail_position()?;
    let mut pos = new_head;
    for (i, entry) in entries.iter().enumerate() {
        let next = if i + 1 < entries.len() {
            Some(pos.advance(BIGRAM_ENTRY_SIZE)?)
        } else {
            None
        };
        BigramEntry::write_and_advance(dest, &mut pos, entry.probability, entry.target_pos, next)?;
    }
    Ok(Some(new_head))
}

/// Rewrite every target of the chain at `head` through `relocate`
///
/// Returns the number of targets rewritten.
pub fn update_all_bigram_target_pt_node_positions<E>(
    buffer: &mut ExtendableBuffer,
    head: Option<DictPos>,
    mut relocate: impl FnMut(DictPos) -> std::result::Result<DictPos, E>,
) -> std::result::Result<usize, E>
where
    E: From<DictError>,
{
    let entries = read_entries(buffer, head)?;
    for entry in &entries {
        let target_pos = entry
            .target_pos
            .ok_or(DictError::CorruptedBigramChain(entry.pos))?;
        let mut field = entry.pos.advance(TARGET_FIELD_OFFSET)?;
        buffer.write_pos_and_advance(&mut field, Some(relocate(target_pos)?))?;
    }
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{PT_NODE_ARRAY_SIZE_FIELD_SIZE, pt_node_size};
    use crate::writing::{self, PtNodeParams};

    fn leaf(word: &str, probability: Option<u8>) -> PtNodeParams {
        PtNodeParams {
            parent_pos: None,
            code_points: word.chars().map(u32::from).collect(),
            probability,
            children_pos: None,
            bigrams_pos: None,
        }
    }

    /// Buffer with one array of three one-letter words; returns their positions
    fn three_words() -> (ExtendableBuffer, [DictPos; 3]) {
        let mut buf = ExtendableBuffer::new();
        let array = writing::append_pt_node_array(
            &mut buf,
            &[leaf("a", Some(1)), leaf("b", Some(2)), leaf("c", Some(3))],
        )
        .unwrap();
        let first = array.advance(PT_NODE_ARRAY_SIZE_FIELD_SIZE).unwrap();
        let step = pt_node_size(1);
        (
            buf,
            [
                first,
                first.advance(step).unwrap(),
                first.advance(2 * step).unwrap(),
            ],
        )
    }

    fn targets(buf: &ExtendableBuffer, head: Option<DictPos>) -> Vec<DictPos> {
        read_entries(buf, head)
            .unwrap()
            .into_iter()
            .filter_map(|e| e.target_pos)
            .collect()
    }

    #[test]
    fn test_add_prepends_and_updates() {
        let (mut buf, [a, b, _]) = three_words();
        let mut head = None;
        assert!(add_or_update_entry(&mut buf, &mut head, a, 10).unwrap());
        assert!(add_or_update_entry(&mut buf, &mut head, b, 20).unwrap());
        assert!(!add_or_update_entry(&mut buf, &mut head, a, 30).unwrap());

        let entries = read_entries(&buf, head).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].target_pos, Some(b));
        assert_eq!(entries[1].target_pos, Some(a));
        assert_eq!(entries[1].probability, 30);
    }

    #[test]
    fn test_remove_head_and_middle() {
        let (mut buf, [a, b, c]) = three_words();
        let mut head = None;
        for target in [a, b, c] {
            add_or_update_entry(&mut buf, &mut head, target, 1).unwrap();
        }
        assert!(remove_entry(&mut buf, &mut head, b).unwrap());
        assert_eq!(targets(&buf, head), vec![c, a]);
        assert!(remove_entry(&mut buf, &mut head, c).unwrap());
        assert_eq!(targets(&buf, head), vec![a]);
        assert!(!remove_entry(&mut buf, &mut head, c).unwrap());
    }

    #[test]
    fn test_prune_deleted_and_non_terminal_targets() {
        let (mut buf, [a, b, c]) = three_words();
        let mut head = None;
        for target in [a, b, c] {
            add_or_update_entry(&mut buf, &mut head, target, 1).unwrap();
        }
        let node_c = PtNode::read(&buf, c).unwrap();
        writing::mark_pt_node_as_deleted(&mut buf, &node_c).unwrap();
        let node_a = PtNode::read(&buf, a).unwrap();
        writing::clear_terminal(&mut buf, &node_a).unwrap();

        let original_head = head;
        let removed =
            update_all_bigram_entries_and_delete_useless_entries(&mut buf, &mut head).unwrap();
        assert_eq!(removed, 2);
        assert_ne!(head, original_head);
        assert_eq!(targets(&buf, head), vec![b]);
    }

    #[test]
    fn test_prune_everything_clears_head() {
        let (mut buf, [a, _, _]) = three_words();
        let mut head = None;
        add_or_update_entry(&mut buf, &mut head, a, 1).unwrap();
        let node_a = PtNode::read(&buf, a).unwrap();
        writing::mark_pt_node_as_deleted(&mut buf, &node_a).unwrap();
        update_all_bigram_entries_and_delete_useless_entries(&mut buf, &mut head).unwrap();
        assert_eq!(head, None);
    }

    #[test]
    fn test_prune_reports_unreadable_target() {
        let (mut buf, _) = three_words();
        let mut head = None;
        let bogus = DictPos::new(buf.len() + 100).unwrap();
        add_or_update_entry(&mut buf, &mut head, bogus, 1).unwrap();
        let entry_pos = head.unwrap();
        assert_eq!(
            update_all_bigram_entries_and_delete_useless_entries(&mut buf, &mut head),
            Err(DictError::CorruptedBigramChain(entry_pos))
        );
    }

    #[test]
    fn test_looping_chain_is_corruption() {
        let (mut buf, [a, _, _]) = three_words();
        let mut head = None;
        add_or_update_entry(&mut buf, &mut head, a, 1).unwrap();
        let entry_pos = head.unwrap();
        let mut next_field = entry_pos.advance(NEXT_FIELD_OFFSET).unwrap();
        buf.write_pos_and_advance(&mut next_field, Some(entry_pos))
            .unwrap();
        assert!(matches!(
            read_entries(&buf, head),
            Err(DictError::CorruptedBigramChain(_))
        ));
    }

    #[test]
    fn test_copy_chain_is_contiguous() {
        let (mut buf, [a, b, c]) = three_words();
        let mut head = None;
        for target in [a, b, c] {
            add_or_update_entry(&mut buf, &mut head, target, 7).unwrap();
        }
        let mut dest = ExtendableBuffer::new();
        dest.append_uint(0, 1).unwrap();
        let new_head = copy_chain(&buf, head, &mut dest).unwrap().unwrap();
        assert_eq!(new_head.offset(), 1);
        assert_eq!(dest.len(), 1 + 3 * BIGRAM_ENTRY_SIZE);
        assert_eq!(targets(&dest, Some(new_head)), vec![c, b, a]);
        assert_eq!(copy_chain(&buf, None, &mut dest).unwrap(), None);
    }

    #[test]
    fn test_relocate_targets() {
        let (mut buf, [a, b, _]) = three_words();
        let mut head = None;
        add_or_update_entry(&mut buf, &mut head, a, 1).unwrap();
        add_or_update_entry(&mut buf, &mut head, b, 1).unwrap();
        let moved = DictPos::new(500).unwrap();
        let count =
            update_all_bigram_target_pt_node_positions(&mut buf, head, |_| {
                Ok::<_, DictError>(moved)
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(targets(&buf, head), vec![moved, moved]);
    }
}
