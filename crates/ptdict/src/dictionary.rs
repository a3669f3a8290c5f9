//! Dictionary of record and its editing surface

use std::collections::BTreeMap;

use crate::MAX_WORD_LENGTH;
use crate::bigram;
use crate::buffer::ExtendableBuffer;
use crate::error::{DictError, Result};
use crate::node::{PtNode, PtNodeArrayCursor};
use crate::pos::{DictPos, MAX_BUFFER_SIZE};
use crate::traversal::{self, TraversingEventListener};
use crate::writing::{self, PtNodeParams};

/// A Patricia trie dictionary stored in one extendable buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    buffer: ExtendableBuffer,
    root_pos: DictPos,
}

fn to_code_points(word: &str) -> Result<Vec<u32>> {
    let code_points: Vec<u32> = word.chars().map(u32::from).collect();
    writing::validate_code_points(&code_points)?;
    Ok(code_points)
}

impl Dictionary {
    /// Create an empty dictionary
    pub fn new() -> Result<Self> {
        Self::with_limit(MAX_BUFFER_SIZE)
    }

    /// Create an empty dictionary whose buffer may not grow past `max_size`
    pub fn with_limit(max_size: usize) -> Result<Self> {
        let mut buffer = ExtendableBuffer::with_limit(max_size);
        let root_pos = writing::append_pt_node_array(&mut buffer, &[])?;
        Ok(Self { buffer, root_pos })
    }

    /// Wrap an existing buffer whose root PtNode array starts at `root_pos`
    pub fn from_parts(buffer: ExtendableBuffer, root_pos: DictPos) -> Self {
        Self { buffer, root_pos }
    }

    /// Split into buffer and root position
    pub fn into_parts(self) -> (ExtendableBuffer, DictPos) {
        (self.buffer, self.root_pos)
    }

    /// Install a new buffer, returning the one it replaces
    pub fn replace_buffer(
        &mut self,
        buffer: ExtendableBuffer,
        root_pos: DictPos,
    ) -> ExtendableBuffer {
        self.root_pos = root_pos;
        std::mem::replace(&mut self.buffer, buffer)
    }

    /// Backing buffer
    #[inline]
    pub fn buffer(&self) -> &ExtendableBuffer {
        &self.buffer
    }

    /// Backing buffer, mutably
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut ExtendableBuffer {
        &mut self.buffer
    }

    /// Position of the root PtNode array
    #[inline]
    pub fn root_pos(&self) -> DictPos {
        self.root_pos
    }

    /// Bytes used by the buffer
    #[inline]
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// First live node in the array whose label starts with `code_point`
    fn find_child_starting_with(
        &self,
        array_pos: DictPos,
        code_point: u32,
    ) -> Result<Option<PtNode>> {
        let mut cursor = PtNodeArrayCursor::new(&self.buffer, array_pos)?;
        while let Some(node) = cursor.next_node(&self.buffer)? {
            if !node.is_deleted() && node.code_points().first() == Some(&code_point) {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    fn find_pt_node_by_code_points(&self, code_points: &[u32]) -> Result<Option<PtNode>> {
        let mut array_pos = self.root_pos;
        let mut matched = 0;
        loop {
            let Some(node) = self.find_child_starting_with(array_pos, code_points[matched])? else {
                return Ok(None);
            };
            let rest = &code_points[matched..];
            let label = node.code_points();
            if !rest.starts_with(label) {
                return Ok(None);
            }
            matched += label.len();
            if matched == code_points.len() {
                return Ok(Some(node));
            }
            match node.children_pos() {
                Some(children_pos) => array_pos = children_pos,
                None => return Ok(None),
            }
        }
    }

    /// Live PtNode whose path from the root spells exactly `word`
    pub fn find_pt_node(&self, word: &str) -> Result<Option<PtNode>> {
        let code_points = to_code_points(word)?;
        self.find_pt_node_by_code_points(&code_points)
    }

    /// PtNode of `word` if it has a valid probability
    pub fn find_word(&self, word: &str) -> Result<Option<PtNode>> {
        Ok(self.find_pt_node(word)?.filter(PtNode::has_valid_probability))
    }

    fn require_word(&self, word: &str) -> Result<PtNode> {
        self.find_word(word)?.ok_or(DictError::WordNotFound)
    }

    fn require_pt_node(&self, word: &str) -> Result<PtNode> {
        self.find_pt_node(word)?.ok_or(DictError::WordNotFound)
    }

    /// Unigram probability of `word`
    pub fn probability(&self, word: &str) -> Result<Option<u8>> {
        Ok(self.find_word(word)?.and_then(|node| node.probability()))
    }

    /// Insert `word` or update its probability
    ///
    /// New PtNodes are appended: a missing branch becomes a new segment
    /// forward-linked from the end of the array it belongs to, and a missing
    /// child array is written at the tail. Words that would require splitting
    /// an existing edge are rejected with [`DictError::EdgeSplitRequired`].
    pub fn add_word(&mut self, word: &str, probability: u8) -> Result<()> {
        let code_points = to_code_points(word)?;
        let mut array_pos = self.root_pos;
        let mut parent_pos = None;
        let mut matched = 0;
        loop {
            let rest = &code_points[matched..];
            let Some(node) = self.find_child_starting_with(array_pos, rest[0])? else {
                let segment = writing::append_pt_node_array(
                    &mut self.buffer,
                    &[PtNodeParams {
                        parent_pos,
                        code_points: rest.to_vec(),
                        probability: Some(probability),
                        children_pos: None,
                        bigrams_pos: None,
                    }],
                )?;
                return writing::link_pt_node_array_segment(&mut self.buffer, array_pos, segment);
            };

            let label = node.code_points();
            if !rest.starts_with(label) {
                return Err(DictError::EdgeSplitRequired(node.head_pos()));
            }
            matched += label.len();
            if matched == code_points.len() {
                return writing::update_terminal_probability(&mut self.buffer, &node, probability);
            }
            match node.children_pos() {
                Some(children_pos) => {
                    parent_pos = Some(node.head_pos());
                    array_pos = children_pos;
                }
                None => {
                    let children_pos = writing::append_pt_node_array(
                        &mut self.buffer,
                        &[PtNodeParams {
                            parent_pos: Some(node.head_pos()),
                            code_points: code_points[matched..].to_vec(),
                            probability: Some(probability),
                            children_pos: None,
                            bigrams_pos: None,
                        }],
                    )?;
                    return writing::update_children_pos(
                        &mut self.buffer,
                        &node,
                        Some(children_pos),
                    );
                }
            }
        }
    }

    /// Change the probability of an existing word
    pub fn set_probability(&mut self, word: &str, probability: u8) -> Result<()> {
        let node = self.require_word(word)?;
        writing::update_terminal_probability(&mut self.buffer, &node, probability)
    }

    /// Stop treating `word` as a word. Returns `false` if it was absent.
    ///
    /// The PtNode stays in place; the next GC cycle reclaims it if nothing
    /// below it is still a word.
    pub fn remove_word(&mut self, word: &str) -> Result<bool> {
        match self.find_word(word)? {
            Some(node) => {
                writing::clear_terminal(&mut self.buffer, &node)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Record that `next` follows `prev` with the given probability
    ///
    /// Both ends only need a live PtNode; entries whose target is not a word
    /// are dropped by the next GC cycle. Returns `true` when a new entry was
    /// added, `false` when an existing one was updated.
    pub fn add_bigram(&mut self, prev: &str, next: &str, probability: u8) -> Result<bool> {
        let prev_node = self.require_pt_node(prev)?;
        let next_node = self.require_pt_node(next)?;
        let mut head = prev_node.bigrams_pos();
        let added =
            bigram::add_or_update_entry(&mut self.buffer, &mut head, next_node.head_pos(), probability)?;
        if head != prev_node.bigrams_pos() {
            writing::update_bigrams_pos(&mut self.buffer, &prev_node, head)?;
        }
        Ok(added)
    }

    /// Remove the bigram `prev` → `next`. Returns `false` if it was absent.
    pub fn remove_bigram(&mut self, prev: &str, next: &str) -> Result<bool> {
        let prev_node = self.require_pt_node(prev)?;
        let Some(next_node) = self.find_pt_node(next)? else {
            return Ok(false);
        };
        let mut head = prev_node.bigrams_pos();
        let removed = bigram::remove_entry(&mut self.buffer, &mut head, next_node.head_pos())?;
        if head != prev_node.bigrams_pos() {
            writing::update_bigrams_pos(&mut self.buffer, &prev_node, head)?;
        }
        Ok(removed)
    }

    /// Words following `word`, in chain order
    pub fn bigrams(&self, word: &str) -> Result<Vec<(String, u8)>> {
        let node = self.require_pt_node(word)?;
        bigram::read_entries(&self.buffer, node.bigrams_pos())?
            .into_iter()
            .filter_map(|entry| entry.target_pos.map(|target| (target, entry.probability)))
            .map(|(target, probability)| Ok((self.word_at(target)?, probability)))
            .collect::<Result<Vec<_>>>()
    }

    /// Spell the path from the root to the PtNode at `pos` by following
    /// parent links
    pub fn word_at(&self, pos: DictPos) -> Result<String> {
        let mut labels = Vec::new();
        let mut next = Some(pos);
        let mut length = 0;
        while let Some(node_pos) = next {
            let node = PtNode::read(&self.buffer, node_pos)?;
            length += node.code_points().len();
            if length > MAX_WORD_LENGTH {
                return Err(DictError::CorruptedPtNode(node_pos));
            }
            next = node.parent_pos();
            labels.push(node);
        }
        labels
            .iter()
            .rev()
            .flat_map(|node| node.code_points().iter().map(move |&cp| (node.head_pos(), cp)))
            .map(|(node_pos, cp)| char::from_u32(cp).ok_or(DictError::CorruptedPtNode(node_pos)))
            .collect()
    }

    /// Every word with its probability, sorted by word
    pub fn words(&self) -> Result<Vec<(String, u8)>> {
        let mut collector = TerminalCollector {
            buffer: &self.buffer,
            terminals: Vec::new(),
        };
        traversal::traverse_all_pt_nodes_in_postorder_depth_first(&mut collector, self.root_pos)?;
        let mut words = collector
            .terminals
            .into_iter()
            .map(|(pos, probability)| Ok((self.word_at(pos)?, probability)))
            .collect::<Result<Vec<_>>>()?;
        words.sort();
        Ok(words)
    }
}

struct TerminalCollector<'a> {
    buffer: &'a ExtendableBuffer,
    terminals: Vec<(DictPos, u8)>,
}

impl TraversingEventListener for TerminalCollector<'_> {
    type Error = DictError;

    fn traversed_buffer(&self) -> &ExtendableBuffer {
        self.buffer
    }

    fn on_ascend(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_descend(&mut self, _pt_node_array_pos: DictPos) -> Result<()> {
        Ok(())
    }

    fn on_reading_pt_node_array_tail(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_visiting_pt_node(&mut self, node: &PtNode, _node_code_points: &[u32]) -> Result<()> {
        if !node.is_deleted() && node.has_valid_probability() {
            self.terminals.push((node.head_pos(), node.raw_probability()));
        }
        Ok(())
    }
}

/// Builds a compact dictionary from a word list in one go
#[derive(Debug, Clone, Default)]
pub struct DictionaryBuilder {
    words: BTreeMap<String, u8>,
    bigrams: Vec<(String, String, u8)>,
    max_size: Option<usize>,
}

/// Patricia node awaiting placement
struct PendingNode {
    code_points: Vec<u32>,
    probability: Option<u8>,
    children: Vec<PendingNode>,
}

/// Group sorted, distinct suffixes into sibling Patricia nodes
fn build_pending_nodes(entries: &[(&[u32], u8)]) -> Vec<PendingNode> {
    let mut nodes = Vec::new();
    let mut start = 0;
    while start < entries.len() {
        let first = entries[start].0[0];
        let end = start
            + entries[start..]
                .iter()
                .take_while(|(suffix, _)| suffix[0] == first)
                .count();
        let group = &entries[start..end];

        let mut prefix_len = group[0].0.len();
        for (suffix, _) in &group[1..] {
            prefix_len = prefix_len.min(
                group[0]
                    .0
                    .iter()
                    .zip(suffix.iter())
                    .take_while(|(a, b)| a == b)
                    .count(),
            );
        }

        let mut probability = None;
        let mut rest = Vec::new();
        for &(suffix, p) in group {
            if suffix.len() == prefix_len {
                probability = Some(p);
            } else {
                rest.push((&suffix[prefix_len..], p));
            }
        }
        nodes.push(PendingNode {
            code_points: group[0].0[..prefix_len].to_vec(),
            probability,
            children: build_pending_nodes(&rest),
        });
        start = end;
    }
    nodes
}

impl DictionaryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the size of the built buffer
    pub fn with_limit(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Add a word; a repeated word keeps the last probability
    pub fn add_word(mut self, word: &str, probability: u8) -> Self {
        self.words.insert(word.to_string(), probability);
        self
    }

    /// Add a bigram between two words of the list
    pub fn add_bigram(mut self, prev: &str, next: &str, probability: u8) -> Self {
        self.bigrams
            .push((prev.to_string(), next.to_string(), probability));
        self
    }

    /// Write the dictionary
    pub fn build(&self) -> Result<Dictionary> {
        let mut encoded = BTreeMap::new();
        for (word, &probability) in &self.words {
            encoded.insert(to_code_points(word)?, probability);
        }
        let entries: Vec<(&[u32], u8)> = encoded
            .iter()
            .map(|(code_points, &p)| (code_points.as_slice(), p))
            .collect();
        let roots = build_pending_nodes(&entries);

        let mut buffer = ExtendableBuffer::with_limit(self.max_size.unwrap_or(MAX_BUFFER_SIZE));
        let root_pos = write_pending_array(&mut buffer, &roots, None)?;
        let mut dict = Dictionary::from_parts(buffer, root_pos);
        for (prev, next, probability) in &self.bigrams {
            dict.add_bigram(prev, next, *probability)?;
        }
        Ok(dict)
    }
}

/// Write `nodes` as one array, then each child array after it
fn write_pending_array(
    buffer: &mut ExtendableBuffer,
    nodes: &[PendingNode],
    parent_pos: Option<DictPos>,
) -> Result<DictPos> {
    let params: Vec<PtNodeParams> = nodes
        .iter()
        .map(|node| PtNodeParams {
            parent_pos,
            code_points: node.code_points.clone(),
            probability: node.probability,
            children_pos: None,
            bigrams_pos: None,
        })
        .collect();
    let array_pos = writing::append_pt_node_array(buffer, &params)?;

    let mut cursor = PtNodeArrayCursor::new(buffer, array_pos)?;
    for pending in nodes {
        let node = cursor
            .next_node(buffer)?
            .ok_or(DictError::CorruptedPtNode(array_pos))?;
        if !pending.children.is_empty() {
            let children_pos =
                write_pending_array(buffer, &pending.children, Some(node.head_pos()))?;
            writing::update_children_pos(buffer, &node, Some(children_pos))?;
        }
    }
    Ok(array_pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(words: &[(&str, u8)]) -> Vec<(String, u8)> {
        words.iter().map(|&(w, p)| (w.to_string(), p)).collect()
    }

    #[test]
    fn test_empty_dictionary() {
        let dict = Dictionary::new().unwrap();
        assert_eq!(dict.root_pos(), DictPos::ZERO);
        assert!(dict.words().unwrap().is_empty());
        assert_eq!(dict.find_word("a").unwrap(), None);
    }

    #[test]
    fn test_builder_and_lookup() {
        let dict = DictionaryBuilder::new()
            .add_word("cat", 5)
            .add_word("cart", 3)
            .add_word("car", 2)
            .add_word("dog", 7)
            .build()
            .unwrap();

        assert_eq!(dict.probability("cat").unwrap(), Some(5));
        assert_eq!(dict.probability("car").unwrap(), Some(2));
        assert_eq!(dict.probability("ca").unwrap(), None);
        assert!(dict.find_pt_node("ca").unwrap().is_some());
        assert_eq!(dict.probability("cars").unwrap(), None);
        assert_eq!(
            dict.words().unwrap(),
            pairs(&[("car", 2), ("cart", 3), ("cat", 5), ("dog", 7)])
        );
    }

    #[test]
    fn test_zero_probability_is_not_a_word() {
        let mut dict = DictionaryBuilder::new()
            .add_word("cat", 5)
            .add_word("car", 0)
            .add_word("cart", 3)
            .build()
            .unwrap();
        assert!(dict.find_pt_node("car").unwrap().is_some());
        assert_eq!(dict.find_word("car").unwrap(), None);
        assert_eq!(dict.probability("car").unwrap(), None);
        assert_eq!(dict.words().unwrap(), pairs(&[("cart", 3), ("cat", 5)]));

        // The node still exists, so a bigram can point at it until a GC drops it.
        assert!(dict.add_bigram("cat", "car", 4).unwrap());
        assert_eq!(dict.bigrams("cat").unwrap(), pairs(&[("car", 4)]));
    }

    #[test]
    fn test_builder_splits_oversized_root_array() {
        let mut builder = DictionaryBuilder::new();
        let words: Vec<String> = (0x4E00u32..)
            .filter_map(char::from_u32)
            .take(crate::node::MAX_PT_NODE_ARRAY_SIZE + 10)
            .map(String::from)
            .collect();
        for word in &words {
            builder = builder.add_word(word, 2);
        }
        let dict = builder.build().unwrap();
        assert_eq!(dict.words().unwrap().len(), words.len());
        let last = words.last().unwrap();
        assert_eq!(dict.probability(last).unwrap(), Some(2));
        let node = dict.find_word(last).unwrap().unwrap();
        assert_eq!(&dict.word_at(node.head_pos()).unwrap(), last);
    }

    #[test]
    fn test_word_at_follows_parents() {
        let dict = DictionaryBuilder::new()
            .add_word("über", 1)
            .add_word("übel", 1)
            .build()
            .unwrap();
        let node = dict.find_word("übel").unwrap().unwrap();
        assert_eq!(dict.word_at(node.head_pos()).unwrap(), "übel");
    }

    #[test]
    fn test_add_word_into_existing_array_uses_forward_link() {
        let mut dict = DictionaryBuilder::new().add_word("cat", 5).build().unwrap();
        dict.add_word("dog", 3).unwrap();
        dict.add_word("cats", 1).unwrap();
        dict.add_word("cat", 9).unwrap();

        assert_eq!(
            dict.words().unwrap(),
            pairs(&[("cat", 9), ("cats", 1), ("dog", 3)])
        );
        let first_segment_size = dict.buffer().read_uint(dict.root_pos(), 2).unwrap();
        assert_eq!(first_segment_size, 1);
    }

    #[test]
    fn test_add_word_requiring_split_is_rejected() {
        let mut dict = DictionaryBuilder::new().add_word("cat", 5).build().unwrap();
        assert!(matches!(
            dict.add_word("car", 1),
            Err(DictError::EdgeSplitRequired(_))
        ));
        assert!(matches!(
            dict.add_word("ca", 1),
            Err(DictError::EdgeSplitRequired(_))
        ));
    }

    #[test]
    fn test_set_probability() {
        let mut dict = DictionaryBuilder::new().add_word("cat", 5).build().unwrap();
        dict.set_probability("cat", 9).unwrap();
        assert_eq!(dict.probability("cat").unwrap(), Some(9));
        assert_eq!(dict.set_probability("ca", 1), Err(DictError::WordNotFound));
    }

    #[test]
    fn test_remove_word_keeps_descendants() {
        let mut dict = DictionaryBuilder::new()
            .add_word("car", 1)
            .add_word("cart", 2)
            .build()
            .unwrap();
        assert!(dict.remove_word("car").unwrap());
        assert!(!dict.remove_word("car").unwrap());
        assert_eq!(dict.words().unwrap(), pairs(&[("cart", 2)]));
    }

    #[test]
    fn test_bigrams() {
        let mut dict = DictionaryBuilder::new()
            .add_word("good", 10)
            .add_word("morning", 8)
            .add_word("night", 6)
            .add_bigram("good", "morning", 4)
            .build()
            .unwrap();
        assert!(dict.add_bigram("good", "night", 3).unwrap());
        assert!(!dict.add_bigram("good", "morning", 5).unwrap());
        assert_eq!(
            dict.bigrams("good").unwrap(),
            pairs(&[("night", 3), ("morning", 5)])
        );

        assert!(dict.remove_bigram("good", "night").unwrap());
        assert!(!dict.remove_bigram("good", "night").unwrap());
        assert_eq!(dict.bigrams("good").unwrap(), pairs(&[("morning", 5)]));
        assert_eq!(
            dict.add_bigram("good", "evening", 1),
            Err(DictError::WordNotFound)
        );
    }

    #[test]
    fn test_buffer_limit_is_enforced() {
        let result = DictionaryBuilder::new()
            .add_word("abcdefghij", 1)
            .with_limit(16)
            .build();
        assert!(matches!(result, Err(DictError::CapacityExhausted { .. })));
    }

    #[test]
    fn test_invalid_words() {
        let dict = Dictionary::new().unwrap();
        assert_eq!(dict.find_word(""), Err(DictError::EmptyWord));
        let long = "a".repeat(MAX_WORD_LENGTH + 1);
        assert_eq!(
            dict.find_word(&long),
            Err(DictError::WordTooLong(MAX_WORD_LENGTH + 1))
        );
    }
}
