//! GC correctness tests
//!
//! These tests run full collection cycles through the public API and check
//! that the compacted dictionary describes the same words and bigrams as the
//! live part of the original one.

use ptdict::bigram;
use ptdict::node::{PT_NODE_ARRAY_SIZE_FIELD_SIZE, pt_node_size};
use ptdict::writing::{self, PtNodeParams};
use ptdict::{DictError, DictPos, Dictionary, DictionaryBuilder};
use ptdict_gc::{Collector, GcConfig, GcError, ReferenceKind, verify_compacted_dictionary};

type Snapshot = Vec<(String, u8, Vec<(String, u8)>)>;

/// Every word with its probability and bigrams
fn snapshot(dict: &Dictionary) -> Snapshot {
    dict.words()
        .unwrap()
        .into_iter()
        .map(|(word, probability)| {
            let mut bigrams = dict.bigrams(&word).unwrap();
            bigrams.sort();
            (word, probability, bigrams)
        })
        .collect()
}

fn collector() -> Collector {
    Collector::with_config(GcConfig::default().with_verify_after_compaction(true))
}

fn sample() -> Dictionary {
    DictionaryBuilder::new()
        .add_word("car", 1)
        .add_word("cart", 3)
        .add_word("cat", 5)
        .add_word("dog", 2)
        .add_word("door", 4)
        .add_bigram("cat", "dog", 7)
        .add_bigram("cart", "cat", 6)
        .add_bigram("dog", "car", 2)
        .add_bigram("door", "cart", 1)
        .build()
        .unwrap()
}

#[test]
fn test_cat_car_cart_dog_scenario() {
    let mut dict = DictionaryBuilder::new()
        .add_word("cat", 5)
        .add_word("car", 0)
        .add_word("cart", 3)
        .add_word("dog", 0)
        .add_bigram("cat", "dog", 7)
        .add_bigram("cart", "cat", 6)
        .build()
        .unwrap();

    let report = collector().collect(&mut dict).unwrap();

    // Only "dog" is useless: "car" still leads to "cart".
    assert_eq!(report.marked_pt_nodes, 1);
    assert_eq!(report.pruned_bigram_entries, 1);
    assert!(dict.find_pt_node("car").unwrap().is_some());
    assert!(dict.find_word("car").unwrap().is_none());
    assert!(dict.find_pt_node("dog").unwrap().is_none());
    assert_eq!(
        dict.words().unwrap(),
        vec![("cart".to_string(), 3), ("cat".to_string(), 5)]
    );
    assert!(dict.bigrams("cat").unwrap().is_empty());
    assert_eq!(dict.bigrams("cart").unwrap(), vec![("cat".to_string(), 6)]);
}

#[test]
fn test_removed_words_behave_like_zero_probability() {
    let mut dict = DictionaryBuilder::new()
        .add_word("cat", 5)
        .add_word("car", 1)
        .add_word("cart", 3)
        .add_word("dog", 2)
        .add_bigram("cat", "dog", 7)
        .build()
        .unwrap();
    dict.remove_word("car").unwrap();
    dict.remove_word("dog").unwrap();

    let report = collector().collect(&mut dict).unwrap();
    assert_eq!(report.marked_pt_nodes, 1);
    assert_eq!(report.pruned_bigram_entries, 1);
    assert!(dict.find_pt_node("car").unwrap().is_some());
    assert!(dict.find_pt_node("dog").unwrap().is_none());
}

#[test]
fn test_live_words_and_bigrams_survive() {
    let mut dict = sample();
    let before = snapshot(&dict);

    let report = collector().collect(&mut dict).unwrap();
    assert_eq!(report.marked_pt_nodes, 0);
    assert_eq!(report.pruned_bigram_entries, 0);
    assert_eq!(snapshot(&dict), before);
}

#[test]
fn test_removed_words_are_reclaimed() {
    let mut dict = sample();
    dict.remove_word("door").unwrap();
    dict.remove_word("cart").unwrap();
    let mut expected = snapshot(&dict);
    for (_, _, bigrams) in &mut expected {
        bigrams.retain(|(target, _)| target != "door" && target != "cart");
    }

    let report = collector().collect(&mut dict).unwrap();
    assert_eq!(snapshot(&dict), expected);
    assert!(report.reclaimed() > 0);
    assert!(dict.find_pt_node("door").unwrap().is_none());
    assert!(dict.find_pt_node("cart").unwrap().is_none());
}

#[test]
fn test_compacted_buffer_has_no_garbage() {
    let mut dict = DictionaryBuilder::new()
        .add_word("ant", 1)
        .add_word("bee", 2)
        .add_word("cow", 3)
        .build()
        .unwrap();
    dict.remove_word("bee").unwrap();

    collector().collect(&mut dict).unwrap();
    verify_compacted_dictionary(dict.buffer(), dict.root_pos()).unwrap();
    assert_eq!(
        dict.size(),
        PT_NODE_ARRAY_SIZE_FIELD_SIZE + 2 * pt_node_size(3) + 3
    );
    assert_eq!(dict.buffer().read_uint(DictPos::ZERO, 2).unwrap(), 2);
}

#[test]
fn test_forward_linked_segments_are_merged() {
    let mut dict = DictionaryBuilder::new()
        .add_word("cat", 5)
        .add_word("car", 1)
        .build()
        .unwrap();
    dict.add_word("dog", 2).unwrap();
    dict.add_word("cab", 4).unwrap();
    dict.add_word("eel", 3).unwrap();
    dict.add_bigram("eel", "cab", 9).unwrap();
    assert!(verify_compacted_dictionary(dict.buffer(), dict.root_pos()).is_err());
    let before = snapshot(&dict);

    let report = collector().collect(&mut dict).unwrap();
    assert_eq!(snapshot(&dict), before);
    assert_eq!(report.written_pt_node_arrays, 2);
    let verified = verify_compacted_dictionary(dict.buffer(), dict.root_pos()).unwrap();
    // ca, dog, eel, b, r, t
    assert_eq!(verified.pt_nodes, 6);
    assert_eq!(verified.pt_node_arrays, 2);
}

#[test]
fn test_root_array_beyond_one_size_field_is_compacted() {
    let words: Vec<String> = (0x4E00u32..)
        .filter_map(char::from_u32)
        .take(70_000)
        .map(String::from)
        .collect();
    let mut builder = DictionaryBuilder::new();
    for word in &words {
        builder = builder.add_word(word, 1);
    }
    let mut dict = builder.build().unwrap();
    dict.remove_word(&words[0]).unwrap();
    dict.add_bigram(&words[69_999], &words[1], 4).unwrap();

    let report = collector().collect(&mut dict).unwrap();
    assert_eq!(report.marked_pt_nodes, 1);
    assert_eq!(report.written_pt_nodes, 69_999);
    assert_eq!(dict.words().unwrap().len(), 69_999);
    assert!(dict.find_pt_node(&words[0]).unwrap().is_none());
    assert_eq!(
        dict.bigrams(&words[69_999]).unwrap(),
        vec![(words[1].clone(), 4)]
    );
    assert_eq!(
        dict.buffer().read_uint(DictPos::ZERO, 2).unwrap(),
        u32::from(u16::MAX)
    );
    let verified = verify_compacted_dictionary(dict.buffer(), dict.root_pos()).unwrap();
    assert_eq!(verified.pt_nodes, 69_999);
    assert_eq!(verified.pt_node_arrays, 1);
}

#[test]
fn test_parents_and_bigram_targets_are_relocated() {
    let mut dict = sample();
    dict.remove_word("car").unwrap();
    dict.remove_word("dog").unwrap();
    collector().collect(&mut dict).unwrap();

    for (word, _) in dict.words().unwrap() {
        let node = dict.find_word(&word).unwrap().unwrap();
        assert_eq!(dict.word_at(node.head_pos()).unwrap(), word);
    }
    let door = dict.find_word("door").unwrap().unwrap();
    let entries = bigram::read_entries(dict.buffer(), door.bigrams_pos()).unwrap();
    assert_eq!(entries.len(), 1);
    let cart = dict.find_word("cart").unwrap().unwrap();
    assert_eq!(entries[0].target_pos, Some(cart.head_pos()));
}

#[test]
fn test_emptied_child_array_is_dropped() {
    let mut dict = DictionaryBuilder::new()
        .add_word("ca", 1)
        .add_word("cab", 2)
        .add_word("cat", 3)
        .build()
        .unwrap();
    dict.remove_word("cab").unwrap();
    dict.remove_word("cat").unwrap();

    let report = collector().collect(&mut dict).unwrap();
    assert_eq!(report.elided_pt_node_arrays, 1);
    let ca = dict.find_word("ca").unwrap().unwrap();
    assert_eq!(ca.children_pos(), None);
    assert_eq!(dict.words().unwrap(), vec![("ca".to_string(), 1)]);
}

#[test]
fn test_emptied_child_array_can_be_kept() {
    let mut dict = DictionaryBuilder::new()
        .add_word("ca", 1)
        .add_word("cat", 3)
        .build()
        .unwrap();
    dict.remove_word("cat").unwrap();

    let mut collector = Collector::with_config(
        GcConfig::default()
            .with_elide_empty_pt_node_arrays(false)
            .with_verify_after_compaction(true),
    );
    let report = collector.collect(&mut dict).unwrap();
    assert_eq!(report.elided_pt_node_arrays, 0);
    let children = dict
        .find_word("ca")
        .unwrap()
        .unwrap()
        .children_pos()
        .unwrap();
    assert_eq!(dict.buffer().read_uint(children, 2).unwrap(), 0);
}

#[test]
fn test_second_cycle_is_a_no_op() {
    let mut dict = sample();
    dict.remove_word("dog").unwrap();
    dict.add_word("eel", 2).unwrap();
    let mut collector = collector();
    collector.collect(&mut dict).unwrap();
    let first = dict.buffer().as_bytes().to_vec();

    let report = collector.collect(&mut dict).unwrap();
    assert_eq!(report.marked_pt_nodes, 0);
    assert_eq!(report.pruned_bigram_entries, 0);
    assert_eq!(report.reclaimed(), 0);
    assert_eq!(dict.buffer().as_bytes(), first.as_slice());
    assert_eq!(collector.stats().collections, 2);
}

#[test]
fn test_everything_removed_leaves_empty_root() {
    let mut dict = sample();
    for (word, _) in dict.words().unwrap() {
        dict.remove_word(&word).unwrap();
    }
    collector().collect(&mut dict).unwrap();
    assert!(dict.words().unwrap().is_empty());
    assert_eq!(dict.root_pos(), DictPos::ZERO);
    assert_eq!(dict.size(), PT_NODE_ARRAY_SIZE_FIELD_SIZE + 3);
}

#[test]
fn test_empty_dictionary() {
    let mut dict = Dictionary::new().unwrap();
    let report = collector().collect(&mut dict).unwrap();
    assert_eq!(report.written_pt_nodes, 0);
    assert_eq!(report.reclaimed(), 0);
    assert!(dict.words().unwrap().is_empty());
}

#[test]
fn test_capacity_exhaustion_keeps_dictionary() {
    let mut dict = sample();
    dict.remove_word("door").unwrap();
    let before = snapshot(&dict);
    let root = dict.root_pos();

    let mut collector = Collector::with_config(GcConfig::default().with_max_buffer_size(32));
    let err = collector.collect(&mut dict).unwrap_err();
    assert!(err.is_capacity_exhausted());
    assert_eq!(collector.stats().aborted_collections, 1);

    // Deletion marks and pruned entries stay behind, but the dictionary
    // still says the same thing.
    assert_eq!(dict.root_pos(), root);
    assert_eq!(snapshot(&dict), before);

    let mut retry = Collector::new();
    retry.collect(&mut dict).unwrap();
    assert_eq!(snapshot(&dict), before);
}

#[test]
fn test_corrupted_bigram_chain_aborts() {
    let mut dict = sample();
    let cat = dict.find_word("cat").unwrap().unwrap();
    let head = cat.bigrams_pos().unwrap();
    // Point the only entry's next field back at itself.
    let next_field = head.advance(4).unwrap();
    dict.buffer_mut()
        .write_uint(next_field, head.offset() as u32, 3)
        .unwrap();
    let before = dict.clone();

    let err = collector().collect(&mut dict).unwrap_err();
    assert!(matches!(
        err,
        GcError::Dict(DictError::CorruptedBigramChain(_))
    ));
    assert_eq!(dict, before);
}

#[test]
fn test_unreachable_bigram_target_is_dangling() {
    let mut dict = sample();
    // A terminal node that no array of the trie links to.
    let orphan_array = writing::append_pt_node_array(
        dict.buffer_mut(),
        &[PtNodeParams {
            parent_pos: None,
            code_points: "zzz".chars().map(u32::from).collect(),
            probability: Some(1),
            children_pos: None,
            bigrams_pos: None,
        }],
    )
    .unwrap();
    let orphan = orphan_array.advance(PT_NODE_ARRAY_SIZE_FIELD_SIZE).unwrap();
    let cat = dict.find_word("cat").unwrap().unwrap();
    let mut head = cat.bigrams_pos();
    bigram::add_or_update_entry(dict.buffer_mut(), &mut head, orphan, 3).unwrap();
    writing::update_bigrams_pos(dict.buffer_mut(), &cat, head).unwrap();
    let before = dict.clone();

    let err = collector().collect(&mut dict).unwrap_err();
    assert_eq!(
        err,
        GcError::DanglingReference {
            kind: ReferenceKind::BigramTarget,
            pos: orphan,
        }
    );
    assert_eq!(dict, before);
}
