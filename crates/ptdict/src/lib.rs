//! # Patricia Trie Dictionary
//!
//! On-disk/in-memory dictionary store for a predictive-text engine.
//!
//! ## Design
//!
//! - **Position addressed**: every cross-reference (parent, children, bigram
//!   target) is a 3-byte offset into one [`ExtendableBuffer`]
//! - **Append only records**: edits append new records or rewrite fixed-width
//!   fields in place; nothing is physically removed until a GC cycle
//!   rewrites the buffer
//! - **Forward-linked arrays**: a PtNode array grows by chaining segments
//! - **Event driven traversal**: maintenance passes plug into the walk via
//!   [`TraversingEventListener`]

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bigram;
pub mod buffer;
pub mod dictionary;
pub mod error;
pub mod node;
pub mod pos;
pub mod traversal;
pub mod writing;

pub use bigram::BigramEntry;
pub use buffer::ExtendableBuffer;
pub use dictionary::{Dictionary, DictionaryBuilder};
pub use error::{DictError, Result};
pub use node::{PtNode, PtNodeArrayCursor};
pub use pos::{DictPos, MAX_BUFFER_SIZE, NOT_A_DICT_POS};
pub use traversal::TraversingEventListener;
pub use writing::PtNodeParams;

/// Longest word, in code points, the format can store
pub const MAX_WORD_LENGTH: usize = 48;
