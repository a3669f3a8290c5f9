//! Dictionary errors

use thiserror::Error;

use crate::pos::DictPos;

/// Errors that can occur while reading or writing a dictionary buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DictError {
    /// A read or write touched bytes outside the valid region
    #[error("Position {pos} out of bounds (buffer size {size})")]
    OutOfBounds {
        /// First byte of the access
        pos: usize,
        /// Buffer size at the time of the access
        size: usize,
    },

    /// The buffer would have to grow past its limit
    #[error("Buffer capacity exhausted: {required} bytes required, limit is {limit}")]
    CapacityExhausted {
        /// Size the buffer would need
        required: usize,
        /// Configured limit
        limit: usize,
    },

    /// A PtNode record could not be decoded
    #[error("Corrupted PtNode at {0}")]
    CorruptedPtNode(DictPos),

    /// A PtNode array header or forward link is inconsistent
    #[error("Corrupted PtNode array at {0}")]
    CorruptedPtNodeArray(DictPos),

    /// A bigram chain is unreadable or loops
    #[error("Corrupted bigram chain at {0}")]
    CorruptedBigramChain(DictPos),

    /// The trie is deeper than any word could be, which means a child link loops
    #[error("Traversal exceeded maximum depth {0}")]
    TraversalTooDeep(usize),

    /// Code point outside the Unicode range
    #[error("Invalid code point: {0:#x}")]
    InvalidCodePoint(u32),

    /// Word longer than the format allows
    #[error("Word too long: {0} code points")]
    WordTooLong(usize),

    /// Empty words cannot be stored
    #[error("Empty word")]
    EmptyWord,

    /// The word is not present as a terminal PtNode
    #[error("Word not found")]
    WordNotFound,

    /// Inserting the word would split an existing PtNode edge
    #[error("Inserting word requires splitting the PtNode at {0}")]
    EdgeSplitRequired(DictPos),

    /// A PtNode array segment cannot hold more nodes
    #[error("PtNode array at {0} is full")]
    PtNodeArrayFull(DictPos),
}

/// Result type for dictionary operations
pub type Result<T> = std::result::Result<T, DictError>;
