//! GC errors

use std::fmt;

use ptdict::{DictError, DictPos};
use thiserror::Error;

/// Kind of position field a relocation was attempted for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// PtNode parent field
    Parent,
    /// PtNode children field
    Children,
    /// Bigram entry target
    BigramTarget,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parent => "parent",
            Self::Children => "children",
            Self::BigramTarget => "bigram target",
        })
    }
}

/// Errors that abort a GC cycle
///
/// Every variant is fatal to the cycle: the destination buffer is dropped and
/// the dictionary keeps its source buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GcError {
    /// Buffer access failed, a structure is corrupted, or the destination
    /// buffer ran out of room
    #[error(transparent)]
    Dict(#[from] DictError),

    /// A reference points at a position that was not written to the
    /// destination buffer
    #[error("Dangling {kind} reference to {pos}: no relocation entry")]
    DanglingReference {
        /// Field being relocated
        kind: ReferenceKind,
        /// Stale source position
        pos: DictPos,
    },

    /// More ascends than descends were reported
    #[error("Unbalanced traversal: ascend without matching descend")]
    UnbalancedTraversal,

    /// The compacted buffer failed its consistency check
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

impl GcError {
    /// Check if the destination buffer ran out of room
    pub fn is_capacity_exhausted(&self) -> bool {
        matches!(self, Self::Dict(DictError::CapacityExhausted { .. }))
    }
}

/// Result type for GC operations
pub type Result<T> = std::result::Result<T, GcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_reference_message() {
        let err = GcError::DanglingReference {
            kind: ReferenceKind::BigramTarget,
            pos: DictPos::new(0x20).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Dangling bigram target reference to 0x000020: no relocation entry"
        );
    }

    #[test]
    fn test_capacity_exhausted_is_detected() {
        let err: GcError = DictError::CapacityExhausted {
            required: 10,
            limit: 4,
        }
        .into();
        assert!(err.is_capacity_exhausted());
        assert!(!GcError::UnbalancedTraversal.is_capacity_exhausted());
    }
}
