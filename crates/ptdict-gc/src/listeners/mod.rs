//! Traversal listeners implementing the four GC passes
//!
//! Each listener is driven by one full walk of the trie and runs strictly
//! after the previous one has completed:
//!
//! 1. [`MarkUselessPtNodesAsDeleted`]: post-order over the source buffer
//! 2. [`PruneUselessBigrams`]: post-order over the source buffer
//! 3. [`PlaceAndWriteValidPtNodes`]: array-level pre-order over the source,
//!    writing to the destination
//! 4. [`UpdateAllPositionFields`]: array-level pre-order over the destination

mod mark_useless;
mod place_and_write;
mod prune_bigrams;
mod update_positions;

pub use mark_useless::MarkUselessPtNodesAsDeleted;
pub use place_and_write::PlaceAndWriteValidPtNodes;
pub use prune_bigrams::PruneUselessBigrams;
pub use update_positions::UpdateAllPositionFields;
