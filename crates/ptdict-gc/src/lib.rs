//! # Patricia Trie Dictionary Garbage Collector
//!
//! Four-pass mark-compact collector for [`ptdict`] buffers.
//!
//! ## Design
//!
//! - **Mark**: post-order walk flags PtNodes that are not words and lead to no
//!   word as deleted
//! - **Prune**: post-order walk unlinks bigram entries whose target stopped
//!   being a word
//! - **Place**: array-level pre-order walk copies live PtNodes into a fresh
//!   buffer, one contiguous segment per array, recording old to new positions
//! - **Update**: array-level pre-order walk over the fresh buffer rewrites
//!   parent, children and bigram target positions
//!
//! The fresh buffer replaces the dictionary's buffer only once every pass has
//! succeeded.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod collector;
pub mod config;
pub mod error;
pub mod listeners;
pub mod relocation;
pub mod verify;

pub use collector::{Collector, Compacted, GcReport, GcStats, compact};
pub use config::GcConfig;
pub use error::{GcError, ReferenceKind, Result};
pub use relocation::{DestPos, DictPositionRelocationMap, SourcePos};
pub use verify::{VerificationReport, verify_compacted_dictionary};
