//! Mark-compact garbage collector

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use ptdict::traversal::{
    traverse_all_pt_nodes_in_postorder_depth_first,
    traverse_all_pt_nodes_in_pt_node_array_level_preorder_depth_first,
};
use ptdict::{DictPos, Dictionary, ExtendableBuffer, TraversingEventListener};
use serde::Serialize;

use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::listeners::{
    MarkUselessPtNodesAsDeleted, PlaceAndWriteValidPtNodes, PruneUselessBigrams,
    UpdateAllPositionFields,
};
use crate::relocation::{DictPositionRelocationMap, SourcePos};
use crate::verify::verify_compacted_dictionary;

/// Garbage collector
///
/// Each cycle rebuilds the dictionary buffer from scratch. The dictionary is
/// only touched again once every pass has succeeded, when the compacted
/// buffer replaces the old one.
#[derive(Debug, Default)]
pub struct Collector {
    config: GcConfig,
    /// Statistics
    stats: GcStats,
}

/// GC statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct GcStats {
    /// Number of committed collections
    pub collections: u64,
    /// Number of collections that failed and left the dictionary untouched
    pub aborted_collections: u64,
    /// Total time spent in GC (nanoseconds)
    pub total_time_ns: u64,
    /// Bytes reclaimed in last collection
    pub last_reclaimed: usize,
    /// PtNodes kept in last collection
    pub last_live_pt_nodes: usize,
}

/// Outcome of one committed collection
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct GcReport {
    /// PtNodes found useless and marked deleted
    pub marked_pt_nodes: usize,
    /// Bigram entries unlinked because their target was no longer a word
    pub pruned_bigram_entries: usize,
    /// PtNodes copied to the new buffer
    pub written_pt_nodes: usize,
    /// Deleted PtNodes left behind
    pub skipped_pt_nodes: usize,
    /// PtNode arrays written
    pub written_pt_node_arrays: usize,
    /// Non-root PtNode arrays left out because they became empty
    pub elided_pt_node_arrays: usize,
    /// Parent, children and bigram target fields rewritten
    pub relocated_fields: usize,
    /// Buffer size before the cycle
    pub source_size: usize,
    /// Buffer size after the cycle
    pub dest_size: usize,
    /// Time taken by the cycle
    pub elapsed: Duration,
}

impl GcReport {
    /// Bytes saved by the cycle
    pub fn reclaimed(&self) -> usize {
        self.source_size.saturating_sub(self.dest_size)
    }
}

/// Compacted buffer produced by [`compact`], not yet committed
#[derive(Debug)]
pub struct Compacted {
    /// New dictionary buffer
    pub buffer: ExtendableBuffer,
    /// Root array position in `buffer`
    pub root_pos: DictPos,
    /// Pass counts
    pub report: GcReport,
}

#[derive(Debug, Clone, Copy)]
enum TraversalOrder {
    PostOrder,
    PtNodeArrayLevelPreOrder,
}

fn run_pass(
    name: &'static str,
    order: TraversalOrder,
    listener: &mut dyn TraversingEventListener<Error = GcError>,
    root_pos: DictPos,
) -> Result<()> {
    #[cfg(feature = "gc_logging")]
    tracing::trace!(target: "ptdict::gc", pass = name, ?order, root = %root_pos, "GC pass starting");
    #[cfg(not(feature = "gc_logging"))]
    let _ = name;

    match order {
        TraversalOrder::PostOrder => {
            traverse_all_pt_nodes_in_postorder_depth_first(listener, root_pos)
        }
        TraversalOrder::PtNodeArrayLevelPreOrder => {
            traverse_all_pt_nodes_in_pt_node_array_level_preorder_depth_first(listener, root_pos)
        }
    }
}

/// Run all four passes over `source` and build a compacted buffer
///
/// The first two passes mark deleted PtNodes and unlink bigram entries in
/// `source` itself. Both edits leave the set of words and bigrams it
/// describes unchanged, so `source` stays a valid dictionary buffer when a
/// later pass fails.
pub fn compact(
    source: &mut ExtendableBuffer,
    root_pos: DictPos,
    config: &GcConfig,
) -> Result<Compacted> {
    let mut report = GcReport {
        source_size: source.len(),
        ..GcReport::default()
    };

    let mut marker = MarkUselessPtNodesAsDeleted::new(source);
    run_pass("mark", TraversalOrder::PostOrder, &mut marker, root_pos)?;
    report.marked_pt_nodes = marker.marked_count();

    let mut pruner = PruneUselessBigrams::new(source);
    run_pass("prune", TraversalOrder::PostOrder, &mut pruner, root_pos)?;
    report.pruned_bigram_entries = pruner.pruned_count();

    let source: &ExtendableBuffer = source;
    let mut dest = ExtendableBuffer::with_capacity_and_limit(
        config.initial_capacity(source.len()),
        config.max_buffer_size,
    );
    let mut relocation_map = DictPositionRelocationMap::new();

    let mut placer =
        PlaceAndWriteValidPtNodes::new(source, &mut dest, &mut relocation_map, root_pos)
            .with_elide_empty_arrays(config.elide_empty_pt_node_arrays);
    run_pass(
        "place",
        TraversalOrder::PtNodeArrayLevelPreOrder,
        &mut placer,
        root_pos,
    )?;
    report.written_pt_nodes = placer.written_pt_nodes();
    report.skipped_pt_nodes = placer.skipped_pt_nodes();
    report.written_pt_node_arrays = placer.written_arrays();
    report.elided_pt_node_arrays = placer.elided_arrays();

    let new_root_pos = relocation_map
        .relocate_pt_node_array(SourcePos::new(root_pos))?
        .ok_or_else(|| GcError::VerificationFailed("Root PtNode array was elided".to_string()))?
        .get();

    let mut updater = UpdateAllPositionFields::new(&mut dest, &relocation_map);
    run_pass(
        "update",
        TraversalOrder::PtNodeArrayLevelPreOrder,
        &mut updater,
        new_root_pos,
    )?;
    report.relocated_fields = updater.relocated_count();

    if config.verify_after_compaction {
        let _verified = verify_compacted_dictionary(&dest, new_root_pos)?;
        #[cfg(feature = "gc_logging")]
        tracing::trace!(
            target: "ptdict::gc",
            pt_nodes = _verified.pt_nodes,
            pt_node_arrays = _verified.pt_node_arrays,
            bigram_entries = _verified.bigram_entries,
            "Compacted buffer verified"
        );
    }

    report.dest_size = dest.len();
    Ok(Compacted {
        buffer: dest,
        root_pos: new_root_pos,
        report,
    })
}

impl Collector {
    /// Create new collector with default config
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create new collector with custom config
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            config,
            stats: GcStats::default(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Get GC statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Run a full GC cycle
    ///
    /// On success the dictionary holds the compacted buffer. On failure the
    /// compacted buffer is dropped and the dictionary still describes the same
    /// words and bigrams as before.
    pub fn collect(&mut self, dict: &mut Dictionary) -> Result<GcReport> {
        let start = Instant::now();
        let root_pos = dict.root_pos();

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "ptdict::gc",
            buffer_bytes = dict.size(),
            root = %root_pos,
            "GC cycle starting"
        );

        let compacted = match compact(dict.buffer_mut(), root_pos, &self.config) {
            Ok(compacted) => compacted,
            Err(err) => {
                self.stats.aborted_collections += 1;
                #[cfg(feature = "gc_logging")]
                tracing::warn!(
                    target: "ptdict::gc",
                    error = %err,
                    capacity_exhausted = err.is_capacity_exhausted(),
                    "GC cycle aborted, keeping the old buffer"
                );
                return Err(err);
            }
        };

        let Compacted {
            buffer,
            root_pos,
            mut report,
        } = compacted;
        dict.replace_buffer(buffer, root_pos);

        let elapsed = start.elapsed();
        report.elapsed = elapsed;

        self.stats.collections += 1;
        self.stats.total_time_ns += elapsed.as_nanos() as u64;
        self.stats.last_reclaimed = report.reclaimed();
        self.stats.last_live_pt_nodes = report.written_pt_nodes;

        #[cfg(feature = "gc_logging")]
        tracing::info!(
            target: "ptdict::gc",
            collection = self.stats.collections,
            reclaimed_bytes = report.reclaimed(),
            pause_us = elapsed.as_micros() as u64,
            live_bytes = report.dest_size,
            live_pt_nodes = report.written_pt_nodes,
            deleted_pt_nodes = report.skipped_pt_nodes,
            pruned_bigrams = report.pruned_bigram_entries,
            "GC cycle complete"
        );

        Ok(report)
    }

    /// Run a full GC cycle on a dictionary shared between threads
    ///
    /// Holds the write lock for the whole cycle, so readers never observe a
    /// half-built buffer.
    pub fn collect_shared(&mut self, dict: &RwLock<Dictionary>) -> Result<GcReport> {
        let mut guard = dict.write();
        self.collect(&mut guard)
    }
}
