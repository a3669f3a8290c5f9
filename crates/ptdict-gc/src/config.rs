//! Collector configuration

use ptdict::MAX_BUFFER_SIZE;
use serde::{Deserialize, Serialize};

/// GC configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Size limit of the destination buffer (default: 16MB - 1)
    pub max_buffer_size: usize,
    /// Destination capacity reserved up front, as a fraction of the source
    /// size (default: 1.0)
    pub initial_capacity_ratio: f64,
    /// Leave out non-root PtNode arrays whose nodes were all deleted
    /// (default: true)
    pub elide_empty_pt_node_arrays: bool,
    /// Check the compacted buffer before committing it (default: on in debug
    /// builds)
    pub verify_after_compaction: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: MAX_BUFFER_SIZE, // 16MB - 1
            initial_capacity_ratio: 1.0,
            elide_empty_pt_node_arrays: true,
            verify_after_compaction: cfg!(debug_assertions),
        }
    }
}

impl GcConfig {
    /// Set the destination buffer size limit
    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size.min(MAX_BUFFER_SIZE);
        self
    }

    /// Set the initial destination capacity ratio
    pub fn with_initial_capacity_ratio(mut self, ratio: f64) -> Self {
        self.initial_capacity_ratio = ratio.max(0.0);
        self
    }

    /// Set whether empty PtNode arrays are elided
    pub fn with_elide_empty_pt_node_arrays(mut self, elide: bool) -> Self {
        self.elide_empty_pt_node_arrays = elide;
        self
    }

    /// Set whether the compacted buffer is verified before commit
    pub fn with_verify_after_compaction(mut self, verify: bool) -> Self {
        self.verify_after_compaction = verify;
        self
    }

    /// Capacity to reserve for a destination buffer given the source size
    pub fn initial_capacity(&self, source_size: usize) -> usize {
        let capacity = (source_size as f64 * self.initial_capacity_ratio) as usize;
        capacity.min(self.max_buffer_size)
    }
}
