//! Run statistics.

use log::info;

/// Counters collected over one co-simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Full clock ticks (two evaluations each)
    pub ticks: u64,
    /// Ticks spent with reset held
    pub reset_ticks: u64,
    /// Cycles in which the device signalled ready
    pub ready_cycles: u64,
    /// Batches whose transfer started
    pub batches_started: u64,
    /// Batches fully transferred and dequeued
    pub batches_completed: u64,
    /// Bytes accepted by the link
    pub bytes_sent: u64,
    /// Delivery attempts the link turned down
    pub bytes_rejected: u64,
    /// Cross-validation samples over tolerance
    pub mismatches: u64,
}

impl RunStats {
    pub fn log_summary(&self) {
        info!("Run statistics");
        info!("  Ticks:              {} ({} in reset)", self.ticks, self.reset_ticks);
        info!("  Samples:            {}", self.ready_cycles);
        info!(
            "  Batches:            {} started, {} completed",
            self.batches_started, self.batches_completed
        );
        info!(
            "  Link bytes:         {} sent, {} rejected",
            self.bytes_sent, self.bytes_rejected
        );
        info!("  Model mismatches:   {}", self.mismatches);
    }
}
