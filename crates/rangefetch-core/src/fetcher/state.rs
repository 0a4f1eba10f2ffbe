//! Per-unit bookkeeping.

use std::time::Instant;

/// Terminal or running status of one fetch unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Running,
    Completed,
    Failed(String),
    /// Stopped by the cancel token or because nobody listens anymore.
    Cancelled,
    /// The unit's thread died instead of reporting a result.
    Crashed(i32),
}

impl UnitStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UnitStatus::Running)
    }
}

/// State of one unit. The fetcher thread owns the live copy; the coordinator
/// keeps its own copy rebuilt from the events the unit publishes.
#[derive(Debug, Clone)]
pub struct UnitState {
    pub index: usize,
    /// Assigned limit in bytes per second (0 = unlimited).
    pub speed_limit: u64,
    /// Cumulative bytes received by this unit.
    pub downloaded: u64,
    pub last_chunk_at: Option<Instant>,
    pub status: UnitStatus,
}

impl UnitState {
    pub fn new(index: usize, speed_limit: u64) -> Self {
        Self {
            index,
            speed_limit,
            downloaded: 0,
            last_chunk_at: None,
            status: UnitStatus::Running,
        }
    }

    /// Count a chunk; returns the new cumulative byte count.
    pub fn record_chunk(&mut self, len: usize, at: Instant) -> u64 {
        self.downloaded += len as u64;
        self.last_chunk_at = Some(at);
        self.downloaded
    }

    pub fn finish(&mut self, status: UnitStatus) {
        if !self.status.is_terminal() {
            self.status = status;
        }
    }
}
