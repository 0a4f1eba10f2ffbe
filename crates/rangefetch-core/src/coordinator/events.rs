//! Events a download reports to its session.

use tokio::sync::mpsc;

/// Bytes received by one unit, with the download-wide total after them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEvent {
    pub unit_index: usize,
    pub chunk: Vec<u8>,
    /// Cumulative bytes received by this unit.
    pub unit_downloaded: u64,
    /// Download-wide total including this chunk.
    pub progress: u64,
    pub total_size: u64,
    pub thread_count: usize,
}

impl ChunkEvent {
    pub fn chunk_size(&self) -> usize {
        self.chunk.len()
    }
}

/// A per-unit (`unit_index` set) or coordinator-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub unit_index: Option<usize>,
    pub message: String,
}

/// Final accounting, sent once every unit is terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub total_size: u64,
    pub downloaded: u64,
    pub thread_count: usize,
    pub completed_units: usize,
    /// Units that failed or crashed, ascending.
    pub failed_units: Vec<usize>,
    /// True when the download was abandoned (client gone or cancelled).
    pub cancelled: bool,
}

impl DownloadSummary {
    /// All bytes arrived and no unit failed.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed_units.is_empty() && self.downloaded == self.total_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Chunk(ChunkEvent),
    Error(ErrorEvent),
    /// A unit's thread terminated abnormally.
    WorkerStopped { unit_index: usize, code: i32 },
    Completed(DownloadSummary),
}

/// Where a coordinator sends its events: the originating session's outbound
/// queue, in whatever message type that queue carries.
#[derive(Debug)]
pub struct EventSink<M> {
    tx: mpsc::Sender<M>,
}

impl<M> Clone for EventSink<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M> EventSink<M>
where
    M: From<DownloadEvent> + Send,
{
    pub fn new(tx: mpsc::Sender<M>) -> Self {
        Self { tx }
    }

    /// Queue an event; returns false once the session side has gone away.
    pub async fn emit(&self, event: DownloadEvent) -> bool {
        self.tx.send(M::from(event)).await.is_ok()
    }
}
