//! Aggregate progress of one download.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running byte total across all units of a download.
///
/// Only ever grows: each chunk adds its size with one atomic add, so chunks
/// applied concurrently from different units cannot lose updates.
#[derive(Debug)]
pub struct DownloadProgress {
    downloaded: AtomicU64,
    total_size: u64,
    thread_count: usize,
}

impl DownloadProgress {
    pub fn new(total_size: u64, thread_count: usize) -> Self {
        Self {
            downloaded: AtomicU64::new(0),
            total_size,
            thread_count,
        }
    }

    /// Add a chunk's size; returns the new total including it.
    pub fn apply(&self, chunk_size: u64) -> u64 {
        self.downloaded.fetch_add(chunk_size, Ordering::AcqRel) + chunk_size
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Acquire)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }
}
