//! Download coordinator.
//!
//! Owns every fetch unit of one download request: probes the size, plans the
//! ranges, splits the speed budget, spawns one thread per range and folds the
//! units' events into progress updates for the requesting session. A failing
//! unit is reported on its own; siblings keep running.

mod events;
mod progress;

pub use events::{ChunkEvent, DownloadEvent, DownloadSummary, ErrorEvent, EventSink};
pub use progress::DownloadProgress;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::budget::allocate_speed_limits;
use crate::control::CancelToken;
use crate::fetch_head;
use crate::fetcher::{self, CurlOptions, UnitEvent, UnitJob, UnitState, UnitStatus};
use crate::segmenter::{plan_ranges, PlanError};

/// Download parameters fixed at process start (from config).
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub thread_count: usize,
    /// Global limit in bytes per second, 0 = unlimited.
    pub speed_limit: u64,
    pub speed_overrides: Vec<Option<u64>>,
    pub event_buffer: usize,
    pub curl: CurlOptions,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            thread_count: 1,
            speed_limit: 0,
            speed_overrides: Vec::new(),
            event_buffer: 64,
            curl: CurlOptions::default(),
        }
    }
}

impl DownloadSettings {
    pub fn request(&self, url: impl Into<String>) -> DownloadRequest {
        DownloadRequest {
            url: url.into(),
            thread_count: self.thread_count,
            global_speed_limit: self.speed_limit,
            speed_overrides: self.speed_overrides.clone(),
        }
    }

    pub fn coordinator(&self) -> DownloadCoordinator {
        DownloadCoordinator::new(self.curl, self.event_buffer)
    }
}

/// One client request for one URL. Not modified once the download starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub thread_count: usize,
    pub global_speed_limit: u64,
    pub speed_overrides: Vec<Option<u64>>,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("cannot determine size of {url}: {reason}")]
    SizeUnknown { url: String, reason: String },
    #[error(transparent)]
    InvalidInput(#[from] PlanError),
}

#[derive(Debug, Clone, Copy)]
pub struct DownloadCoordinator {
    curl: CurlOptions,
    event_buffer: usize,
}

impl DownloadCoordinator {
    pub fn new(curl: CurlOptions, event_buffer: usize) -> Self {
        Self {
            curl,
            event_buffer: event_buffer.max(1),
        }
    }

    /// HEAD the URL on a blocking thread and return its `Content-Length`.
    pub async fn probe_size(&self, url: &str) -> Result<u64, DownloadError> {
        let size_unknown = |reason: String| DownloadError::SizeUnknown {
            url: url.to_string(),
            reason,
        };
        let probe_url = url.to_string();
        let curl = self.curl;
        let head = tokio::task::spawn_blocking(move || fetch_head::probe(&probe_url, &curl))
            .await
            .map_err(|e| size_unknown(format!("probe task: {}", e)))?
            .map_err(|e| size_unknown(e.to_string()))?;

        tracing::debug!(
            %url,
            content_length = ?head.content_length,
            content_type = head.content_type.as_deref().unwrap_or("-"),
            "probe done"
        );
        if !head.accept_ranges {
            tracing::debug!(%url, "server does not advertise byte ranges");
        }
        head.content_length
            .ok_or_else(|| size_unknown("no Content-Length in HEAD response".to_string()))
    }

    /// Run one download to the end, relaying its events to `sink`.
    ///
    /// Returns `Err` only when no unit could be started (size unknown,
    /// invalid input); that error has already been sent to the sink. Unit
    /// failures are reported through the sink and the summary. If the sink
    /// closes, every unit is cancelled and no further events are sent.
    pub async fn run<M>(
        &self,
        request: DownloadRequest,
        sink: &EventSink<M>,
        cancel: CancelToken,
    ) -> Result<DownloadSummary, DownloadError>
    where
        M: From<DownloadEvent> + Send,
    {
        let (total_size, ranges) = match self.prepare(&request).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(url = %request.url, "download not started: {}", e);
                sink.emit(DownloadEvent::Error(ErrorEvent {
                    unit_index: None,
                    message: e.to_string(),
                }))
                .await;
                return Err(e);
            }
        };

        let limits = allocate_speed_limits(
            request.global_speed_limit,
            &request.speed_overrides,
            ranges.len(),
        );
        tracing::info!(
            url = %request.url,
            total_size,
            units = ranges.len(),
            "download started"
        );

        let mut aggregator = Aggregator::new(total_size, &limits);
        let mut abandoned = false;
        let (tx, mut rx) = mpsc::channel(self.event_buffer);

        for (range, &speed_limit) in ranges.iter().zip(&limits) {
            let job = UnitJob {
                url: request.url.clone(),
                range: *range,
                total_size,
                speed_limit,
                cancel: cancel.clone(),
                curl: self.curl,
            };
            if let Err(e) = fetcher::spawn_unit(job, tx.clone()) {
                tracing::error!(unit = range.index, "cannot spawn unit thread: {}", e);
                let crashed = UnitEvent::Crashed {
                    index: range.index,
                    code: e.raw_os_error().unwrap_or(-1),
                };
                if let Some(out) = aggregator.on_unit_event(crashed) {
                    relay(sink, out, &mut abandoned, &cancel, &request.url).await;
                }
            }
        }
        drop(tx);

        while let Some(event) = rx.recv().await {
            if let Some(out) = aggregator.on_unit_event(event) {
                relay(sink, out, &mut abandoned, &cancel, &request.url).await;
            }
        }

        let summary = aggregator.summary(abandoned);
        tracing::info!(
            url = %request.url,
            downloaded = summary.downloaded,
            failed = summary.failed_units.len(),
            cancelled = summary.cancelled,
            "download finished"
        );
        if !abandoned {
            sink.emit(DownloadEvent::Completed(summary.clone())).await;
        }
        Ok(summary)
    }

    async fn prepare(
        &self,
        request: &DownloadRequest,
    ) -> Result<(u64, Vec<crate::segmenter::ByteRange>), DownloadError> {
        // Validate before spending a round trip on the probe.
        if request.thread_count == 0 {
            return Err(PlanError::InvalidInput(0).into());
        }
        let total_size = self.probe_size(&request.url).await?;
        let ranges = plan_ranges(total_size, request.thread_count)?;
        Ok((total_size, ranges))
    }
}

/// Send `event` to the session unless it is already gone. The first failed
/// send marks the download abandoned and cancels every unit.
async fn relay<M>(
    sink: &EventSink<M>,
    event: DownloadEvent,
    abandoned: &mut bool,
    cancel: &CancelToken,
    url: &str,
) where
    M: From<DownloadEvent> + Send,
{
    if *abandoned {
        return;
    }
    if !sink.emit(event).await {
        tracing::info!(%url, "session gone, cancelling download");
        *abandoned = true;
        cancel.cancel();
    }
}

/// Folds unit events into the download's progress and per-unit table.
struct Aggregator {
    progress: DownloadProgress,
    units: Vec<UnitState>,
}

impl Aggregator {
    fn new(total_size: u64, limits: &[u64]) -> Self {
        Self {
            progress: DownloadProgress::new(total_size, limits.len()),
            units: limits
                .iter()
                .enumerate()
                .map(|(i, &limit)| UnitState::new(i, limit))
                .collect(),
        }
    }

    /// Apply one unit event; returns what the session should see, if anything.
    /// Events from a unit that is already terminal are dropped.
    fn on_unit_event(&mut self, event: UnitEvent) -> Option<DownloadEvent> {
        let unit = self.units.get_mut(event.index())?;
        if unit.status.is_terminal() {
            tracing::warn!(unit = unit.index, "event after terminal state ignored");
            return None;
        }

        match event {
            UnitEvent::Chunk {
                index,
                data,
                downloaded,
                at,
            } => {
                unit.record_chunk(data.len(), at);
                debug_assert_eq!(unit.downloaded, downloaded);
                let progress = self.progress.apply(data.len() as u64);
                Some(DownloadEvent::Chunk(ChunkEvent {
                    unit_index: index,
                    unit_downloaded: downloaded,
                    chunk: data,
                    progress,
                    total_size: self.progress.total_size(),
                    thread_count: self.progress.thread_count(),
                }))
            }
            UnitEvent::Completed { .. } => {
                unit.finish(UnitStatus::Completed);
                None
            }
            UnitEvent::Cancelled { .. } => {
                unit.finish(UnitStatus::Cancelled);
                None
            }
            UnitEvent::Failed { index, message } => {
                unit.finish(UnitStatus::Failed(message.clone()));
                Some(DownloadEvent::Error(ErrorEvent {
                    unit_index: Some(index),
                    message,
                }))
            }
            UnitEvent::Crashed { index, code } => {
                unit.finish(UnitStatus::Crashed(code));
                Some(DownloadEvent::WorkerStopped {
                    unit_index: index,
                    code,
                })
            }
        }
    }

    fn summary(&self, abandoned: bool) -> DownloadSummary {
        let failed_units = self
            .units
            .iter()
            .filter(|u| matches!(u.status, UnitStatus::Failed(_) | UnitStatus::Crashed(_)))
            .map(|u| u.index)
            .collect();
        // A unit still Running here never reported; count it as cancelled.
        let any_cancelled = self
            .units
            .iter()
            .any(|u| matches!(u.status, UnitStatus::Cancelled | UnitStatus::Running));
        DownloadSummary {
            total_size: self.progress.total_size(),
            downloaded: self.progress.downloaded(),
            thread_count: self.progress.thread_count(),
            completed_units: self
                .units
                .iter()
                .filter(|u| u.status == UnitStatus::Completed)
                .count(),
            failed_units,
            cancelled: abandoned || any_cancelled,
        }
    }
}
