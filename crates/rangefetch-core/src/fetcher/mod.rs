//! Range fetch units.
//!
//! Each unit downloads one [`ByteRange`] with a single curl Range GET on its
//! own OS thread. Received bytes are published to the coordinator as
//! [`UnitEvent`]s over a bounded channel; the unit owns its [`UnitState`]
//! and shares nothing mutable with its siblings. A failed unit reports once
//! and stops; it never retries.

mod state;
mod throttle;

pub use state::{UnitState, UnitStatus};
pub use throttle::Throttle;

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::str;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::control::CancelToken;
use crate::segmenter::ByteRange;

/// Exit code reported when a unit's thread panics.
pub const PANIC_EXIT_CODE: i32 = 1;

/// libcurl knobs shared by the probe and the range units.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Whole-request timeout for the HEAD probe only; range GETs rely on the
    /// low-speed limit so long ranges on slow links are not cut off.
    pub probe_timeout: Duration,
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(30),
            low_speed_limit: 1,
            low_speed_time: Duration::from_secs(60),
        }
    }
}

/// Everything one unit needs to run.
#[derive(Debug, Clone)]
pub struct UnitJob {
    pub url: String,
    pub range: ByteRange,
    /// Size of the whole resource; a plain 200 is only accepted when the
    /// range covers all of it.
    pub total_size: u64,
    /// Bytes per second, 0 = unlimited.
    pub speed_limit: u64,
    pub cancel: CancelToken,
    pub curl: CurlOptions,
}

/// What a unit publishes. Per unit: any number of `Chunk`s in stream order,
/// then exactly one terminal event.
#[derive(Debug, Clone)]
pub enum UnitEvent {
    Chunk {
        index: usize,
        data: Vec<u8>,
        /// Cumulative bytes for this unit including `data`.
        downloaded: u64,
        at: Instant,
    },
    Completed {
        index: usize,
    },
    Failed {
        index: usize,
        message: String,
    },
    Cancelled {
        index: usize,
    },
    /// The unit's thread terminated abnormally.
    Crashed {
        index: usize,
        code: i32,
    },
}

impl UnitEvent {
    pub fn index(&self) -> usize {
        match self {
            UnitEvent::Chunk { index, .. }
            | UnitEvent::Completed { index }
            | UnitEvent::Failed { index, .. }
            | UnitEvent::Cancelled { index }
            | UnitEvent::Crashed { index, .. } => *index,
        }
    }
}

/// Why a range fetch failed.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("{0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("server ignored the range request (HTTP {0})")]
    RangeIgnored(u32),
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
}

#[derive(Debug)]
pub enum UnitOutcome {
    Completed,
    Failed(UnitError),
    Cancelled,
}

/// Set from inside the curl callbacks when the unit stops reading on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Cancelled,
    BadStatus(u32),
}

/// Runs `job` on a new named thread. The thread publishes the unit's chunks
/// and always finishes with one terminal event, including when the fetch
/// code panics.
pub fn spawn_unit(
    job: UnitJob,
    events: mpsc::Sender<UnitEvent>,
) -> std::io::Result<JoinHandle<()>> {
    spawn_unit_with(job, events, run_unit)
}

/// Like [`spawn_unit`], with `body` doing the fetch instead of [`run_unit`].
/// Chunks are whatever `body` publishes; the terminal event is always sent
/// here.
pub fn spawn_unit_with<F>(
    job: UnitJob,
    events: mpsc::Sender<UnitEvent>,
    body: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce(&UnitJob, &mpsc::Sender<UnitEvent>) -> UnitOutcome + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("rangefetch-unit-{}", job.range.index))
        .spawn(move || {
            let index = job.range.index;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&job, &events)));
            let terminal = match outcome {
                Ok(UnitOutcome::Completed) => UnitEvent::Completed { index },
                Ok(UnitOutcome::Failed(e)) => {
                    tracing::warn!(unit = index, "range fetch failed: {}", e);
                    UnitEvent::Failed {
                        index,
                        message: e.to_string(),
                    }
                }
                Ok(UnitOutcome::Cancelled) => UnitEvent::Cancelled { index },
                Err(_) => {
                    tracing::error!(unit = index, "unit thread panicked");
                    UnitEvent::Crashed {
                        index,
                        code: PANIC_EXIT_CODE,
                    }
                }
            };
            // Receiver gone means the download was abandoned; nothing to report to.
            let _ = events.blocking_send(terminal);
        })
}

/// Downloads one range, publishing each received chunk before applying the
/// throttle pause. Blocks the calling thread; must not run on an async
/// runtime thread.
pub fn run_unit(job: &UnitJob, events: &mpsc::Sender<UnitEvent>) -> UnitOutcome {
    let index = job.range.index;
    let Some(curl_range) = job.range.curl_range() else {
        tracing::debug!(unit = index, "empty range, nothing to fetch");
        return UnitOutcome::Completed;
    };
    if job.cancel.is_cancelled() {
        return UnitOutcome::Cancelled;
    }

    let mut easy = curl::easy::Easy::new();
    if let Err(e) = configure(&mut easy, job, &curl_range) {
        return UnitOutcome::Failed(e.into());
    }

    let whole_resource = job.range.start == 0 && job.range.end == job.total_size;
    let status: Cell<Option<u32>> = Cell::new(None);
    let stop: Cell<Option<Stop>> = Cell::new(None);
    let mut state = UnitState::new(index, job.speed_limit);
    let mut throttle = Throttle::new(job.speed_limit, Instant::now());

    tracing::debug!(
        unit = index,
        range = %curl_range,
        speed_limit = throttle.limit(),
        "range fetch started"
    );

    let perform_result = (|| {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(line) = str::from_utf8(data) {
                if let Some(code) = parse_status_line(line) {
                    status.set(Some(code));
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            if job.cancel.is_cancelled() {
                stop.set(Some(Stop::Cancelled));
                return Ok(0);
            }
            if let Some(code) = status.get() {
                if !(code == 206 || (code == 200 && whole_resource)) {
                    stop.set(Some(Stop::BadStatus(code)));
                    return Ok(0);
                }
            }

            let now = Instant::now();
            let pause = throttle.on_chunk(now, data.len());
            let downloaded = state.record_chunk(data.len(), now);
            let chunk = UnitEvent::Chunk {
                index,
                data: data.to_vec(),
                downloaded,
                at: now,
            };
            if events.blocking_send(chunk).is_err() {
                stop.set(Some(Stop::Cancelled));
                return Ok(0);
            }

            if let Some(pause) = pause {
                if !job.cancel.sleep(pause) {
                    stop.set(Some(Stop::Cancelled));
                    return Ok(0);
                }
            }
            Ok(data.len())
        })?;
        transfer.perform()
    })();

    match stop.get() {
        Some(Stop::Cancelled) => {
            tracing::debug!(unit = index, downloaded = state.downloaded, "range fetch cancelled");
            return UnitOutcome::Cancelled;
        }
        Some(Stop::BadStatus(code)) => return UnitOutcome::Failed(bad_status(code)),
        None => {}
    }
    if let Err(e) = perform_result {
        return UnitOutcome::Failed(UnitError::Curl(e));
    }

    let code = match easy.response_code() {
        Ok(code) => code,
        Err(e) => return UnitOutcome::Failed(UnitError::Curl(e)),
    };
    if !(200..300).contains(&code) {
        return UnitOutcome::Failed(UnitError::Http(code));
    }
    if code != 206 && !whole_resource {
        return UnitOutcome::Failed(UnitError::RangeIgnored(code));
    }

    let expected = job.range.len();
    if state.downloaded != expected {
        return UnitOutcome::Failed(UnitError::PartialTransfer {
            expected,
            received: state.downloaded,
        });
    }

    tracing::debug!(unit = index, bytes = state.downloaded, "range fetch completed");
    UnitOutcome::Completed
}

fn configure(
    easy: &mut curl::easy::Easy,
    job: &UnitJob,
    curl_range: &str,
) -> Result<(), curl::Error> {
    easy.url(&job.url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(job.curl.connect_timeout)?;
    // Abort a stalled stream rather than waiting on it forever.
    easy.low_speed_limit(job.curl.low_speed_limit)?;
    easy.low_speed_time(job.curl.low_speed_time)?;
    // curl expects "from-to" (inclusive), not "bytes=from-to".
    easy.range(curl_range)?;
    Ok(())
}

fn bad_status(code: u32) -> UnitError {
    if (200..300).contains(&code) {
        UnitError::RangeIgnored(code)
    } else {
        UnitError::Http(code)
    }
}

/// Status code from an `HTTP/x.y NNN ...` line. Each redirect hop sends a
/// new one, so the last seen belongs to the response whose body follows.
fn parse_status_line(line: &str) -> Option<u32> {
    let line = line.trim_end();
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(range: ByteRange, total_size: u64) -> UnitJob {
        UnitJob {
            url: "http://127.0.0.1:9/unused".to_string(),
            range,
            total_size,
            speed_limit: 0,
            cancel: CancelToken::new(),
            curl: CurlOptions::default(),
        }
    }

    #[test]
    fn parse_status_line_variants() {
        assert_eq!(parse_status_line("HTTP/1.1 206 Partial Content\r\n"), Some(206));
        assert_eq!(parse_status_line("HTTP/2 200\r\n"), Some(200));
        assert_eq!(parse_status_line("Content-Range: bytes 0-9/10\r\n"), None);
        assert_eq!(parse_status_line("HTTP/1.1 abc\r\n"), None);
    }

    #[test]
    fn bad_status_distinguishes_ignored_range() {
        assert!(matches!(bad_status(200), UnitError::RangeIgnored(200)));
        assert!(matches!(bad_status(404), UnitError::Http(404)));
    }

    #[test]
    fn empty_range_completes_without_request() {
        let (tx, mut rx) = mpsc::channel(4);
        let range = ByteRange {
            index: 0,
            start: 0,
            end: 0,
        };
        assert!(matches!(run_unit(&job(range, 0), &tx), UnitOutcome::Completed));
        drop(tx);
        assert!(rx.try_recv().is_err(), "no chunk for an empty range");
    }

    #[test]
    fn cancelled_before_start() {
        let (tx, _rx) = mpsc::channel(4);
        let range = ByteRange {
            index: 1,
            start: 0,
            end: 10,
        };
        let j = job(range, 10);
        j.cancel.cancel();
        assert!(matches!(run_unit(&j, &tx), UnitOutcome::Cancelled));
    }

    #[test]
    fn spawned_unit_always_ends_with_terminal_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let range = ByteRange {
            index: 3,
            start: 0,
            end: 0,
        };
        let handle = spawn_unit(job(range, 0), tx).unwrap();
        handle.join().unwrap();
        match rx.try_recv().unwrap() {
            UnitEvent::Completed { index } => assert_eq!(index, 3),
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn panicking_unit_reports_crash_as_only_terminal_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let range = ByteRange {
            index: 2,
            start: 0,
            end: 10,
        };
        let handle = spawn_unit_with(job(range, 10), tx, |job, events| {
            events
                .blocking_send(UnitEvent::Chunk {
                    index: job.range.index,
                    data: vec![0; 4],
                    downloaded: 4,
                    at: Instant::now(),
                })
                .unwrap();
            panic!("fetch blew up");
        })
        .unwrap();
        handle.join().expect("panic stays inside the unit thread");

        assert!(matches!(rx.try_recv().unwrap(), UnitEvent::Chunk { index: 2, .. }));
        match rx.try_recv().unwrap() {
            UnitEvent::Crashed { index, code } => {
                assert_eq!(index, 2);
                assert_eq!(code, PANIC_EXIT_CODE);
                assert_eq!(code, 1);
            }
            other => panic!("expected Crashed, got {:?}", other),
        }
        assert!(
            matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)),
            "nothing follows the terminal event"
        );
    }
}
