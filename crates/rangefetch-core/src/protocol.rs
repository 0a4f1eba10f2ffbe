//! JSON messages exchanged with clients over the message channel.
//!
//! Inbound: `{"keyword": "..."}` or `{"url": "..."}`. Outbound messages are
//! told apart by which fields are present, so they serialize untagged.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::coordinator::{DownloadEvent, DownloadSummary};

/// Reply to any inbound message that is not a usable request.
pub const INCORRECT_QUERY: &str = "Incorrect query received";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Keyword(String),
    Download { url: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    Malformed(String),
}

/// Parse one inbound text frame. A non-empty `keyword` wins over `url`;
/// empty or non-string values count as absent.
pub fn parse_request(text: &str) -> Result<ClientRequest, RequestError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| RequestError::Malformed(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(RequestError::Malformed("not a JSON object".to_string()));
    };
    let non_empty = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(keyword) = non_empty("keyword") {
        return Ok(ClientRequest::Keyword(keyword));
    }
    if let Some(url) = non_empty("url") {
        return Ok(ClientRequest::Download { url });
    }
    Err(RequestError::Malformed(
        "neither keyword nor url given".to_string(),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Urls {
        urls: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Chunk {
        chunk: Vec<u8>,
        thread_num: usize,
        progress: u64,
        total_size: u64,
        threads: usize,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread_num: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        done: bool,
        progress: u64,
        total_size: u64,
        threads: usize,
        failed_threads: Vec<usize>,
    },
}

impl OutboundMessage {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundMessage::Error {
            error: message.into(),
            thread_num: None,
        }
    }

    pub fn incorrect_query() -> Self {
        Self::error(INCORRECT_QUERY)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Client-visible text for a unit whose thread terminated abnormally.
pub fn worker_stopped_message(code: i32) -> String {
    format!("Server worker stopped, exit code {}", code)
}

impl From<DownloadSummary> for OutboundMessage {
    fn from(summary: DownloadSummary) -> Self {
        OutboundMessage::Done {
            done: true,
            progress: summary.downloaded,
            total_size: summary.total_size,
            threads: summary.thread_count,
            failed_threads: summary.failed_units,
        }
    }
}

impl From<DownloadEvent> for OutboundMessage {
    fn from(event: DownloadEvent) -> Self {
        match event {
            DownloadEvent::Chunk(c) => OutboundMessage::Chunk {
                chunk: c.chunk,
                thread_num: c.unit_index,
                progress: c.progress,
                total_size: c.total_size,
                threads: c.thread_count,
            },
            DownloadEvent::Error(e) => OutboundMessage::Error {
                error: e.message,
                thread_num: e.unit_index,
            },
            DownloadEvent::WorkerStopped { code, .. } => {
                OutboundMessage::error(worker_stopped_message(code))
            }
            DownloadEvent::Completed(summary) => summary.into(),
        }
    }
}
