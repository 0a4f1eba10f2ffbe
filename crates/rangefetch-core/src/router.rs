//! Decides what a session does with each inbound message.

use std::sync::Arc;

use crate::coordinator::{DownloadRequest, DownloadSettings};
use crate::keywords::KeywordTable;
use crate::protocol::{parse_request, ClientRequest, OutboundMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Answer the originating session right away.
    Reply(OutboundMessage),
    /// Start a download whose events go to the originating session.
    Download(DownloadRequest),
}

/// Shared, read-only state every session routes against.
#[derive(Debug, Clone)]
pub struct SessionRouter {
    keywords: Arc<KeywordTable>,
    settings: Arc<DownloadSettings>,
}

impl SessionRouter {
    pub fn new(keywords: Arc<KeywordTable>, settings: Arc<DownloadSettings>) -> Self {
        Self { keywords, settings }
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    pub fn route(&self, text: &str) -> Route {
        match parse_request(text) {
            Ok(ClientRequest::Keyword(keyword)) => {
                let urls = self.keywords.lookup(&keyword);
                tracing::debug!(%keyword, found = urls.len(), "keyword lookup");
                Route::Reply(OutboundMessage::Urls { urls })
            }
            Ok(ClientRequest::Download { url }) => Route::Download(self.settings.request(url)),
            Err(e) => {
                tracing::debug!("rejecting inbound message: {}", e);
                Route::Reply(OutboundMessage::incorrect_query())
            }
        }
    }
}
