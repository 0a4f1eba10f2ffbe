//! HTTP HEAD size probe.
//!
//! Uses the curl crate (libcurl) to fetch response headers and read
//! `Content-Length` before a download is split into ranges.

mod parse;

use std::str;
use thiserror::Error;

use crate::fetcher::CurlOptions;

use parse::parse_headers;

/// Headers of the final (post-redirect) HEAD response that matter for planning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if `Content-Length` is present and numeric.
    pub content_length: Option<u64>,
    /// True if the server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// `Content-Type`, logged for diagnostics.
    pub content_type: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("HEAD request failed: {0}")]
    Curl(#[from] curl::Error),
    #[error("HEAD {url} returned HTTP {code}")]
    Http { url: String, code: u32 },
}

/// Performs a HEAD request and returns the parsed headers.
///
/// Follows redirects. Blocks the current thread; call from `spawn_blocking`
/// when used from async code.
pub fn probe(url: &str, opts: &CurlOptions) -> Result<HeadResult, ProbeError> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(opts.probe_timeout)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(ProbeError::Http {
            url: url.to_string(),
            code,
        });
    }

    Ok(parse_headers(&lines))
}
