//! Keyword -> URL list lookup table, loaded once from a JSON object file.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeywordError {
    #[error("cannot read keyword table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid keyword table: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only map from keyword to the URLs it stands for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable {
    entries: HashMap<String, Vec<String>>,
}

impl KeywordTable {
    /// Parse `{ "keyword": ["url", ...], ... }`.
    pub fn from_json(data: &str) -> Result<Self, KeywordError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn load(path: &Path) -> Result<Self, KeywordError> {
        let data = fs::read_to_string(path).map_err(|source| KeywordError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&data)
    }

    /// Like [`load`](Self::load), but a missing or broken file yields an empty
    /// table; every lookup then answers with no URLs.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(table) => {
                tracing::info!(path = %path.display(), keywords = table.len(), "keyword table loaded");
                table
            }
            Err(e) => {
                tracing::warn!("keyword table unavailable: {}", e);
                Self::default()
            }
        }
    }

    /// URLs for `keyword`; empty when unknown.
    pub fn lookup(&self, keyword: &str) -> Vec<String> {
        self.entries.get(keyword).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for KeywordTable {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
