//! Outbound suggestion sources.
//!
//! Each source performs a single HTTP request and normalizes the response into
//! [`SuggestionResult`] values. [`FetcherTable`] maps a [`FetchMode`] to the
//! source that serves it, so callers never branch on service themselves.

mod google;
mod note;

pub use google::GoogleSuggest;
pub use note::{NoteHashtags, NoteRelatedHashtags};

use crate::config::SuggestConfig;
use crate::query::{Service, SuggestQuery};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResult {
    pub name: String,
    pub count: Option<u64>,
}

impl SuggestionResult {
    pub fn keyword(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: None,
        }
    }

    pub fn counted(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count: Some(count),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("unexpected payload from {url}: {reason}")]
    Payload { url: String, reason: String },
}

#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// `limit` caps the number of results; `None` means the source's own size.
    async fn fetch(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SuggestionResult>, FetchError>;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FetchMode {
    GoogleKeywords,
    NoteHashtags,
    NoteRelated,
}

impl FetchMode {
    pub fn for_query(state: &SuggestQuery) -> Self {
        match (state.service, state.related) {
            (Service::Google, _) => FetchMode::GoogleKeywords,
            (Service::Note, false) => FetchMode::NoteHashtags,
            (Service::Note, true) => FetchMode::NoteRelated,
        }
    }

    /// Related hashtags ignore the size selector entirely.
    pub fn uses_limit(&self) -> bool {
        !matches!(self, FetchMode::NoteRelated)
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::GoogleKeywords => write!(f, "google-keywords"),
            FetchMode::NoteHashtags => write!(f, "note-hashtags"),
            FetchMode::NoteRelated => write!(f, "note-related"),
        }
    }
}

/// Dispatch table from [`FetchMode`] to the source serving it.
#[derive(Clone)]
pub struct FetcherTable {
    google: Arc<dyn SuggestionSource>,
    note_hashtags: Arc<dyn SuggestionSource>,
    note_related: Arc<dyn SuggestionSource>,
}

impl FetcherTable {
    pub fn new(
        google: Arc<dyn SuggestionSource>,
        note_hashtags: Arc<dyn SuggestionSource>,
        note_related: Arc<dyn SuggestionSource>,
    ) -> Self {
        Self {
            google,
            note_hashtags,
            note_related,
        }
    }

    pub fn from_config(config: &SuggestConfig) -> Result<Self, reqwest::Error> {
        let client = config.http_client()?;
        Ok(Self::new(
            Arc::new(GoogleSuggest::new(client.clone(), config.google_base_url())),
            Arc::new(NoteHashtags::new(client.clone(), config.note_base_url())),
            Arc::new(NoteRelatedHashtags::new(client, config.note_base_url())),
        ))
    }

    pub fn lookup(&self, mode: FetchMode) -> &dyn SuggestionSource {
        match mode {
            FetchMode::GoogleKeywords => self.google.as_ref(),
            FetchMode::NoteHashtags => self.note_hashtags.as_ref(),
            FetchMode::NoteRelated => self.note_related.as_ref(),
        }
    }
}

/// Sends a GET request and returns the body of a successful response.
async fn get_body(request: reqwest::RequestBuilder, url: &str) -> Result<Vec<u8>, FetchError> {
    let transport = |source| FetchError::Transport {
        url: url.to_string(),
        source,
    };
    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }
    let bytes = response.bytes().await.map_err(transport)?;
    Ok(bytes.to_vec())
}

fn payload_error(url: &str, reason: impl Into<String>) -> FetchError {
    FetchError::Payload {
        url: url.to_string(),
        reason: reason.into(),
    }
}

fn truncate(mut results: Vec<SuggestionResult>, limit: Option<u32>) -> Vec<SuggestionResult> {
    if let Some(limit) = limit {
        results.truncate(limit as usize);
    }
    results
}
