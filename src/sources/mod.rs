//! Source adapters: one per external search surface.
//!
//! Each adapter turns a query into a short, relevance-ordered list of records.
//! [`SourceAdapter::fetch`] never fails; an upstream error is logged and handed
//! back beside an empty list so the caller can report why the source is missing.

pub mod reddit;
pub mod serp;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

pub use reddit::RedditClient;
pub use serp::{SerpClient, SerpEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Google,
    Bing,
    Reddit,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Google, SourceKind::Bing, SourceKind::Reddit];

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Google => "Google",
            SourceKind::Bing => "Bing",
            SourceKind::Reddit => "Reddit",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One organic web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// A discussion thread with its highest-ranked comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscussionThread {
    pub title: String,
    pub permalink: String,
    pub subreddit: String,
    pub score: i64,
    pub comment_count: u64,
    pub body: String,
    pub top_comments: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl SourceError {
    pub fn is_retriable(&self) -> bool {
        match self {
            SourceError::RateLimited => true,
            SourceError::Api { code, .. } => (500..=599).contains(code),
            SourceError::Network(e) => e.is_timeout() || e.is_connect(),
            SourceError::Auth(_) | SourceError::Malformed(_) => false,
        }
    }
}

/// Records from one search, or the error that left the list empty.
#[derive(Debug)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub failure: Option<SourceError>,
}

/// A search surface that yields `Item`s for a query.
pub trait SourceAdapter {
    type Item;

    fn kind(&self) -> SourceKind;

    /// Queries the upstream API, surfacing every failure.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Self::Item>, SourceError>;

    /// Like [`search`](Self::search), but an upstream failure yields an empty
    /// list with the error attached.
    async fn fetch(&self, query: &str, limit: usize) -> Fetched<Self::Item> {
        match self.search(query, limit).await {
            Ok(items) => Fetched {
                items,
                failure: None,
            },
            Err(e) => {
                warn!(source = %self.kind(), error = %e, "source failed, continuing without it");
                Fetched {
                    items: Vec::new(),
                    failure: Some(e),
                }
            }
        }
    }
}

/// Maps a non-success status to a [`SourceError`] and decodes the JSON body otherwise.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SourceError> {
    let status = response.status();
    let text = response.text().await?;
    match status.as_u16() {
        200..=299 => serde_json::from_str(&text).map_err(|e| SourceError::Malformed(e.to_string())),
        429 => Err(SourceError::RateLimited),
        401 | 403 => Err(SourceError::Auth(error_message(&text, status))),
        code => Err(SourceError::Api {
            code,
            message: error_message(&text, status),
        }),
    }
}

/// Truncates to at most `max` characters, marking the cut with an ellipsis.
pub(crate) fn clip(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}…", text[..end].trim_end()),
        None => text.to_string(),
    }
}

fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v["message"]
                .as_str()
                .or_else(|| v["error"].as_str())
                .or_else(|| v["error"]["message"].as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            let snippet: String = body.chars().take(200).collect();
            if snippet.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                snippet
            }
        })
}
