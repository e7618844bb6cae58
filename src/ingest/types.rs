// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One feed item as a provider hands it over, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    /// Description, content snippet or full content, whichever the provider had.
    pub description: Option<String>,
    /// Publish date as written by the feed (RFC 3339 or RFC 2822).
    pub published: Option<String>,
}

/// One configured feed. Field names follow the stored `customFeeds` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    pub url: String,
    /// Fallback category when no classification rule matches.
    pub category: String,
    pub source: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub require_both: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_priority() -> i32 {
    2
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchState {
    Ok,
    Empty,
    Error,
}

/// Per-feed outcome of the last fetch, keyed by source name in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub status: FetchState,
    pub item_count: usize,
    /// Provider that produced the items (None when the whole chain failed).
    pub provider: Option<String>,
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_items(&self, feed_url: &str) -> Result<Vec<RawItem>>;
    fn name(&self) -> &'static str;
}
