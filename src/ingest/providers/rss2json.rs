// src/ingest/providers/rss2json.rs
//! Structured feed-parsing service (rss2json-compatible API). First in the chain.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::ingest::types::{FeedProvider, RawItem};

pub const DEFAULT_ENDPOINT: &str = "https://api.rss2json.com/v1/api.json";

#[derive(Debug, Deserialize)]
struct Response {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    description: Option<String>,
    content: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

pub struct Rss2JsonProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl Rss2JsonProvider {
    pub fn new(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn parse_items_from_str(body: &str) -> Result<Vec<RawItem>> {
        let resp: Response = serde_json::from_str(body).context("parsing rss2json payload")?;
        if !resp.status.eq_ignore_ascii_case("ok") {
            bail!(
                "rss2json status {}: {}",
                resp.status,
                resp.message.unwrap_or_default()
            );
        }
        Ok(resp
            .items
            .into_iter()
            .map(|it| RawItem {
                title: it.title,
                link: it.link,
                guid: it.guid,
                description: it.description.filter(|d| !d.trim().is_empty()).or(it.content),
                published: it.pub_date.map(|d| to_rfc3339(&d)),
            })
            .collect())
    }
}

/// The service reports dates as `YYYY-MM-DD HH:MM:SS` in UTC.
fn to_rfc3339(raw: &str) -> String {
    let t = raw.trim();
    let b = t.as_bytes();
    if b.len() == 19 && b[4] == b'-' && b[10] == b' ' && b[13] == b':' {
        format!("{}T{}Z", &t[..10], &t[11..])
    } else {
        t.to_string()
    }
}

#[async_trait]
impl FeedProvider for Rss2JsonProvider {
    async fn fetch_items(&self, feed_url: &str) -> Result<Vec<RawItem>> {
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("rss_url", feed_url)])
            .send()
            .await
            .context("rss2json http get()")?
            .error_for_status()
            .context("rss2json http status")?
            .text()
            .await
            .context("rss2json http .text()")?;
        Self::parse_items_from_str(&body)
    }

    fn name(&self) -> &'static str {
        "rss2json"
    }
}
