// src/ingest/providers/json_feed.rs
//! Text-to-JSON conversion service returning JSON Feed documents. Second in the chain.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::ingest::types::{FeedProvider, RawItem};

pub const DEFAULT_ENDPOINT: &str = "https://feed2json.org/convert";

#[derive(Debug, Deserialize)]
struct JsonFeed {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: Option<String>,
    url: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    content_text: Option<String>,
    content_html: Option<String>,
    date_published: Option<String>,
}

pub struct JsonFeedProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl JsonFeedProvider {
    pub fn new(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn parse_items_from_str(body: &str) -> Result<Vec<RawItem>> {
        let feed: JsonFeed = serde_json::from_str(body).context("parsing json feed payload")?;
        Ok(feed
            .items
            .into_iter()
            .map(|it| RawItem {
                title: it.title,
                link: it.url,
                guid: it.id,
                description: it.summary.or(it.content_text).or(it.content_html),
                published: it.date_published,
            })
            .collect())
    }
}

#[async_trait]
impl FeedProvider for JsonFeedProvider {
    async fn fetch_items(&self, feed_url: &str) -> Result<Vec<RawItem>> {
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("url", feed_url)])
            .send()
            .await
            .context("json feed http get()")?
            .error_for_status()
            .context("json feed http status")?
            .text()
            .await
            .context("json feed http .text()")?;
        Self::parse_items_from_str(&body)
    }

    fn name(&self) -> &'static str {
        "jsonfeed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_preferred_over_content() {
        let body = r#"{"version":"https://jsonfeed.org/version/1","items":[
            {"id":"https://x.test/a","url":"https://x.test/a","title":"A",
             "summary":"short","content_html":"<p>long</p>","date_published":"2024-05-01T10:00:00Z"}]}"#;
        let items = JsonFeedProvider::parse_items_from_str(body).unwrap();
        assert_eq!(items[0].description.as_deref(), Some("short"));
        assert_eq!(items[0].link.as_deref(), Some("https://x.test/a"));
    }
}
