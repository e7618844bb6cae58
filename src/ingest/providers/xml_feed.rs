// src/ingest/providers/xml_feed.rs
//! Raw fetch + local XML parse. Last resort in the chain; understands RSS 2.0,
//! RSS 1.0 (RDF) and Atom.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{FeedProvider, RawItem};

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    channel: Option<Channel>,
    // RSS 1.0 places items next to the channel instead of inside it.
    #[serde(default)]
    item: Vec<RssItem>,
    #[serde(default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<TextNode>,
    #[serde(default)]
    link: Vec<AtomLink>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Element text, ignoring attributes such as `type="html"` or `isPermaLink`.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

impl TextNode {
    fn into_option(self) -> Option<String> {
        Some(self.value).filter(|v| !v.trim().is_empty())
    }
}

impl From<RssItem> for RawItem {
    fn from(it: RssItem) -> Self {
        RawItem {
            title: it.title,
            link: it.link.map(|l| l.trim().to_string()),
            guid: it.guid.and_then(TextNode::into_option),
            description: it.description.filter(|d| !d.trim().is_empty()).or(it.content),
            published: it.pub_date.or(it.dc_date),
        }
    }
}

impl From<AtomEntry> for RawItem {
    fn from(e: AtomEntry) -> Self {
        let link = e
            .link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| e.link.first())
            .and_then(|l| l.href.clone());
        RawItem {
            title: e.title.and_then(TextNode::into_option),
            link,
            guid: e.id,
            description: e
                .summary
                .and_then(TextNode::into_option)
                .or_else(|| e.content.and_then(TextNode::into_option)),
            published: e.published.or(e.updated),
        }
    }
}

/// Parse an RSS/RDF/Atom document into raw items.
pub fn parse_feed_xml(xml: &str) -> Result<Vec<RawItem>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let doc: Document = from_str(&xml_clean).context("parsing feed xml")?;
    if doc.channel.is_none() && doc.item.is_empty() && doc.entry.is_empty() {
        bail!("document is not an RSS/RDF/Atom feed");
    }

    let mut out: Vec<RawItem> = Vec::new();
    if let Some(channel) = doc.channel {
        out.extend(channel.item.into_iter().map(RawItem::from));
    }
    out.extend(doc.item.into_iter().map(RawItem::from));
    out.extend(doc.entry.into_iter().map(RawItem::from));

    histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

pub struct XmlFeedProvider {
    client: reqwest::Client,
}

impl XmlFeedProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedProvider for XmlFeedProvider {
    async fn fetch_items(&self, feed_url: &str) -> Result<Vec<RawItem>> {
        let resp = self
            .client
            .get(feed_url)
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8",
            )
            .send()
            .await
            .context("xml feed http get()")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("xml feed http status {status}");
        }
        let body = resp.text().await.context("xml feed http .text()")?;
        parse_feed_xml(&body)
    }

    fn name(&self) -> &'static str {
        "xml"
    }
}

// HTML named entities are not valid XML; feeds use them anyway.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
