// src/normalize/mod.rs
//! Raw feed item → canonical [`Article`].

pub mod rules;

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::article::{parse_feed_date, Article, DEFAULT_READ_TIME};
use crate::ingest::types::{FeedConfig, RawItem};

pub use rules::{categorize, extract_keywords, is_relevant};

pub const SUMMARY_MAX_CHARS: usize = 200;
pub const SLUG_MAX_CHARS: usize = 30;
pub const TRENDING_WINDOW_HOURS: i64 = 48;

/// Inputs shared by every item of one ingestion run.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Tombstoned ids; items deriving one of these are dropped right here.
    pub deleted: &'a BTreeSet<String>,
    /// Ingestion reference time: date fallback and trending horizon.
    pub now: DateTime<Utc>,
}

/// Decode entities, strip tags, collapse whitespace.
pub fn clean_html(s: &str) -> String {
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    let out = stripped
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Clean, cap at [`SUMMARY_MAX_CHARS`], suffix with `...`.
pub fn summarize(description: &str) -> String {
    let clean = clean_html(description);
    if clean.is_empty() {
        return String::new();
    }
    let capped: String = clean.chars().take(SUMMARY_MAX_CHARS).collect();
    format!("{}...", capped.trim_end())
}

/// Link, else guid, else `source-<first 30 word chars of the title>`.
///
/// The same underlying item must map to the same id whichever provider
/// delivered it, so only surrounding whitespace is touched.
pub fn derive_id(raw: &RawItem, source: &str) -> String {
    let non_empty = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    if let Some(link) = non_empty(&raw.link) {
        return link;
    }
    if let Some(guid) = non_empty(&raw.guid) {
        return guid;
    }
    let title = raw
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("Untitled");
    let slug: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(SLUG_MAX_CHARS)
        .collect();
    format!("{source}-{slug}")
}

/// Recent articles from top-priority feeds.
pub fn is_trending(date: DateTime<Utc>, priority: i32, now: DateTime<Utc>) -> bool {
    priority <= 1 && now.signed_duration_since(date) <= Duration::hours(TRENDING_WINDOW_HOURS)
}

/// None when the item is irrelevant or tombstoned.
pub fn normalize(raw: &RawItem, feed: &FeedConfig, ctx: &NormalizeContext<'_>) -> Option<Article> {
    let title = raw
        .title
        .as_deref()
        .map(clean_html)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let description = raw.description.as_deref().map(clean_html).unwrap_or_default();
    let text = format!("{title} {description}");

    if !is_relevant(&text, feed.require_both) {
        return None;
    }

    let id = derive_id(raw, &feed.source);
    if ctx.deleted.contains(&id) {
        return None;
    }

    let date = raw
        .published
        .as_deref()
        .and_then(parse_feed_date)
        .unwrap_or(ctx.now);

    Some(Article {
        category: categorize(&title, &description, &feed.category),
        keywords: extract_keywords(&text),
        summary: summarize(raw.description.as_deref().unwrap_or_default()),
        url: raw
            .link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("#")
            .to_string(),
        source: feed.source.clone(),
        source_logo: feed.logo.clone(),
        date,
        read_time: DEFAULT_READ_TIME,
        priority: feed.priority,
        trending: is_trending(date, feed.priority, ctx.now),
        archived: false,
        manual: false,
        id,
        title,
    })
}

/// Normalize one feed's items; returns kept articles and the filtered count.
pub fn normalize_feed(
    items: &[RawItem],
    feed: &FeedConfig,
    ctx: &NormalizeContext<'_>,
) -> (Vec<Article>, usize) {
    let mut filtered = 0usize;
    let mut kept = Vec::with_capacity(items.len());
    for raw in items {
        match normalize(raw, feed, ctx) {
            Some(a) => kept.push(a),
            None => filtered += 1,
        }
    }
    (kept, filtered)
}
