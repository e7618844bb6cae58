// src/article.rs
//! Canonical article record shared by the normalizer, the reconciliation engine
//! and the snapshot document.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Reading time written for every feed article.
pub const DEFAULT_READ_TIME: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_logo: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(with = "iso_date", default = "epoch")]
    pub date: DateTime<Utc>,
    #[serde(default = "default_read_time")]
    pub read_time: u32,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub trending: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub manual: bool,
}

fn default_read_time() -> u32 {
    DEFAULT_READ_TIME
}

// Unprioritized records (e.g. hand-edited documents) sort after feed articles.
fn default_priority() -> i32 {
    99
}

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}

/// Parse a date the way feeds and older snapshot documents write them:
/// RFC 3339 (`isoDate`, `toISOString()`) or RFC 2822 (`pubDate`).
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    use time::format_description::well_known::{Rfc2822, Rfc3339};
    use time::OffsetDateTime;

    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    // Many feeds write the obsolete zone names; map them to a numeric offset.
    let numeric = match raw.rsplit_once(' ') {
        Some((head, "GMT" | "UT" | "UTC" | "Z")) => format!("{head} +0000"),
        _ => raw.to_string(),
    };
    let parsed = OffsetDateTime::parse(raw, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(&numeric, &Rfc2822))
        .ok()?;
    let nanos = parsed.unix_timestamp_nanos();
    let secs = i64::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
    let sub = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
    Utc.timestamp_opt(secs, sub).single()
}

/// Serialize as JS-style ISO strings (`2024-05-01T10:00:00.000Z`), accept
/// anything `parse_feed_date` understands, and fall back to the epoch rather
/// than rejecting a whole document over one odd date.
mod iso_date {
    use super::*;

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw
            .as_deref()
            .and_then(parse_feed_date)
            .unwrap_or_else(epoch))
    }
}
