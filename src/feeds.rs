// src/feeds.rs
//! User-managed feed list, persisted under `customFeeds` and seeded from the
//! configured defaults the first time it is read.

use anyhow::{bail, Result};

use crate::ingest::types::FeedConfig;
use crate::state::{keys, save_json};
use crate::store::KvStore;

/// Stored list when present and readable, otherwise `defaults`.
pub fn load_feed_list(store: &dyn KvStore, defaults: &[FeedConfig]) -> Vec<FeedConfig> {
    match store.get(keys::CUSTOM_FEEDS) {
        Ok(Some(s)) => match serde_json::from_str::<Vec<FeedConfig>>(&s) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(
                    target: "feeds",
                    error = %e,
                    "stored feed list unreadable, using defaults"
                );
                defaults.to_vec()
            }
        },
        Ok(None) => defaults.to_vec(),
        Err(e) => {
            tracing::warn!(target: "feeds", error = ?e, "feed list read failed, using defaults");
            defaults.to_vec()
        }
    }
}

pub fn save_feed_list(store: &dyn KvStore, feeds: &[FeedConfig]) -> Result<()> {
    save_json(store, keys::CUSTOM_FEEDS, feeds)
}

fn position(feeds: &[FeedConfig], source: &str) -> Option<usize> {
    feeds
        .iter()
        .position(|f| f.source.eq_ignore_ascii_case(source.trim()))
}

/// Append a feed. Source names are unique (case-insensitive) because feed
/// status is reported per source.
pub fn add_feed(feeds: &mut Vec<FeedConfig>, mut feed: FeedConfig) -> Result<()> {
    feed.url = feed.url.trim().to_string();
    feed.source = feed.source.trim().to_string();
    if feed.url.is_empty() {
        bail!("feed url is required");
    }
    if !(feed.url.starts_with("http://") || feed.url.starts_with("https://")) {
        bail!("feed url must be http(s): {}", feed.url);
    }
    if feed.source.is_empty() {
        bail!("feed source name is required");
    }
    if position(feeds, &feed.source).is_some() {
        bail!("a feed named `{}` already exists", feed.source);
    }
    feeds.push(feed);
    Ok(())
}

/// Returns false when no feed has that source name.
pub fn remove_feed(feeds: &mut Vec<FeedConfig>, source: &str) -> bool {
    match position(feeds, source) {
        Some(i) => {
            feeds.remove(i);
            true
        }
        None => false,
    }
}

pub fn set_feed_enabled(feeds: &mut [FeedConfig], source: &str, enabled: bool) -> bool {
    match position(feeds, source) {
        Some(i) => {
            feeds[i].enabled = enabled;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::config::default_feeds;
    use crate::store::MemoryStore;

    fn custom(source: &str) -> FeedConfig {
        FeedConfig {
            url: "https://custom.test/rss".into(),
            category: "Custom".into(),
            source: source.into(),
            logo: String::new(),
            priority: 2,
            require_both: false,
            enabled: true,
        }
    }

    #[test]
    fn seeded_from_defaults_until_saved() {
        let store = MemoryStore::new();
        let defaults = default_feeds();
        let mut list = load_feed_list(&store, &defaults);
        assert_eq!(list, defaults);

        add_feed(&mut list, custom("Custom")).unwrap();
        save_feed_list(&store, &list).unwrap();
        let reloaded = load_feed_list(&store, &defaults);
        assert_eq!(reloaded.len(), defaults.len() + 1);
        assert_eq!(reloaded.last().unwrap().source, "Custom");
    }

    #[test]
    fn add_rejects_duplicates_and_bad_urls() {
        let mut list = vec![custom("Custom")];
        assert!(add_feed(&mut list, custom("custom")).is_err());
        let mut bad = custom("Other");
        bad.url = "ftp://x".into();
        assert!(add_feed(&mut list, bad).is_err());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_and_toggle_by_source() {
        let mut list = vec![custom("A"), custom("B")];
        assert!(set_feed_enabled(&mut list, "b", false));
        assert!(!list[1].enabled);
        assert!(remove_feed(&mut list, "A"));
        assert!(!remove_feed(&mut list, "A"));
        assert_eq!(list.len(), 1);
    }
}
