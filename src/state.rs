// src/state.rs
//! Local user state and its layout in the key-value store.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::article::Article;
use crate::snapshot::Snapshot;
use crate::store::KvStore;

pub mod keys {
    pub const CACHED_ARTICLES: &str = "cachedArticles";
    pub const SAVED_ARTICLES: &str = "savedArticles";
    pub const ARCHIVED_ARTICLES: &str = "archivedArticles";
    pub const DELETED_ARTICLES: &str = "deletedArticles";
    pub const MANUAL_ARTICLES: &str = "manualArticles";
    pub const CUSTOM_FEEDS: &str = "customFeeds";
    pub const REMOTE_ID: &str = "gistId";
    pub const REMOTE_TOKEN: &str = "gistToken";
}

/// Everything the reconciliation engine needs from the local side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    pub cached: Vec<Article>,
    pub saved: BTreeSet<String>,
    pub archived: Vec<Article>,
    pub deleted: BTreeSet<String>,
    pub manual: Vec<Article>,
}

impl LocalState {
    /// Missing or unreadable keys load as empty collections.
    pub fn load(store: &dyn KvStore) -> Self {
        Self {
            cached: load_json(store, keys::CACHED_ARTICLES),
            saved: load_json(store, keys::SAVED_ARTICLES),
            archived: load_json(store, keys::ARCHIVED_ARTICLES),
            deleted: load_json(store, keys::DELETED_ARTICLES),
            manual: load_json(store, keys::MANUAL_ARTICLES),
        }
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<()> {
        save_json(store, keys::CACHED_ARTICLES, &self.cached)?;
        save_json(store, keys::SAVED_ARTICLES, &self.saved)?;
        save_json(store, keys::ARCHIVED_ARTICLES, &self.archived)?;
        save_json(store, keys::DELETED_ARTICLES, &self.deleted)?;
        save_json(store, keys::MANUAL_ARTICLES, &self.manual)?;
        Ok(())
    }

    /// Export document for the remote store or a JSON download.
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            articles: self.cached.clone(),
            saved_articles: self.saved.iter().cloned().collect(),
            archived_articles: self.archived.clone(),
            deleted_articles: self.deleted.iter().cloned().collect(),
            ..Snapshot::default()
        }
        .stamped()
    }

    /// Seed from a snapshot, as the one-shot sync does with the remote document.
    pub fn from_snapshot(s: &Snapshot) -> Self {
        Self {
            cached: s.articles.clone(),
            saved: s.saved_articles.iter().cloned().collect(),
            archived: s.archived_articles.clone(),
            deleted: s.deleted_articles.iter().cloned().collect(),
            manual: s.articles.iter().filter(|a| a.manual).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cached.is_empty() && self.archived.is_empty() && self.manual.is_empty()
    }
}

pub fn load_json<T: DeserializeOwned + Default>(store: &dyn KvStore, key: &str) -> T {
    match store.get(key) {
        Ok(Some(s)) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!(
                target: "state",
                key,
                error = %e,
                "stored value unreadable, using empty"
            );
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(target: "state", key, error = ?e, "store read failed, using empty");
            T::default()
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string(value).with_context(|| format!("serializing `{key}`"))?;
    store.set(key, &s).with_context(|| format!("persisting `{key}`"))
}
