// src/remote/mod.rs
//! Remote snapshot store: one JSON document behind an id, read with an
//! authenticated-then-public fallback and written through a debouncer.

pub mod debounce;
pub mod gist;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::snapshot::Snapshot;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let token = token.trim();
        (!token.is_empty()).then(|| Self {
            token: token.to_string(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials {{ token: <{} chars> }}", self.token.len())
    }
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Single read attempt; `None` credentials means a public read.
    async fn fetch(&self, id: &str, credentials: Option<&Credentials>) -> Result<Snapshot>;
    /// Create when `id` is None, update otherwise. Returns the document id.
    async fn write(
        &self,
        id: Option<&str>,
        snapshot: &Snapshot,
        credentials: &Credentials,
    ) -> Result<String>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadSource {
    Authenticated,
    Public,
    /// Both paths failed; the snapshot is empty.
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub snapshot: Snapshot,
    pub source: ReadSource,
}

/// Never fails: authenticated read, then public read, then an empty snapshot.
pub async fn read_snapshot(
    store: &dyn SnapshotStore,
    id: &str,
    credentials: Option<&Credentials>,
) -> ReadOutcome {
    if let Some(creds) = credentials {
        match store.fetch(id, Some(creds)).await {
            Ok(snapshot) => {
                return ReadOutcome {
                    snapshot,
                    source: ReadSource::Authenticated,
                }
            }
            Err(e) => tracing::warn!(
                target: "remote",
                store = store.name(),
                error = ?e,
                "authenticated read failed, retrying as public read"
            ),
        }
    }
    match store.fetch(id, None).await {
        Ok(snapshot) => ReadOutcome {
            snapshot,
            source: ReadSource::Public,
        },
        Err(e) => {
            tracing::warn!(
                target: "remote",
                store = store.name(),
                error = ?e,
                "public read failed, continuing with empty snapshot"
            );
            ReadOutcome {
                snapshot: Snapshot::empty(),
                source: ReadSource::Unavailable,
            }
        }
    }
}

/// Connection state of the remote store as observers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum RemoteStatus {
    Disconnected,
    Connected,
    Syncing,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::memory::MemorySnapshotStore;
    use super::*;

    fn doc() -> Snapshot {
        Snapshot {
            saved_articles: vec!["p".into()],
            ..Snapshot::default()
        }
    }

    #[tokio::test]
    async fn bad_token_falls_back_to_public() {
        let store = MemorySnapshotStore::new("secret");
        store.insert("g1", doc());
        let bad = Credentials::new("wrong");
        let out = read_snapshot(&store, "g1", bad.as_ref()).await;
        assert_eq!(out.source, ReadSource::Public);
        assert_eq!(out.snapshot.saved_articles, vec!["p".to_string()]);
    }

    #[tokio::test]
    async fn good_token_reads_authenticated() {
        let store = MemorySnapshotStore::new("secret");
        store.insert("g1", doc());
        let creds = Credentials::new("secret");
        let out = read_snapshot(&store, "g1", creds.as_ref()).await;
        assert_eq!(out.source, ReadSource::Authenticated);
    }

    #[tokio::test]
    async fn both_paths_failing_yield_empty_snapshot() {
        let store = MemorySnapshotStore::new("secret").private();
        store.insert("g1", doc());
        let out = read_snapshot(&store, "g1", None).await;
        assert_eq!(out.source, ReadSource::Unavailable);
        assert!(out.snapshot.is_empty());
    }

    #[test]
    fn blank_token_is_no_credentials() {
        assert!(Credentials::new("  ").is_none());
        let c = Credentials::new("abc").unwrap();
        assert!(!format!("{c:?}").contains("abc"));
    }
}
