// src/orchestrator.rs
//! Ingestion cycle and user edits around one local store.
//!
//! A cycle reads the remote snapshot, fetches and normalizes every enabled
//! feed, reconciles, persists locally and schedules a debounced remote write.
//! Every mutation of the local store goes through one writer lock; readers
//! only ever see completed views through a watch channel.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use metrics::gauge;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::actions::{self, ManualDraft};
use crate::article::Article;
use crate::feeds;
use crate::ingest::{self, providers::ProviderChain, types::FeedConfig, types::FeedStatus};
use crate::reconcile::{prune_stale, reconcile, sort_articles};
use crate::remote::{
    debounce::DebouncedWriter, read_snapshot, Credentials, ReadSource, RemoteStatus, SnapshotStore,
};
use crate::snapshot::Snapshot;
use crate::state::{keys, LocalState};
use crate::store::KvStore;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum ViewStatus {
    /// No cycle has completed and nothing is cached yet.
    Loading,
    Ready,
    /// Every feed failed and there was nothing cached or remote to show.
    Unavailable(String),
}

/// What readers see: the last completed cycle or edit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub status: ViewStatus,
    /// Active first, then archived.
    pub articles: Vec<Article>,
    pub saved: BTreeSet<String>,
    pub feeds: BTreeMap<String, FeedStatus>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Listing {
    #[default]
    Active,
    Saved,
    Archived,
}

impl View {
    fn from_state(
        status: ViewStatus,
        state: &LocalState,
        feeds: BTreeMap<String, FeedStatus>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            status,
            articles: state.cached.clone(),
            saved: state.saved.clone(),
            feeds,
            updated_at: Some(at),
        }
    }

    pub fn select(&self, listing: Listing, category: Option<&str>) -> Vec<Article> {
        self.articles
            .iter()
            .filter(|a| match listing {
                Listing::Active => !a.archived,
                Listing::Saved => self.saved.contains(&a.id),
                Listing::Archived => a.archived,
            })
            .filter(|a| category.map_or(true, |c| a.category == c))
            .cloned()
            .collect()
    }
}

/// Remote side of the pipeline. Reads work without credentials (public read);
/// writes need both credentials and a running writer.
pub struct RemoteLink {
    pub store: Arc<dyn SnapshotStore>,
    pub credentials: Option<Credentials>,
    /// Id from configuration; an id persisted locally takes precedence.
    pub configured_id: Option<String>,
    pub writer: Option<DebouncedWriter>,
}

impl RemoteLink {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        credentials: Option<Credentials>,
        configured_id: Option<String>,
    ) -> Self {
        Self {
            store,
            credentials,
            configured_id: configured_id.filter(|s| !s.trim().is_empty()),
            writer: None,
        }
    }

    /// Start the debounced writer when credentials are present.
    pub fn with_debounced_writes(
        mut self,
        local: Arc<dyn KvStore>,
        quiet: Duration,
    ) -> (Self, Option<JoinHandle<()>>) {
        let Some(creds) = self.credentials.clone() else {
            return (self, None);
        };
        let initial_id = stored_remote_id(local.as_ref()).or_else(|| self.configured_id.clone());
        let (writer, task) =
            DebouncedWriter::spawn(Arc::clone(&self.store), creds, initial_id, local, quiet);
        self.writer = Some(writer);
        (self, Some(task))
    }
}

fn stored_remote_id(store: &dyn KvStore) -> Option<String> {
    store
        .get(keys::REMOTE_ID)
        .ok()
        .flatten()
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub articles: usize,
    pub kept: usize,
    pub filtered: usize,
    pub remote: Option<ReadSource>,
    pub status: ViewStatus,
}

pub struct Pipeline {
    local: Arc<dyn KvStore>,
    chain: Arc<ProviderChain>,
    default_feeds: Vec<FeedConfig>,
    remote: Option<RemoteLink>,
    retention: chrono::Duration,
    cycle_gate: Arc<Mutex<()>>,
    writer_lock: Mutex<()>,
    /// The remote document has been read (or is ours to create) since startup
    /// or the last failed read. Writes wait for this.
    remote_synced: AtomicBool,
    view_tx: watch::Sender<Arc<View>>,
}

impl Pipeline {
    pub fn new(
        local: Arc<dyn KvStore>,
        chain: Arc<ProviderChain>,
        default_feeds: Vec<FeedConfig>,
    ) -> Self {
        // Show whatever is cached right away; the first cycle replaces it.
        let state = LocalState::load(local.as_ref());
        let initial = if state.cached.is_empty() {
            View {
                status: ViewStatus::Loading,
                articles: Vec::new(),
                saved: state.saved,
                feeds: BTreeMap::new(),
                updated_at: None,
            }
        } else {
            View::from_state(ViewStatus::Ready, &state, BTreeMap::new(), Utc::now())
        };
        let (view_tx, _) = watch::channel(Arc::new(initial));
        Self {
            local,
            chain,
            default_feeds,
            remote: None,
            retention: chrono::Duration::days(DEFAULT_RETENTION_DAYS),
            cycle_gate: Arc::new(Mutex::new(())),
            writer_lock: Mutex::new(()),
            remote_synced: AtomicBool::new(false),
            view_tx,
        }
    }

    pub fn with_remote(mut self, remote: RemoteLink) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention = chrono::Duration::days(days.max(1));
        self
    }

    pub fn view(&self) -> Arc<View> {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<View>> {
        self.view_tx.subscribe()
    }

    pub fn local_store(&self) -> &dyn KvStore {
        self.local.as_ref()
    }

    pub fn remote_status(&self) -> RemoteStatus {
        self.remote
            .as_ref()
            .and_then(|r| r.writer.as_ref())
            .map(DebouncedWriter::status)
            .unwrap_or(RemoteStatus::Disconnected)
    }

    /// Locally persisted id first, then the configured one.
    pub fn remote_id(&self) -> Option<String> {
        stored_remote_id(self.local.as_ref())
            .or_else(|| self.remote.as_ref().and_then(|r| r.configured_id.clone()))
    }

    pub fn is_cycle_running(&self) -> bool {
        self.cycle_gate.try_lock().is_err()
    }

    /// Run a cycle unless one is in flight. `Ok(None)` means it was skipped.
    pub async fn run_cycle(&self) -> Result<Option<CycleReport>> {
        let Ok(_running) = self.cycle_gate.try_lock() else {
            tracing::info!(target: "pipeline", "cycle already running, skipping");
            return Ok(None);
        };
        self.cycle(Utc::now()).await.map(Some)
    }

    /// Start a cycle in the background. False when one is already running.
    pub fn spawn_cycle(self: &Arc<Self>) -> bool {
        let Ok(running) = Arc::clone(&self.cycle_gate).try_lock_owned() else {
            return false;
        };
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.cycle(Utc::now()).await {
                tracing::warn!(target: "pipeline", error = ?e, "refresh cycle failed");
            }
            drop(running);
        });
        true
    }

    async fn read_remote(&self) -> Option<(Snapshot, ReadSource)> {
        let remote = self.remote.as_ref()?;
        let id = self.remote_id()?;
        let out = read_snapshot(remote.store.as_ref(), &id, remote.credentials.as_ref()).await;
        tracing::info!(
            target: "pipeline",
            source = ?out.source,
            articles = out.snapshot.articles.len(),
            "remote snapshot read"
        );
        Some((out.snapshot, out.source))
    }

    async fn cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let remote = self.read_remote().await;
        let remote_source = remote.as_ref().map(|(_, src)| *src);
        let mut remote_snapshot = remote.map(|(s, _)| s);
        if let Some(source) = remote_source {
            self.remote_synced
                .store(source != ReadSource::Unavailable, Ordering::SeqCst);
        }

        let feed_list = self.feeds();
        let mut deleted: BTreeSet<String> = LocalState::load(self.local.as_ref()).deleted;
        if let Some(r) = &remote_snapshot {
            deleted.extend(r.deleted_articles.iter().cloned());
        }
        let run = ingest::run_once(&feed_list, Arc::clone(&self.chain), &deleted, now).await;

        let _writer = self.writer_lock.lock().await;
        let mut local = LocalState::load(self.local.as_ref());
        let before = local.cached.len();
        let cutoff = now - self.retention;
        local.cached = prune_stale(local.cached, &local.saved, cutoff);
        if let Some(r) = remote_snapshot.as_mut() {
            let held: BTreeSet<String> = local
                .saved
                .iter()
                .chain(r.saved_articles.iter())
                .cloned()
                .collect();
            let articles = std::mem::take(&mut r.articles);
            r.articles = prune_stale(articles, &held, cutoff);
        }
        if local.cached.len() < before {
            tracing::info!(
                target: "pipeline",
                dropped = before - local.cached.len(),
                "pruned stale cached articles"
            );
        }

        let merged = reconcile(&run.articles, &local, remote_snapshot.as_ref());
        let status = if run.all_failed() && merged.articles.is_empty() {
            ViewStatus::Unavailable(
                "Could not load articles: every feed failed and there is no cached or remote data."
                    .to_string(),
            )
        } else {
            ViewStatus::Ready
        };
        let state = merged.into_state();
        if let Err(e) = state.save(self.local.as_ref()) {
            tracing::warn!(target: "pipeline", error = ?e, "persisting local state failed");
        }

        gauge!("reconcile_articles").set(state.cached.len() as f64);
        self.view_tx.send_replace(Arc::new(View::from_state(
            status.clone(),
            &state,
            run.statuses,
            now,
        )));
        if status == ViewStatus::Ready {
            self.schedule_write(&state);
        }

        tracing::info!(
            target: "pipeline",
            articles = state.cached.len(),
            kept = run.kept,
            filtered = run.filtered,
            remote = ?remote_source,
            "cycle complete"
        );
        Ok(CycleReport {
            articles: state.cached.len(),
            kept: run.kept,
            filtered: run.filtered,
            remote: remote_source,
            status,
        })
    }

    /// An existing remote document is only written once it has been read.
    /// Without an id the writer creates one.
    fn schedule_write(&self, state: &LocalState) {
        let Some(writer) = self.remote.as_ref().and_then(|r| r.writer.as_ref()) else {
            return;
        };
        if self.remote_id().is_none() {
            self.remote_synced.store(true, Ordering::SeqCst);
        } else if !self.remote_synced.load(Ordering::SeqCst) {
            tracing::warn!(
                target: "pipeline",
                "remote snapshot not read since the last failure, holding back remote write"
            );
            return;
        }
        writer.schedule(state.to_snapshot());
    }

    /// Load, edit, persist, republish and schedule a remote write, all under
    /// the writer lock. Nothing is persisted when `edit` fails.
    async fn apply<R>(&self, edit: impl FnOnce(&mut LocalState) -> Result<R>) -> Result<R> {
        let _writer = self.writer_lock.lock().await;
        let mut state = LocalState::load(self.local.as_ref());
        let out = edit(&mut state)?;
        state.save(self.local.as_ref())?;

        let feeds = self.view().feeds.clone();
        self.view_tx.send_replace(Arc::new(View::from_state(
            ViewStatus::Ready,
            &state,
            feeds,
            Utc::now(),
        )));
        self.schedule_write(&state);
        Ok(out)
    }

    pub async fn toggle_save(&self, id: &str) -> Result<bool> {
        self.apply(|s| actions::toggle_save(s, id)).await
    }

    pub async fn archive(&self, id: &str) -> Result<()> {
        self.apply(|s| actions::archive(s, id)).await
    }

    pub async fn unarchive(&self, id: &str) -> Result<bool> {
        self.apply(|s| Ok(actions::unarchive(s, id))).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.apply(|s| {
            actions::delete(s, id);
            Ok(())
        })
        .await
    }

    pub async fn add_manual(&self, draft: ManualDraft) -> Result<Article> {
        self.apply(|s| actions::add_manual(s, draft, Utc::now())).await
    }

    /// Merge a user-supplied snapshot document. Malformed input is rejected
    /// before anything is touched.
    pub async fn import(&self, json: &str) -> Result<usize> {
        let snapshot = Snapshot::parse_import(json)?;
        self.merge_snapshot(&snapshot).await
    }

    pub fn export(&self) -> Snapshot {
        LocalState::load(self.local.as_ref()).to_snapshot()
    }

    /// Manual remote read merged with local state, without fetching feeds.
    pub async fn load_from_remote(&self) -> Result<usize> {
        if self.remote.is_none() {
            bail!("no remote store configured");
        }
        let Some((snapshot, source)) = self.read_remote().await else {
            bail!("no remote snapshot id configured");
        };
        if source == ReadSource::Unavailable {
            bail!("remote snapshot could not be read");
        }
        self.remote_synced.store(true, Ordering::SeqCst);
        self.merge_snapshot(&snapshot).await
    }

    async fn merge_snapshot(&self, snapshot: &Snapshot) -> Result<usize> {
        self.apply(|state| {
            let mut merged = reconcile(&[], state, Some(snapshot)).into_state();
            sort_articles(&mut merged.cached);
            *state = merged;
            Ok(state.cached.len())
        })
        .await
    }

    pub fn feeds(&self) -> Vec<FeedConfig> {
        feeds::load_feed_list(self.local.as_ref(), &self.default_feeds)
    }

    async fn edit_feeds<R>(
        &self,
        edit: impl FnOnce(&mut Vec<FeedConfig>) -> Result<R>,
    ) -> Result<R> {
        let _writer = self.writer_lock.lock().await;
        let mut list = self.feeds();
        let out = edit(&mut list)?;
        feeds::save_feed_list(self.local.as_ref(), &list).context("saving feed list")?;
        Ok(out)
    }

    pub async fn add_feed(&self, feed: FeedConfig) -> Result<()> {
        self.edit_feeds(|list| feeds::add_feed(list, feed)).await
    }

    pub async fn remove_feed(&self, source: &str) -> Result<bool> {
        self.edit_feeds(|list| Ok(feeds::remove_feed(list, source)))
            .await
    }

    pub async fn set_feed_enabled(&self, source: &str, enabled: bool) -> Result<bool> {
        self.edit_feeds(|list| Ok(feeds::set_feed_enabled(list, source, enabled)))
            .await
    }
}

/// Outcome of [`sync_once`].
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub cycle: CycleReport,
    pub snapshot: Snapshot,
}

/// One-shot sync against a remote document: seed an in-memory store from it,
/// run one cycle and write the merged state straight back. Fails before any
/// write when the document cannot be read or the cycle produced nothing.
pub async fn sync_once(
    store: &dyn SnapshotStore,
    id: &str,
    credentials: &Credentials,
    chain: Arc<ProviderChain>,
    feeds: Vec<FeedConfig>,
    retention_days: i64,
) -> Result<SyncReport> {
    let seed = read_snapshot(store, id, Some(credentials)).await;
    if seed.source == ReadSource::Unavailable {
        bail!("remote snapshot `{id}` could not be read");
    }

    let local: Arc<dyn KvStore> = Arc::new(crate::store::MemoryStore::new());
    LocalState::from_snapshot(&seed.snapshot).save(local.as_ref())?;
    let pipeline = Pipeline::new(local, chain, feeds).with_retention_days(retention_days);

    let cycle = pipeline
        .run_cycle()
        .await?
        .context("cycle did not run")?;
    if let ViewStatus::Unavailable(message) = &cycle.status {
        bail!("{message}");
    }

    let snapshot = pipeline.export();
    store
        .write(Some(id), &snapshot, credentials)
        .await
        .context("writing merged snapshot")?;
    Ok(SyncReport { cycle, snapshot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{FeedProvider, RawItem};
    use crate::remote::memory::MemorySnapshotStore;
    use crate::store::MemoryStore;

    struct Down;

    #[async_trait::async_trait]
    impl FeedProvider for Down {
        async fn fetch_items(&self, _feed_url: &str) -> Result<Vec<RawItem>> {
            bail!("HTTP 403")
        }
        fn name(&self) -> &'static str {
            "down"
        }
    }

    fn feed() -> FeedConfig {
        FeedConfig {
            url: "https://a.test/feed".into(),
            category: "Architecture News".into(),
            source: "A".into(),
            logo: String::new(),
            priority: 1,
            require_both: true,
            enabled: true,
        }
    }

    fn down_pipeline() -> Pipeline {
        let chain = Arc::new(ProviderChain::new(vec![Box::new(Down)], Duration::from_secs(1)));
        Pipeline::new(Arc::new(MemoryStore::new()), chain, vec![feed()])
    }

    #[tokio::test]
    async fn total_failure_without_data_is_unavailable() {
        let p = down_pipeline();
        assert_eq!(p.view().status, ViewStatus::Loading);
        let report = p.run_cycle().await.unwrap().unwrap();
        assert!(matches!(report.status, ViewStatus::Unavailable(_)));
        assert!(matches!(p.view().status, ViewStatus::Unavailable(_)));
    }

    #[tokio::test]
    async fn remote_data_keeps_view_ready_when_feeds_fail() {
        let store = Arc::new(MemorySnapshotStore::new("t"));
        let mut a: Article = serde_json::from_str(r#"{"id":"r1","title":"Remote"}"#).unwrap();
        a.priority = 1;
        a.date = Utc::now();
        store.insert(
            "g1",
            Snapshot {
                articles: vec![a],
                ..Snapshot::default()
            },
        );
        let p = down_pipeline().with_remote(RemoteLink::new(store, None, Some("g1".into())));
        let report = p.run_cycle().await.unwrap().unwrap();
        assert_eq!(report.status, ViewStatus::Ready);
        assert_eq!(report.remote, Some(ReadSource::Public));
        assert_eq!(p.view().articles.len(), 1);
    }

    #[tokio::test]
    async fn overlapping_cycle_is_skipped() {
        let p = down_pipeline();
        let _held = p.cycle_gate.lock().await;
        assert!(p.is_cycle_running());
        assert!(p.run_cycle().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_import_changes_nothing() {
        let p = down_pipeline();
        p.add_manual(ManualDraft {
            title: "AI villa study".into(),
            url: "https://me.test/v".into(),
            ..ManualDraft::default()
        })
        .await
        .unwrap();
        let before = p.export();
        assert!(p.import(r#"{"articles": "nope"}"#).await.is_err());
        let after = p.export();
        assert_eq!(before.articles, after.articles);
    }

    #[test]
    fn select_filters_by_listing_and_category() {
        let mut a: Article =
            serde_json::from_str(r#"{"id":"a","category":"BIM & Digital Tools"}"#).unwrap();
        let mut b = a.clone();
        b.id = "b".into();
        b.archived = true;
        a.category = "Residential".into();
        let view = View {
            status: ViewStatus::Ready,
            articles: vec![a, b],
            saved: ["b".to_string()].into(),
            feeds: BTreeMap::new(),
            updated_at: None,
        };
        assert_eq!(view.select(Listing::Active, None).len(), 1);
        assert_eq!(view.select(Listing::Archived, None)[0].id, "b");
        assert_eq!(view.select(Listing::Saved, None)[0].id, "b");
        assert!(view.select(Listing::Active, Some("BIM & Digital Tools")).is_empty());
    }
}
