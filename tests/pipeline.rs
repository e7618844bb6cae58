// tests/pipeline.rs
//
// Full cycles against mock feed providers, an in-memory local store and an
// in-memory remote snapshot store with the debounced writer running.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;

use archfeed::actions::ManualDraft;
use archfeed::ingest::providers::ProviderChain;
use archfeed::ingest::types::{FeedConfig, FeedProvider, FetchState, RawItem};
use archfeed::orchestrator::{sync_once, Listing, ViewStatus};
use archfeed::remote::{
    memory::MemorySnapshotStore, Credentials, ReadSource, RemoteStatus, SnapshotStore,
};
use archfeed::state::keys;
use archfeed::store::{KvStore, MemoryStore};
use archfeed::{Article, Pipeline, RemoteLink, Snapshot};

/// First provider in the chain; always blocked.
struct Blocked;

#[async_trait::async_trait]
impl FeedProvider for Blocked {
    async fn fetch_items(&self, _feed_url: &str) -> Result<Vec<RawItem>> {
        bail!("HTTP 403 Forbidden")
    }
    fn name(&self) -> &'static str {
        "blocked"
    }
}

/// Serves a fixed item list for the ArchDaily feed and fails the rest.
struct Canned;

fn raw(slug: &str, title: &str, hours_ago: i64) -> RawItem {
    RawItem {
        title: Some(title.into()),
        link: Some(format!("https://www.archdaily.com/{slug}")),
        description: Some(format!("<p>{title}</p>")),
        published: Some((Utc::now() - chrono::Duration::hours(hours_ago)).to_rfc3339()),
        ..RawItem::default()
    }
}

#[async_trait::async_trait]
impl FeedProvider for Canned {
    async fn fetch_items(&self, feed_url: &str) -> Result<Vec<RawItem>> {
        if !feed_url.contains("archdaily") {
            bail!("unreachable host");
        }
        Ok(vec![
            raw("x", "AI tool for architecture offices", 1),
            raw("a", "Generative design meets residential architecture", 2),
            raw("b", "Midjourney renders for studios", 3),
            raw("noise", "Local football results", 4),
        ])
    }
    fn name(&self) -> &'static str {
        "canned"
    }
}

fn feeds() -> Vec<FeedConfig> {
    let feed = |url: &str, source: &str| FeedConfig {
        url: url.into(),
        category: "Architecture News".into(),
        source: source.into(),
        logo: String::new(),
        priority: 1,
        require_both: true,
        enabled: true,
    };
    vec![
        feed("https://www.archdaily.com/feed", "ArchDaily"),
        feed("https://down.test/rss", "Down"),
    ]
}

fn chain() -> Arc<ProviderChain> {
    Arc::new(ProviderChain::new(
        vec![Box::new(Blocked), Box::new(Canned)],
        Duration::from_secs(2),
    ))
}

fn archived_y() -> Article {
    let mut y: Article = serde_json::from_str(
        r#"{"id":"https://www.archdaily.com/y","title":"Archived AI pavilion","priority":1,
            "date":"2024-01-10T00:00:00.000Z"}"#,
    )
    .unwrap();
    y.archived = true;
    y
}

struct Harness {
    pipeline: Arc<Pipeline>,
    local: Arc<MemoryStore>,
    remote: Arc<MemorySnapshotStore>,
}

fn harness(quiet: Duration) -> Harness {
    let remote = Arc::new(MemorySnapshotStore::new("secret"));
    remote.insert(
        "g1",
        Snapshot {
            saved_articles: vec!["p".into(), "q".into()],
            archived_articles: vec![archived_y()],
            deleted_articles: vec!["https://www.archdaily.com/x".into()],
            ..Snapshot::default()
        },
    );

    let local = Arc::new(MemoryStore::new());
    local.set(keys::SAVED_ARTICLES, r#"["q","r"]"#).unwrap();

    let link = RemoteLink::new(remote.clone(), Credentials::new("secret"), Some("g1".into()));
    let (link, _task) = link.with_debounced_writes(local.clone(), quiet);
    let pipeline = Pipeline::new(local.clone(), chain(), feeds()).with_remote(link);

    Harness {
        pipeline: Arc::new(pipeline),
        local,
        remote,
    }
}

async fn wait_for_writes(remote: &MemorySnapshotStore, n: usize) {
    for _ in 0..100 {
        if remote.write_count() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {n} remote writes, saw {}", remote.write_count());
}

#[tokio::test]
async fn cycle_merges_feeds_local_and_remote() {
    let h = harness(Duration::from_millis(50));
    let report = h.pipeline.run_cycle().await.unwrap().expect("cycle ran");
    assert_eq!(report.status, ViewStatus::Ready);

    let view = h.pipeline.view();
    let ids: Vec<&str> = view.articles.iter().map(|a| a.id.as_str()).collect();

    // tombstoned remotely, still in the feed: stays gone
    assert!(!ids.contains(&"https://www.archdaily.com/x"));
    // irrelevant item filtered
    assert!(!ids.contains(&"https://www.archdaily.com/noise"));
    // archived item retained although it is not in the feed, and sorted last
    assert_eq!(ids.last(), Some(&"https://www.archdaily.com/y"));
    assert_eq!(view.select(Listing::Archived, None).len(), 1);
    assert_eq!(view.select(Listing::Active, None).len(), 2);

    let saved: Vec<&str> = view.saved.iter().map(String::as_str).collect();
    assert_eq!(saved, vec!["p", "q", "r"]);

    // provider fallback and per-feed status
    assert_eq!(view.feeds["ArchDaily"].status, FetchState::Ok);
    assert_eq!(view.feeds["ArchDaily"].provider.as_deref(), Some("canned"));
    assert_eq!(view.feeds["Down"].status, FetchState::Error);

    // merged state reaches the remote after the quiet window
    wait_for_writes(&h.remote, 1).await;
    let written = h.remote.get("g1").unwrap();
    assert_eq!(written.saved_articles, vec!["p", "q", "r"]);
    assert_eq!(written.version, "1.0");
    assert!(!written.export_date.is_empty());
    assert_eq!(h.pipeline.remote_status(), RemoteStatus::Connected);
}

#[tokio::test]
async fn second_cycle_is_stable() {
    let h = harness(Duration::from_millis(50));
    h.pipeline.run_cycle().await.unwrap();
    let first = h.pipeline.view().articles.clone();
    h.pipeline.run_cycle().await.unwrap();
    let second = h.pipeline.view().articles.clone();
    let ids = |v: &[Article]| v.iter().map(|a| a.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn user_edits_persist_and_sync() {
    let h = harness(Duration::from_millis(50));
    h.pipeline.run_cycle().await.unwrap();
    wait_for_writes(&h.remote, 1).await;

    let a = "https://www.archdaily.com/a";
    assert!(h.pipeline.toggle_save(a).await.unwrap());
    h.pipeline.archive("https://www.archdaily.com/b").await.unwrap();
    h.pipeline.delete(a).await.unwrap();
    let manual = h
        .pipeline
        .add_manual(ManualDraft {
            title: "Our BIM workflow with AI".into(),
            url: "https://blog.test/bim".into(),
            ..ManualDraft::default()
        })
        .await
        .unwrap();
    assert!(manual.id.starts_with("manual-"));

    // the burst collapses into (at least) one more write; let it settle
    wait_for_writes(&h.remote, 2).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let written = h.remote.get("g1").unwrap();
    assert!(written.deleted_articles.contains(&a.to_string()));
    assert!(!written.saved_articles.contains(&a.to_string()));
    assert_eq!(written.archived_articles.len(), 2);
    assert!(written.articles.iter().any(|x| x.id == manual.id && x.manual));

    // local store holds the same
    let deleted = h.local.get(keys::DELETED_ARTICLES).unwrap().unwrap();
    assert!(deleted.contains("archdaily.com/a"));

    // the next fetch does not bring the deleted article back
    h.pipeline.run_cycle().await.unwrap();
    assert!(h.pipeline.view().articles.iter().all(|x| x.id != a));
    assert!(h.pipeline.view().articles.iter().any(|x| x.id == manual.id));
}

#[tokio::test]
async fn import_export_and_remote_load() {
    // Long quiet window: the import must not be written back before the remote load.
    let h = harness(Duration::from_secs(60));

    let err = h.pipeline.import(r#"{"savedArticles": []}"#).await.unwrap_err();
    assert!(format!("{err:#}").contains("articles"));
    assert!(h.pipeline.export().articles.is_empty());

    let doc = r#"{"articles":[{"id":"imp-1","title":"Imported AI study","priority":1}],
                  "savedArticles":["imp-1"],"deletedArticles":[]}"#;
    assert_eq!(h.pipeline.import(doc).await.unwrap(), 1);
    let exported = h.pipeline.export();
    assert_eq!(exported.articles[0].id, "imp-1");
    assert!(exported.saved_articles.contains(&"imp-1".to_string()));

    // manual remote load merges without any fetch
    let n = h.pipeline.load_from_remote().await.unwrap();
    assert_eq!(n, 2);
    assert!(h.pipeline.view().feeds.is_empty());
}

#[tokio::test]
async fn feed_list_edits_drive_the_next_cycle() {
    let h = harness(Duration::from_millis(50));
    assert!(h.pipeline.set_feed_enabled("Down", false).await.unwrap());
    assert!(h.pipeline.remove_feed("ArchDaily").await.unwrap());
    assert_eq!(h.pipeline.feeds().len(), 1);

    let report = h.pipeline.run_cycle().await.unwrap().unwrap();
    assert_eq!(report.kept, 0);
    // remote archived record still shows, so the view is not unavailable
    assert_eq!(report.status, ViewStatus::Ready);
    assert!(h.pipeline.view().feeds.is_empty());
}

/// Reads always fail; writes land in the wrapped store.
struct ReadDown(Arc<MemorySnapshotStore>);

#[async_trait::async_trait]
impl SnapshotStore for ReadDown {
    async fn fetch(&self, _id: &str, _credentials: Option<&Credentials>) -> Result<Snapshot> {
        bail!("502 Bad Gateway")
    }
    async fn write(
        &self,
        id: Option<&str>,
        snapshot: &Snapshot,
        credentials: &Credentials,
    ) -> Result<String> {
        self.0.write(id, snapshot, credentials).await
    }
    fn name(&self) -> &'static str {
        "read-down"
    }
}

#[tokio::test]
async fn failed_remote_read_holds_back_writes() {
    let inner = Arc::new(MemorySnapshotStore::new("secret"));
    inner.insert(
        "g1",
        Snapshot {
            saved_articles: vec!["other-device-saved".into()],
            deleted_articles: vec!["other-device-deleted".into()],
            ..Snapshot::default()
        },
    );
    let local = Arc::new(MemoryStore::new());
    let store: Arc<dyn SnapshotStore> = Arc::new(ReadDown(inner.clone()));
    let link = RemoteLink::new(store, Credentials::new("secret"), Some("g1".into()));
    let (link, _task) = link.with_debounced_writes(local.clone(), Duration::from_millis(50));
    let pipeline = Pipeline::new(local, chain(), feeds()).with_remote(link);

    let report = pipeline.run_cycle().await.unwrap().unwrap();
    assert_eq!(report.remote, Some(ReadSource::Unavailable));
    assert_eq!(report.status, ViewStatus::Ready);

    // user edits stay local too
    pipeline
        .toggle_save("https://www.archdaily.com/a")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(inner.write_count(), 0);
    let remote = inner.get("g1").unwrap();
    assert_eq!(remote.saved_articles, vec!["other-device-saved"]);
    assert_eq!(remote.deleted_articles, vec!["other-device-deleted"]);
}

#[tokio::test]
async fn retention_applies_to_remote_articles() {
    let remote = Arc::new(MemorySnapshotStore::new("secret"));
    let old = |id: &str| -> Article {
        serde_json::from_str(&format!(
            r#"{{"id":"{id}","title":"Old AI studio","priority":1,"date":"2020-01-01T00:00:00Z"}}"#
        ))
        .unwrap()
    };
    remote.insert(
        "g1",
        Snapshot {
            articles: vec![old("old"), old("old-saved")],
            saved_articles: vec!["old-saved".into()],
            ..Snapshot::default()
        },
    );
    let local = Arc::new(MemoryStore::new());
    let link = RemoteLink::new(remote.clone(), Credentials::new("secret"), Some("g1".into()));
    let (link, _task) = link.with_debounced_writes(local.clone(), Duration::from_millis(50));
    let pipeline = Pipeline::new(local, chain(), feeds())
        .with_remote(link)
        .with_retention_days(30);

    pipeline.run_cycle().await.unwrap();
    wait_for_writes(&remote, 1).await;
    pipeline.run_cycle().await.unwrap();

    let ids: Vec<String> = pipeline.view().articles.iter().map(|a| a.id.clone()).collect();
    assert!(!ids.contains(&"old".to_string()));
    assert!(ids.contains(&"old-saved".to_string()));

    let written = remote.get("g1").unwrap();
    assert!(written.articles.iter().all(|a| a.id != "old"));
    assert!(written.articles.iter().any(|a| a.id == "old-saved"));
}

#[tokio::test]
async fn sync_refuses_to_write_over_an_unreadable_document() {
    let inner = Arc::new(MemorySnapshotStore::new("secret"));
    inner.insert(
        "g1",
        Snapshot {
            deleted_articles: vec!["other-device-deleted".into()],
            ..Snapshot::default()
        },
    );
    let creds = Credentials::new("secret").unwrap();
    let err = sync_once(&ReadDown(inner.clone()), "g1", &creds, chain(), feeds(), 30)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("could not be read"));
    assert_eq!(inner.write_count(), 0);
    assert_eq!(inner.get("g1").unwrap().deleted_articles, vec!["other-device-deleted"]);
}

#[tokio::test]
async fn sync_merges_and_writes_back() {
    let h = harness(Duration::from_secs(60));
    let creds = Credentials::new("secret").unwrap();
    let report = sync_once(h.remote.as_ref(), "g1", &creds, chain(), feeds(), 30)
        .await
        .unwrap();
    assert_eq!(report.cycle.status, ViewStatus::Ready);
    assert_eq!(h.remote.write_count(), 1);

    let written = h.remote.get("g1").unwrap();
    assert_eq!(written.saved_articles, vec!["p", "q"]);
    assert!(written.articles.iter().all(|a| a.id != "https://www.archdaily.com/x"));
    assert!(written.articles.iter().any(|a| a.id == "https://www.archdaily.com/a"));
    assert_eq!(written.archived_articles.len(), 1);
}
