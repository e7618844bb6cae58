//! archfeed service entrypoint.
//! Boots the Axum HTTP server, the feed scheduler and the debounced remote writer.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use archfeed::config::AppConfig;
use archfeed::ingest::{config::load_feeds_default, providers::ProviderChain, scheduler};
use archfeed::metrics::Metrics;
use archfeed::remote::{gist::GistStore, Credentials, SnapshotStore};
use archfeed::state::keys;
use archfeed::store::{FileStore, KvStore};
use archfeed::{create_router, Pipeline, RemoteLink};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    archfeed::init_tracing();

    let cfg = AppConfig::from_env()?;
    let local: Arc<dyn KvStore> = Arc::new(
        FileStore::open(&cfg.data_dir)
            .with_context(|| format!("opening data dir {}", cfg.data_dir.display()))?,
    );

    let feeds = load_feeds_default().unwrap_or_else(|e| {
        tracing::warn!(error = ?e, "feed list unreadable, using built-in defaults");
        archfeed::ingest::config::default_feeds()
    });
    let chain = Arc::new(ProviderChain::standard(
        &cfg.rss2json_endpoint,
        &cfg.jsonfeed_endpoint,
        cfg.fetch_timeout,
    )?);

    // Token from the environment, else the one saved locally.
    let credentials = cfg.credentials().or_else(|| {
        local
            .get(keys::REMOTE_TOKEN)
            .ok()
            .flatten()
            .and_then(|t| Credentials::new(t.trim_matches('"')))
    });
    let gist: Arc<dyn SnapshotStore> = Arc::new(GistStore::new(cfg.gist_file.clone())?);
    let (remote, _writer) = RemoteLink::new(gist, credentials, cfg.gist_id.clone())
        .with_debounced_writes(Arc::clone(&local), cfg.debounce);

    let pipeline = Arc::new(
        Pipeline::new(Arc::clone(&local), chain, feeds)
            .with_retention_days(cfg.retention_days)
            .with_remote(remote),
    );

    let metrics = Metrics::init()?;
    scheduler::spawn_scheduler(Arc::clone(&pipeline), cfg.refresh_every);

    tracing::info!(
        data_dir = %cfg.data_dir.display(),
        refresh_secs = cfg.refresh_every.as_secs(),
        remote = pipeline.remote_id().is_some(),
        "archfeed started"
    );
    let router = create_router(pipeline, &metrics);

    Ok(router.into())
}
