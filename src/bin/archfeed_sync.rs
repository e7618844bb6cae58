//! One-shot sync: seed from the gist, run one ingestion cycle, write the
//! merged document straight back.
//!
//! Requires GIST_ID and GIST_TOKEN (a `.env` file is honored).

use std::sync::Arc;

use anyhow::{anyhow, Result};

use archfeed::config::AppConfig;
use archfeed::ingest::{config::load_feeds_default, providers::ProviderChain};
use archfeed::orchestrator::sync_once;
use archfeed::remote::gist::GistStore;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    archfeed::init_tracing();

    let cfg = AppConfig::from_env()?;
    let id = cfg
        .gist_id
        .clone()
        .ok_or_else(|| anyhow!("GIST_ID is not set"))?;
    let credentials = cfg
        .credentials()
        .ok_or_else(|| anyhow!("GIST_TOKEN is not set"))?;

    let gist = GistStore::new(cfg.gist_file.clone())?;
    let chain = Arc::new(ProviderChain::standard(
        &cfg.rss2json_endpoint,
        &cfg.jsonfeed_endpoint,
        cfg.fetch_timeout,
    )?);

    let report = sync_once(
        &gist,
        &id,
        &credentials,
        chain,
        load_feeds_default()?,
        cfg.retention_days,
    )
    .await?;

    let snapshot = &report.snapshot;
    tracing::info!(
        gist = %id,
        articles = snapshot.articles.len(),
        saved = snapshot.saved_articles.len(),
        archived = snapshot.archived_articles.len(),
        deleted = snapshot.deleted_articles.len(),
        kept = report.cycle.kept,
        "sync complete"
    );
    Ok(())
}
