// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use tokio::task::JoinSet;

use crate::article::Article;
use crate::ingest::providers::{ChainOutcome, ProviderChain};
use crate::ingest::types::{FeedConfig, FeedStatus, FetchState};
use crate::normalize::{normalize_feed, NormalizeContext};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetch_total", "Feed fetches by outcome (ok/empty/error).");
        describe_counter!(
            "feed_provider_errors_total",
            "Failed provider attempts, labelled by provider."
        );
        describe_counter!("ingest_kept_total", "Items kept after normalization.");
        describe_counter!(
            "ingest_filtered_total",
            "Items dropped by the relevance filter or a tombstone."
        );
        describe_counter!("ingest_runs_total", "Scheduled cycles that ran to completion.");
        describe_counter!("remote_write_total", "Successful remote snapshot writes.");
        describe_counter!("remote_write_errors_total", "Failed remote snapshot writes.");
        describe_gauge!("reconcile_articles", "Articles in the last reconciled view.");
        describe_gauge!(
            "ingest_cycle_last_run_ts",
            "Unix ts when the ingest cycle last completed."
        );
        describe_histogram!("feed_fetch_ms", "Per-feed fetch time in milliseconds.");
        describe_histogram!("feed_parse_ms", "Local XML parse time in milliseconds.");
    });
}

/// Fetch every feed concurrently. Results come back in the order of `feeds`,
/// whatever order the tasks finish in.
pub async fn fetch_all(
    feeds: &[FeedConfig],
    chain: Arc<ProviderChain>,
) -> Vec<(FeedConfig, ChainOutcome)> {
    let mut set = JoinSet::new();
    for (idx, feed) in feeds.iter().cloned().enumerate() {
        let chain = Arc::clone(&chain);
        set.spawn(async move {
            let started = Instant::now();
            let outcome = chain.fetch_feed_items(&feed.url).await;
            histogram!("feed_fetch_ms").record(started.elapsed().as_secs_f64() * 1000.0);
            (idx, feed, outcome)
        });
    }

    let mut slots: Vec<Option<(FeedConfig, ChainOutcome)>> =
        (0..feeds.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, feed, outcome)) => slots[idx] = Some((feed, outcome)),
            Err(e) => tracing::warn!(target: "ingest", error = ?e, "feed task failed"),
        }
    }

    // A panicked task still gets a slot, reported as a failed chain.
    slots
        .into_iter()
        .zip(feeds.iter())
        .map(|(slot, feed)| {
            slot.unwrap_or_else(|| {
                (
                    feed.clone(),
                    ChainOutcome {
                        errors: vec!["feed task aborted".to_string()],
                        ..ChainOutcome::default()
                    },
                )
            })
        })
        .collect()
}

pub fn feed_status(outcome: &ChainOutcome) -> FeedStatus {
    let status = match (outcome.provider, outcome.items.is_empty()) {
        (None, _) => FetchState::Error,
        (Some(_), true) => FetchState::Empty,
        (Some(_), false) => FetchState::Ok,
    };
    FeedStatus {
        status,
        item_count: outcome.items.len(),
        provider: outcome.provider.map(str::to_string),
    }
}

/// Result of one pass over the enabled feeds.
#[derive(Debug, Default)]
pub struct IngestRun {
    /// Normalized articles in feed order, duplicates across feeds included.
    pub articles: Vec<Article>,
    /// Keyed by feed source name.
    pub statuses: BTreeMap<String, FeedStatus>,
    pub kept: usize,
    pub filtered: usize,
}

impl IngestRun {
    /// Every enabled feed exhausted its provider chain (vacuously true with no feeds).
    pub fn all_failed(&self) -> bool {
        self.statuses.values().all(|s| s.status == FetchState::Error)
    }
}

/// Fetch and normalize all enabled feeds once.
pub async fn run_once(
    feeds: &[FeedConfig],
    chain: Arc<ProviderChain>,
    deleted: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> IngestRun {
    ensure_metrics_described();

    let enabled: Vec<FeedConfig> = feeds.iter().filter(|f| f.enabled).cloned().collect();
    let ctx = NormalizeContext { deleted, now };
    let mut run = IngestRun::default();

    for (feed, outcome) in fetch_all(&enabled, chain).await {
        let status = feed_status(&outcome);
        let label = match status.status {
            FetchState::Ok => "ok",
            FetchState::Empty => "empty",
            FetchState::Error => "error",
        };
        counter!("feed_fetch_total", "status" => label).increment(1);
        if status.status == FetchState::Error {
            tracing::warn!(
                target: "ingest",
                source = %feed.source,
                errors = ?outcome.errors,
                "all providers failed for feed"
            );
        }

        let (articles, filtered) = normalize_feed(&outcome.items, &feed, &ctx);
        tracing::debug!(
            target: "ingest",
            source = %feed.source,
            provider = ?outcome.provider,
            items = outcome.items.len(),
            kept = articles.len(),
            filtered,
            "feed normalized"
        );
        run.kept += articles.len();
        run.filtered += filtered;
        run.articles.extend(articles);
        run.statuses.insert(feed.source.clone(), status);
    }

    counter!("ingest_kept_total").increment(run.kept as u64);
    counter!("ingest_filtered_total").increment(run.filtered as u64);
    gauge!("ingest_cycle_last_run_ts").set(now.timestamp().max(0) as f64);

    run
}
