// src/ingest/providers/mod.rs
//! Feed providers and the ordered fallback chain that drives them.

pub mod json_feed;
pub mod rss2json;
pub mod xml_feed;

use std::time::Duration;

use anyhow::{Context, Result};
use metrics::counter;

use crate::ingest::types::{FeedProvider, RawItem};

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);
pub const USER_AGENT: &str = "archfeed/0.1 (+rss sync)";

/// Shared reqwest client for all providers.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .timeout(timeout)
        .build()
        .context("building feed http client")
}

/// What one walk down the chain produced.
#[derive(Debug, Default)]
pub struct ChainOutcome {
    pub items: Vec<RawItem>,
    /// Provider that succeeded, None if every attempt failed.
    pub provider: Option<&'static str>,
    /// `provider: error` lines for the attempts that failed.
    pub errors: Vec<String>,
}

/// Providers tried in order; the first success wins.
pub struct ProviderChain {
    providers: Vec<Box<dyn FeedProvider>>,
    attempt_timeout: Duration,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn FeedProvider>>, attempt_timeout: Duration) -> Self {
        Self {
            providers,
            attempt_timeout,
        }
    }

    /// rss2json → JSON Feed conversion → raw XML, sharing one client.
    pub fn standard(
        rss2json_endpoint: &str,
        jsonfeed_endpoint: &str,
        attempt_timeout: Duration,
    ) -> Result<Self> {
        let client = http_client(attempt_timeout)?;
        Ok(Self::new(
            vec![
                Box::new(rss2json::Rss2JsonProvider::new(
                    rss2json_endpoint,
                    client.clone(),
                )),
                Box::new(json_feed::JsonFeedProvider::new(
                    jsonfeed_endpoint,
                    client.clone(),
                )),
                Box::new(xml_feed::XmlFeedProvider::new(client)),
            ],
            attempt_timeout,
        ))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Never fails: an exhausted chain yields no items and the collected errors.
    pub async fn fetch_feed_items(&self, feed_url: &str) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();
        for p in &self.providers {
            let attempt = tokio::time::timeout(self.attempt_timeout, p.fetch_items(feed_url)).await;
            let err = match attempt {
                Ok(Ok(items)) => {
                    outcome.items = items;
                    outcome.provider = Some(p.name());
                    return outcome;
                }
                Ok(Err(e)) => format!("{e:#}"),
                Err(_) => format!("timed out after {}s", self.attempt_timeout.as_secs()),
            };
            tracing::debug!(
                target: "ingest",
                provider = p.name(),
                url = feed_url,
                error = %err,
                "provider attempt failed, falling through"
            );
            counter!("feed_provider_errors_total", "provider" => p.name()).increment(1);
            outcome.errors.push(format!("{}: {err}", p.name()));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct Failing(&'static str);

    #[async_trait]
    impl FeedProvider for Failing {
        async fn fetch_items(&self, _feed_url: &str) -> Result<Vec<RawItem>> {
            Err(anyhow!("HTTP status client error (403 Forbidden)"))
        }
        fn name(&self) -> &'static str {
            self.0
        }
    }

    struct Slow;

    #[async_trait]
    impl FeedProvider for Slow {
        async fn fetch_items(&self, _feed_url: &str) -> Result<Vec<RawItem>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
        fn name(&self) -> &'static str {
            "slow"
        }
    }

    struct Fixed;

    #[async_trait]
    impl FeedProvider for Fixed {
        async fn fetch_items(&self, feed_url: &str) -> Result<Vec<RawItem>> {
            Ok(vec![RawItem {
                title: Some("t".into()),
                link: Some(format!("{feed_url}/1")),
                ..RawItem::default()
            }])
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn falls_through_to_first_success() {
        let chain = ProviderChain::new(
            vec![Box::new(Failing("a")), Box::new(Fixed), Box::new(Failing("c"))],
            Duration::from_secs(1),
        );
        let out = chain.fetch_feed_items("https://feed.test").await;
        assert_eq!(out.provider, Some("fixed"));
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].starts_with("a: "));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_and_falls_through() {
        let chain = ProviderChain::new(
            vec![Box::new(Slow), Box::new(Fixed)],
            Duration::from_secs(15),
        );
        let out = chain.fetch_feed_items("https://feed.test").await;
        assert_eq!(out.provider, Some("fixed"));
        assert!(out.errors[0].contains("timed out"));
    }

    #[tokio::test]
    async fn exhausted_chain_is_empty_not_an_error() {
        let chain = ProviderChain::new(
            vec![Box::new(Failing("a")), Box::new(Failing("b"))],
            Duration::from_secs(1),
        );
        let out = chain.fetch_feed_items("https://feed.test").await;
        assert!(out.items.is_empty());
        assert_eq!(out.provider, None);
        assert_eq!(out.errors.len(), 2);
    }
}
