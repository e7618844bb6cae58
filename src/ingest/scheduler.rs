// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::orchestrator::Pipeline;

/// Run a cycle at startup and then every `every`. A tick that lands while a
/// cycle is still running is skipped rather than queued.
pub fn spawn_scheduler(pipeline: Arc<Pipeline>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match pipeline.run_cycle().await {
                Ok(Some(report)) => {
                    counter!("ingest_runs_total").increment(1);
                    tracing::info!(
                        target: "ingest",
                        articles = report.articles,
                        kept = report.kept,
                        filtered = report.filtered,
                        status = ?report.status,
                        "scheduled cycle finished"
                    );
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(target: "ingest", error = ?e, "scheduled cycle failed"),
            }
        }
    })
}
