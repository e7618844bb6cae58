// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod actions;
pub mod api;
pub mod article;
pub mod config;
pub mod feeds;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod reconcile;
pub mod remote;
pub mod snapshot;
pub mod state;
pub mod store;

pub use crate::api::create_router;
pub use crate::article::Article;
pub use crate::orchestrator::{Pipeline, RemoteLink};
pub use crate::reconcile::{reconcile, Reconciled};
pub use crate::snapshot::Snapshot;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs filtered by `RUST_LOG` (default `archfeed=info,warn`).
/// Safe to call when a subscriber is already installed.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("archfeed=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}
