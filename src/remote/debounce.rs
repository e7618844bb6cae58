// src/remote/debounce.rs
//! Background writer that coalesces bursts of state changes into one remote
//! write after a quiet window.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{Credentials, RemoteStatus, SnapshotStore};
use crate::snapshot::Snapshot;
use crate::state::keys;
use crate::store::KvStore;

pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<Snapshot>,
    status: watch::Receiver<RemoteStatus>,
}

impl DebouncedWriter {
    /// Spawn the writer task. A newly created document id is persisted to
    /// `local` under the remote-id key so later reads and writes target it.
    pub fn spawn(
        store: Arc<dyn SnapshotStore>,
        credentials: Credentials,
        initial_id: Option<String>,
        local: Arc<dyn KvStore>,
        quiet: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = if initial_id.is_some() {
            RemoteStatus::Connected
        } else {
            RemoteStatus::Disconnected
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let task = tokio::spawn(run(
            rx,
            status_tx,
            store,
            credentials,
            initial_id,
            local,
            quiet,
        ));
        (
            Self {
                tx,
                status: status_rx,
            },
            task,
        )
    }

    /// Signal a state change; only the latest snapshot of a burst is written.
    pub fn schedule(&self, snapshot: Snapshot) {
        if self.tx.send(snapshot).is_err() {
            tracing::warn!(target: "remote", "debounced writer is gone, dropping snapshot");
        }
    }

    pub fn status(&self) -> RemoteStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RemoteStatus> {
        self.status.clone()
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Snapshot>,
    status: watch::Sender<RemoteStatus>,
    store: Arc<dyn SnapshotStore>,
    credentials: Credentials,
    mut id: Option<String>,
    local: Arc<dyn KvStore>,
    quiet: Duration,
) {
    let mut last_written: Option<String> = None;

    while let Some(first) = rx.recv().await {
        let mut latest = first;
        // Every new signal restarts the quiet window.
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(s) => latest = s,
                    None => break,
                },
                _ = tokio::time::sleep(quiet) => break,
            }
        }

        let fp = latest.fingerprint();
        if last_written.as_deref() == Some(fp.as_str()) {
            tracing::debug!(target: "remote", "snapshot unchanged since last write, skipping");
            continue;
        }

        let _ = status.send(RemoteStatus::Syncing);
        match store.write(id.as_deref(), &latest, &credentials).await {
            Ok(new_id) => {
                if id.as_deref() != Some(new_id.as_str()) {
                    tracing::info!(target: "remote", id = %new_id, "created remote snapshot");
                    if let Err(e) = local.set(keys::REMOTE_ID, &new_id) {
                        tracing::warn!(target: "remote", error = ?e, "could not persist remote id");
                    }
                    id = Some(new_id);
                }
                last_written = Some(fp);
                counter!("remote_write_total").increment(1);
                let _ = status.send(RemoteStatus::Connected);
            }
            Err(e) => {
                // Local state is untouched; the next signal retries.
                tracing::warn!(target: "remote", error = ?e, "remote write failed");
                counter!("remote_write_errors_total").increment(1);
                let _ = status.send(RemoteStatus::Error(format!("{e:#}")));
            }
        }
    }
}
