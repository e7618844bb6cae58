// src/remote/memory.rs
//! In-process snapshot store with token checks, for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::{Credentials, SnapshotStore};
use crate::snapshot::Snapshot;

pub struct MemorySnapshotStore {
    docs: Mutex<HashMap<String, Snapshot>>,
    token: String,
    public: bool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    next_id: AtomicUsize,
}

impl MemorySnapshotStore {
    /// Publicly readable; authenticated calls must present `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            token: token.into(),
            public: true,
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Reject unauthenticated reads.
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn insert(&self, id: &str, snapshot: Snapshot) {
        if let Ok(mut docs) = self.docs.lock() {
            docs.insert(id.to_string(), snapshot);
        }
    }

    pub fn get(&self, id: &str) -> Option<Snapshot> {
        self.docs.lock().ok().and_then(|d| d.get(id).cloned())
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self, credentials: &Credentials) -> Result<()> {
        if credentials.token != self.token {
            bail!("401 Unauthorized: bad credentials");
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn fetch(&self, id: &str, credentials: Option<&Credentials>) -> Result<Snapshot> {
        match credentials {
            Some(c) => self.check(c)?,
            None if !self.public => bail!("404 Not Found: private document"),
            None => {}
        }
        self.get(id)
            .ok_or_else(|| anyhow!("404 Not Found: no document `{id}`"))
    }

    async fn write(
        &self,
        id: Option<&str>,
        snapshot: &Snapshot,
        credentials: &Credentials,
    ) -> Result<String> {
        self.check(credentials)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("403 Forbidden: rate limit exceeded");
        }
        let id = match id {
            Some(id) => id.to_string(),
            None => format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        self.insert(&id, snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
