// src/reconcile.rs
//! Reconciliation engine: fresh fetch + local state + optional remote snapshot
//! → the next authoritative article collection and side-stores.
//!
//! Precedence, lowest first: local cache (and manual articles), remote
//! articles, fresh articles. Fresh data wins display fields, `archived` and
//! `manual` flags survive the overwrite. Archive status is overlaid from the
//! union of archived sets, and tombstones are applied last so deletion always
//! wins. Pure and deterministic: same inputs, same bytes out.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::article::Article;
use crate::snapshot::Snapshot;
use crate::state::LocalState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Non-archived first, then archived; priority asc, date desc, id asc.
    pub articles: Vec<Article>,
    pub archived: Vec<Article>,
    pub saved: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    pub manual: Vec<Article>,
}

impl Reconciled {
    pub fn into_state(self) -> LocalState {
        LocalState {
            cached: self.articles,
            saved: self.saved,
            archived: self.archived,
            deleted: self.deleted,
            manual: self.manual,
        }
    }
}

fn sort_key(a: &Article) -> (bool, i32, Reverse<chrono::DateTime<chrono::Utc>>, &str) {
    (a.archived, a.priority, Reverse(a.date), a.id.as_str())
}

pub fn sort_articles(articles: &mut [Article]) {
    articles.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

fn upsert(map: &mut BTreeMap<String, Article>, incoming: &Article) {
    if incoming.id.is_empty() {
        return;
    }
    let mut next = incoming.clone();
    if let Some(prev) = map.get(&incoming.id) {
        next.archived |= prev.archived;
        next.manual |= prev.manual;
    }
    map.insert(next.id.clone(), next);
}

pub fn reconcile(fresh: &[Article], local: &LocalState, remote: Option<&Snapshot>) -> Reconciled {
    let empty = Snapshot::empty();
    let remote = remote.unwrap_or(&empty);

    // Tombstones and saved ids only ever grow here.
    let deleted: BTreeSet<String> = local
        .deleted
        .iter()
        .chain(remote.deleted_articles.iter())
        .cloned()
        .collect();

    let mut map: BTreeMap<String, Article> = BTreeMap::new();
    for a in &local.cached {
        upsert(&mut map, a);
    }
    for a in &local.manual {
        let mut m = a.clone();
        m.manual = true;
        upsert(&mut map, &m);
    }
    for a in &remote.articles {
        upsert(&mut map, a);
    }
    for a in fresh {
        upsert(&mut map, a);
    }

    // Local archived record wins over the remote one for the same id.
    let mut archived_union: BTreeMap<&str, &Article> = BTreeMap::new();
    for a in remote.archived_articles.iter().chain(local.archived.iter()) {
        if !a.id.is_empty() {
            archived_union.insert(a.id.as_str(), a);
        }
    }
    for (id, stored) in archived_union {
        map.entry(id.to_string())
            .and_modify(|a| a.archived = true)
            .or_insert_with(|| {
                let mut a = stored.clone();
                a.archived = true;
                a
            });
    }

    map.retain(|id, _| !deleted.contains(id));

    let mut articles: Vec<Article> = map.into_values().collect();
    sort_articles(&mut articles);

    let archived = articles.iter().filter(|a| a.archived).cloned().collect();
    let manual = articles.iter().filter(|a| a.manual).cloned().collect();
    let saved = local
        .saved
        .iter()
        .chain(remote.saved_articles.iter())
        .filter(|id| !deleted.contains(*id))
        .cloned()
        .collect();

    Reconciled {
        articles,
        archived,
        saved,
        deleted,
        manual,
    }
}

/// Drop cached feed articles older than `cutoff` unless the user holds on to
/// them (saved, archived or manual).
pub fn prune_stale(
    cached: Vec<Article>,
    saved: &BTreeSet<String>,
    cutoff: chrono::DateTime<chrono::Utc>,
) -> Vec<Article> {
    cached
        .into_iter()
        .filter(|a| a.archived || a.manual || saved.contains(&a.id) || a.date >= cutoff)
        .collect()
}
