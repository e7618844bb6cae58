// src/actions.rs
//! User edits applied to [`LocalState`]. Pure: callers persist and publish.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::article::{Article, DEFAULT_READ_TIME};
use crate::normalize::{categorize, extract_keywords, summarize};
use crate::reconcile::sort_articles;
use crate::state::LocalState;

pub const MANUAL_SOURCE: &str = "Manual";
pub const MANUAL_CATEGORY: &str = "Manual Entry";

/// Fields a user supplies for a hand-added article.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualDraft {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

fn find<'a>(state: &'a LocalState, id: &str) -> Option<&'a Article> {
    state
        .cached
        .iter()
        .chain(state.manual.iter())
        .chain(state.archived.iter())
        .find(|a| a.id == id)
}

/// Returns whether the id is saved afterwards.
pub fn toggle_save(state: &mut LocalState, id: &str) -> Result<bool> {
    if state.deleted.contains(id) {
        bail!("article `{id}` was deleted");
    }
    if state.saved.remove(id) {
        return Ok(false);
    }
    state.saved.insert(id.to_string());
    Ok(true)
}

/// Keep a full copy in the archived set and flag the cached record.
pub fn archive(state: &mut LocalState, id: &str) -> Result<()> {
    let Some(found) = find(state, id) else {
        bail!("no article with id `{id}`");
    };
    let mut record = found.clone();
    record.archived = true;

    state.archived.retain(|a| a.id != id);
    state.archived.push(record);
    for a in state.cached.iter_mut().chain(state.manual.iter_mut()) {
        if a.id == id {
            a.archived = true;
        }
    }
    sort_articles(&mut state.cached);
    Ok(())
}

/// Returns false when the id was not archived.
pub fn unarchive(state: &mut LocalState, id: &str) -> bool {
    let before = state.archived.len();
    state.archived.retain(|a| a.id != id);
    let mut changed = state.archived.len() != before;
    for a in state.cached.iter_mut().chain(state.manual.iter_mut()) {
        if a.id == id && a.archived {
            a.archived = false;
            changed = true;
        }
    }
    sort_articles(&mut state.cached);
    changed
}

/// Tombstone the id and drop it from every other collection.
pub fn delete(state: &mut LocalState, id: &str) {
    state.deleted.insert(id.to_string());
    state.cached.retain(|a| a.id != id);
    state.archived.retain(|a| a.id != id);
    state.manual.retain(|a| a.id != id);
    state.saved.remove(id);
}

pub fn add_manual(
    state: &mut LocalState,
    draft: ManualDraft,
    now: DateTime<Utc>,
) -> Result<Article> {
    let title = draft.title.trim().to_string();
    let url = draft.url.trim().to_string();
    if title.is_empty() {
        bail!("title is required");
    }
    if url.is_empty() {
        bail!("url is required");
    }

    // Millisecond ids; bump on collision so two adds in one tick stay distinct.
    let mut millis = now.timestamp_millis();
    let mut id = format!("manual-{millis}");
    while find(state, &id).is_some() || state.deleted.contains(&id) {
        millis += 1;
        id = format!("manual-{millis}");
    }

    let summary = summarize(&draft.summary);
    let category = match draft.category.map(|c| c.trim().to_string()) {
        Some(c) if !c.is_empty() => c,
        _ => categorize(&title, &summary, MANUAL_CATEGORY),
    };
    let article = Article {
        id,
        keywords: extract_keywords(&format!("{title} {summary}")),
        title,
        summary,
        url,
        source: draft
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| MANUAL_SOURCE.to_string()),
        source_logo: "✍️".to_string(),
        category,
        date: now,
        read_time: DEFAULT_READ_TIME,
        priority: 1,
        trending: false,
        archived: false,
        manual: true,
    };

    state.manual.push(article.clone());
    state.cached.push(article.clone());
    sort_articles(&mut state.cached);
    Ok(article)
}
