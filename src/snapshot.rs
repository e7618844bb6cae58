// src/snapshot.rs
//! The exported state document shared with the remote store and JSON import/export.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::article::Article;

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub export_date: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub articles: Vec<Article>,
    #[serde(default)]
    pub saved_articles: Vec<String>,
    #[serde(default)]
    pub archived_articles: Vec<Article>,
    #[serde(default)]
    pub deleted_articles: Vec<String>,
}

impl Snapshot {
    /// "Nothing to merge": what a failed remote read degrades to.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
            && self.saved_articles.is_empty()
            && self.archived_articles.is_empty()
            && self.deleted_articles.is_empty()
    }

    /// Stamp with the current time and format version.
    pub fn stamped(mut self) -> Self {
        self.export_date = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.version = SNAPSHOT_VERSION.to_string();
        self
    }

    /// Lenient parse for remote documents: non-array collections read as empty
    /// and records that do not deserialize are skipped.
    pub fn from_remote_str(s: &str) -> Result<Self> {
        let v: Value = serde_json::from_str(s).context("parsing snapshot json")?;
        let obj = v
            .as_object()
            .ok_or_else(|| anyhow!("snapshot document is not a JSON object"))?;
        let text = |k: &str| obj.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(Self {
            export_date: text("exportDate"),
            version: text("version"),
            articles: lenient_list(obj.get("articles")),
            saved_articles: lenient_list(obj.get("savedArticles")),
            archived_articles: lenient_list(obj.get("archivedArticles")),
            deleted_articles: lenient_list(obj.get("deletedArticles")),
        })
    }

    /// Strict parse for user-supplied imports. Nothing is returned unless the
    /// whole document has the expected shape.
    pub fn parse_import(s: &str) -> Result<Self> {
        let v: Value = serde_json::from_str(s).context("import is not valid JSON")?;
        let obj = v
            .as_object()
            .ok_or_else(|| anyhow!("import must be a JSON object"))?;
        match obj.get("articles") {
            Some(Value::Array(_)) => {}
            Some(_) => bail!("import field `articles` must be an array"),
            None => bail!("import is missing the `articles` array"),
        }
        for key in ["savedArticles", "archivedArticles", "deletedArticles"] {
            if let Some(field) = obj.get(key) {
                if !field.is_array() {
                    bail!("import field `{key}` must be an array");
                }
            }
        }
        for key in ["articles", "archivedArticles"] {
            let list = obj.get(key).and_then(Value::as_array);
            for (i, rec) in list.into_iter().flatten().enumerate() {
                let has_id = rec
                    .get("id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| !id.trim().is_empty());
                if !has_id {
                    bail!("import `{key}[{i}]` has no string `id`");
                }
            }
        }
        for key in ["savedArticles", "deletedArticles"] {
            let list = obj.get(key).and_then(Value::as_array);
            if list.into_iter().flatten().any(|id| !id.is_string()) {
                bail!("import `{key}` must contain only string ids");
            }
        }
        serde_json::from_value(v).context("import does not match the snapshot schema")
    }

    /// Hash of the content, ignoring `exportDate`, used to skip redundant writes.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut body = self.clone();
        body.export_date.clear();
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

fn lenient_list<T: serde::de::DeserializeOwned>(v: Option<&Value>) -> Vec<T> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|it| serde_json::from_value(it.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_parse_tolerates_bad_shapes() {
        let s = r#"{"articles":[{"id":"a"},{"title":"no id"}],"savedArticles":"oops","deletedArticles":["x",3]}"#;
        let snap = Snapshot::from_remote_str(s).unwrap();
        assert_eq!(snap.articles.len(), 1);
        assert!(snap.saved_articles.is_empty());
        assert_eq!(snap.deleted_articles, vec!["x".to_string()]);
    }

    #[test]
    fn import_rejects_missing_articles() {
        let err = Snapshot::parse_import(r#"{"savedArticles":[]}"#).unwrap_err();
        assert!(err.to_string().contains("articles"));
    }

    #[test]
    fn import_rejects_non_array_collections() {
        let err = Snapshot::parse_import(r#"{"articles":[],"deletedArticles":{}}"#).unwrap_err();
        assert!(err.to_string().contains("deletedArticles"));
    }

    #[test]
    fn import_rejects_records_without_id() {
        let err = Snapshot::parse_import(r#"{"articles":[{"title":"x"}]}"#).unwrap_err();
        assert!(err.to_string().contains("articles[0]"));
    }

    #[test]
    fn fingerprint_ignores_export_date() {
        let a = Snapshot {
            saved_articles: vec!["p".into()],
            ..Snapshot::default()
        };
        let mut b = a.clone();
        b.export_date = "2024-01-01T00:00:00.000Z".into();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.saved_articles.push("q".into());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn serialized_field_names_match_document() {
        let v = serde_json::to_value(Snapshot::empty().stamped()).unwrap();
        for k in [
            "exportDate",
            "version",
            "articles",
            "savedArticles",
            "archivedArticles",
            "deletedArticles",
        ] {
            assert!(v.get(k).is_some(), "missing {k}");
        }
        assert_eq!(v["version"], "1.0");
    }
}
