// src/remote/gist.rs
//! GitHub Gist as the remote snapshot store. The document lives in one named
//! file of the gist.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Credentials, SnapshotStore};
use crate::snapshot::Snapshot;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_FILE_NAME: &str = "ai-architecture-articles.json";
const DESCRIPTION: &str = "AI Architecture Articles Backup";

#[derive(Debug, Deserialize)]
struct GistResponse {
    id: String,
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    raw_url: Option<String>,
}

pub struct GistStore {
    client: reqwest::Client,
    api_base: String,
    file_name: String,
}

impl GistStore {
    pub fn new(file_name: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::ingest::providers::USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building gist http client")?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            file_name: file_name.into(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_base, path))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn file_content(
        &self,
        file: GistFile,
        credentials: Option<&Credentials>,
    ) -> Result<String> {
        if !file.truncated {
            return Ok(file.content.unwrap_or_default());
        }
        // Large files come back truncated; the full text sits behind raw_url.
        let raw_url = file
            .raw_url
            .ok_or_else(|| anyhow!("truncated gist file without raw_url"))?;
        let mut req = self.client.get(raw_url);
        if let Some(c) = credentials {
            req = req.bearer_auth(&c.token);
        }
        req.send()
            .await
            .context("gist raw get()")?
            .error_for_status()
            .context("gist raw status")?
            .text()
            .await
            .context("gist raw .text()")
    }
}

#[async_trait]
impl SnapshotStore for GistStore {
    async fn fetch(&self, id: &str, credentials: Option<&Credentials>) -> Result<Snapshot> {
        let mut req = self.request(reqwest::Method::GET, &format!("/gists/{id}"));
        if let Some(c) = credentials {
            req = req.bearer_auth(&c.token);
        }
        let mut meta: GistResponse = req
            .send()
            .await
            .context("gist get()")?
            .error_for_status()
            .context("gist fetch status")?
            .json()
            .await
            .context("gist metadata json")?;

        let Some(file) = meta.files.remove(&self.file_name) else {
            tracing::info!(
                target: "remote",
                gist = id,
                file = %self.file_name,
                "gist has no snapshot file yet"
            );
            return Ok(Snapshot::empty());
        };
        let content = self.file_content(file, credentials).await?;
        if content.trim().is_empty() {
            return Ok(Snapshot::empty());
        }
        Snapshot::from_remote_str(&content)
    }

    async fn write(
        &self,
        id: Option<&str>,
        snapshot: &Snapshot,
        credentials: &Credentials,
    ) -> Result<String> {
        let content = serde_json::to_string_pretty(snapshot).context("serializing snapshot")?;
        let mut files = serde_json::Map::new();
        files.insert(self.file_name.clone(), json!({ "content": content }));
        let mut body = json!({
            "description": DESCRIPTION,
            "files": files,
        });
        let req = match id {
            Some(id) => self.request(reqwest::Method::PATCH, &format!("/gists/{id}")),
            None => {
                body["public"] = json!(true);
                self.request(reqwest::Method::POST, "/gists")
            }
        };
        let resp: GistResponse = req
            .bearer_auth(&credentials.token)
            .json(&body)
            .send()
            .await
            .context("gist write send()")?
            .error_for_status()
            .context("gist write status")?
            .json()
            .await
            .context("gist write response json")?;
        Ok(resp.id)
    }

    fn name(&self) -> &'static str {
        "gist"
    }
}
