// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::FeedConfig;

pub const ENV_PATH: &str = "ARCHFEED_FEEDS_PATH";

fn feed(
    url: &str,
    category: &str,
    source: &str,
    logo: &str,
    priority: i32,
    require_both: bool,
) -> FeedConfig {
    FeedConfig {
        url: url.to_string(),
        category: category.to_string(),
        source: source.to_string(),
        logo: logo.to_string(),
        priority,
        require_both,
        enabled: true,
    }
}

/// Built-in feed list, used when no file overrides it.
pub fn default_feeds() -> Vec<FeedConfig> {
    vec![
        feed("https://www.archdaily.com/feed", "Architecture News", "ArchDaily", "🏛️", 1, true),
        feed("https://www.dezeen.com/feed/", "Design Innovation", "Dezeen", "📐", 1, true),
        feed(
            "https://www.architectmagazine.com/rss",
            "Practice & Technology",
            "Architect Magazine",
            "📰",
            1,
            true,
        ),
        feed(
            "https://architizer.com/blog/feed/",
            "Architecture Blog",
            "Architizer",
            "🏗️",
            1,
            true,
        ),
        feed(
            "https://www.constructiondive.com/feeds/news/",
            "Construction Tech",
            "Construction Dive",
            "👷",
            2,
            true,
        ),
        feed(
            "https://www.architecturaldigest.com/feed/rss",
            "Design & Architecture",
            "Architectural Digest",
            "🏠",
            1,
            false,
        ),
        feed(
            "https://techcrunch.com/category/artificial-intelligence/feed/",
            "AI Technology",
            "TechCrunch AI",
            "🤖",
            1,
            true,
        ),
        feed(
            "https://www.technologyreview.com/topic/artificial-intelligence/feed",
            "AI Research",
            "MIT Technology Review",
            "🔬",
            1,
            true,
        ),
        feed(
            "https://venturebeat.com/category/ai/feed/",
            "AI Industry",
            "VentureBeat AI",
            "💼",
            2,
            true,
        ),
        feed(
            "https://www.grasshopper3d.com/forum/feed/feed:topics:new",
            "Parametric Design",
            "Grasshopper3D Forum",
            "🦗",
            1,
            false,
        ),
        feed("https://arxiv.org/rss/cs.CV", "Computer Vision Research", "arXiv CV", "🎓", 2, true),
        feed("https://arxiv.org/rss/cs.GR", "Graphics Research", "arXiv Graphics", "🖼️", 2, true),
    ]
}

/// Load a feed list from an explicit path. Supports TOML (`[[feeds]]`) or a JSON array.
pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feeds(&content, ext.as_str())
}

/// Load the feed list using env var + fallbacks:
/// 1) $ARCHFEED_FEEDS_PATH
/// 2) config/feeds.toml
/// 3) config/feeds.json
/// 4) built-in defaults
pub fn load_feeds_default() -> Result<Vec<FeedConfig>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_feeds_from(&pb);
        } else {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/feeds.toml");
    if toml_p.exists() {
        return load_feeds_from(&toml_p);
    }
    let json_p = PathBuf::from("config/feeds.json");
    if json_p.exists() {
        return load_feeds_from(&json_p);
    }
    Ok(default_feeds())
}

pub fn parse_feeds(s: &str, hint_ext: &str) -> Result<Vec<FeedConfig>> {
    let try_toml = hint_ext == "toml" || s.contains("[[feeds]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported feed list format"))
}

fn parse_toml(s: &str) -> Result<Vec<FeedConfig>> {
    #[derive(serde::Deserialize)]
    struct TomlFeeds {
        feeds: Vec<FeedConfig>,
    }
    let v: TomlFeeds = toml::from_str(s)?;
    clean_list(v.feeds)
}

fn parse_json(s: &str) -> Result<Vec<FeedConfig>> {
    let v: Vec<FeedConfig> = serde_json::from_str(s)?;
    clean_list(v)
}

/// Trim fields, drop entries without url/source, keep the first entry per source.
fn clean_list(items: Vec<FeedConfig>) -> Result<Vec<FeedConfig>> {
    let mut out: Vec<FeedConfig> = Vec::with_capacity(items.len());
    for mut it in items {
        it.url = it.url.trim().to_string();
        it.source = it.source.trim().to_string();
        if it.url.is_empty() || it.source.is_empty() {
            continue;
        }
        if out.iter().any(|f| f.source.eq_ignore_ascii_case(&it.source)) {
            continue;
        }
        out.push(it);
    }
    Ok(out)
}
