// src/normalize/rules.rs
//! Keyword heuristics: the relevance gate, the ordered category table and the
//! keyword groups. Table order is behavior: first matching category wins and
//! keywords are emitted in table order.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_RENDERING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(midjourney|dall-e|lookx|veras|enscape|lumion|twinmotion|render|rendering|visualization|photorealistic)\b",
    )
    .unwrap()
});

static RE_AI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(ai|artificial intelligence|machine learning|generative|parametric|computational|midjourney|chatgpt|render.*ai|ai.*render|algorithms?|neural)\b",
    )
    .unwrap()
});

static RE_ARCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(architect\w*|design\w*|building\w*|construction|render\w*|visuali[sz]ation|bim|3d.*models?|structur\w*|spatial)\b",
    )
    .unwrap()
});

/// Rendering/visualization tools pass unconditionally; otherwise the feed
/// decides between AI-and-architecture or AI-or-architecture.
pub fn is_relevant(text: &str, require_both: bool) -> bool {
    if RE_RENDERING.is_match(text) {
        return true;
    }
    let ai = RE_AI.is_match(text);
    let arch = RE_ARCH.is_match(text);
    if require_both {
        ai && arch
    } else {
        ai || arch
    }
}

const CATEGORY_TABLE: &[(&str, &str)] = &[
    (
        "Chat Engines",
        r"\b(chatgpt|gpt-4|gpt-3|claude|perplexity|gemini|bard|copilot|bing chat|llama)\b",
    ),
    (
        "Rendering & Visualization",
        r"\brender\w*|visuali[sz]ation|3d.*visual|photorealistic|\bv-?ray\b|\blumion\b|\bunreal\b|\blookx\b|\bai\b.*render",
    ),
    (
        "Residential",
        r"\b(residential|houses?|homes?|apartments?|villas?|housing|single.family|multi.family)\b",
    ),
    (
        "Commercial",
        r"\b(commercial|offices?|retail|hotels?|restaurants?|hospitality|workplaces?|corporate)\b",
    ),
    (
        "Design Process",
        r"\b(design process|workflows?|collaboration|practice)\b",
    ),
    (
        "AI Tools",
        r"\b(tools?|software|apps?|platforms?|midjourney|dall-e|plugins?|extensions?)\b",
    ),
    (
        "Machine Learning",
        r"\b(machine learning|deep learning|neural networks?)\b",
    ),
    (
        "Generative Design",
        r"\b(generative|parametric|computational|algorithms?)\b",
    ),
    (
        "BIM & Digital Tools",
        r"\b(bim|revit|archicad|building information)\b",
    ),
    (
        "VR/AR/XR",
        r"\b(virtual reality|augmented reality|vr|ar|xr)\b",
    ),
    (
        "Construction Tech",
        r"\b(construction|fabrication|3d print\w*|robotic\w*)\b",
    ),
    (
        "Sustainability",
        r"\b(sustainable|sustainability|energy|climate)\b",
    ),
    (
        "Education",
        r"\b(education|teaching|learning|courses?)\b",
    ),
    (
        "Awards & Recognition",
        r"\b(awards?|prizes?|winners?|competitions?)\b",
    ),
    (
        "Trends & Analysis",
        r"\b(trends?|future|predictions?|forecasts?)\b",
    ),
    (
        "Case Studies",
        r"\b(projects?|case study|firms?)\b",
    ),
];

static CATEGORY_RULES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    CATEGORY_TABLE
        .iter()
        .map(|(label, pat)| (*label, Regex::new(&format!("(?i){pat}")).unwrap()))
        .collect()
});

/// Category labels in evaluation order.
pub fn category_labels() -> Vec<&'static str> {
    CATEGORY_TABLE.iter().map(|(label, _)| *label).collect()
}

/// Label of the first matching rule over `title + " " + description`, else `fallback`.
pub fn categorize(title: &str, description: &str, fallback: &str) -> String {
    let text = format!("{title} {description}");
    CATEGORY_RULES
        .iter()
        .find(|(_, re)| re.is_match(&text))
        .map(|(label, _)| label.to_string())
        .unwrap_or_else(|| fallback.to_string())
}

pub const MAX_KEYWORDS: usize = 4;

const KEYWORD_TABLE: &[(&str, &[&str])] = &[
    ("midjourney", &["midjourney"]),
    ("stable diffusion", &["stable diffusion"]),
    ("enscape", &["enscape"]),
    ("lumion", &["lumion"]),
    ("ai rendering", &[r"\bai\b.*render", r"render.*\bai\b", "lookx", "veras"]),
    ("chatgpt", &["chatgpt", "gpt"]),
    ("generative design", &["generative", "parametric"]),
    ("visualization", &["visuali[sz]ation", "photorealistic"]),
    ("bim", &[r"\bbim\b", "revit"]),
    ("machine learning", &["machine learning", r"\bml\b", "neural"]),
    ("computational", &["algorithm", "computational"]),
    (
        "vr/ar",
        &["virtual reality", "augmented reality", r"\bvr\b", r"\bar\b"],
    ),
    ("sustainability", &["sustainab", "energy", "climate"]),
];

static KEYWORD_RULES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    KEYWORD_TABLE
        .iter()
        .map(|(label, pats)| {
            let alt = pats.join("|");
            (*label, Regex::new(&format!("(?i){alt}")).unwrap())
        })
        .collect()
});

/// Keyword labels whose sub-patterns match, in table order, at most four.
pub fn extract_keywords(text: &str) -> Vec<String> {
    KEYWORD_RULES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(label, _)| label.to_string())
        .take(MAX_KEYWORDS)
        .collect()
}
