//! The article schema shared by the ingestion snapshot and the client side.
//!
//! Upstream JSON is untrusted and loosely shaped, so every article passes
//! through [`Article::from_raw`] exactly once; downstream code only ever sees
//! fully populated values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::parser::{parse_date, truncate_chars};
use crate::scorer::ScoredItem;

pub const DEFAULT_TITLE: &str = "无标题";
pub const DEFAULT_LINK: &str = "#";
pub const DEFAULT_SOURCE: &str = "AI资讯聚合";
pub const DEFAULT_CATEGORY: &str = "AI动态";
pub const DEFAULT_AUTHOR: &str = "AI资讯编辑";
pub const DEFAULT_AI_SCORE: f64 = 5.0;

const SUMMARY_CHARS: usize = 180;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub title_localized: String,
    pub summary: String,
    pub summary_localized: String,
    /// Untruncated description the derived fields are computed from
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub source: String,
    pub category: String,
    pub publish_time: DateTime<Utc>,
    pub ai_score: f64,
    pub author: String,
    #[serde(default)]
    pub matched_tools: Vec<MatchedTool>,
    #[serde(default)]
    pub topic: Topic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedTool {
    pub tool_name: String,
    pub tool_category: String,
    /// First catalog keyword found in the article text
    pub reason: String,
    pub score: u32,
}

/// Topical category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "技术前沿")]
    Technical,
    #[serde(rename = "应用热点")]
    Application,
    #[serde(rename = "行业新闻")]
    Industry,
    #[default]
    #[serde(rename = "AI动态")]
    General,
}

impl Topic {
    pub fn label(self) -> &'static str {
        match self {
            Topic::Technical => "技术前沿",
            Topic::Application => "应用热点",
            Topic::Industry => "行业新闻",
            Topic::General => "AI动态",
        }
    }

    /// Accepts the short filter names used by clients as well as the labels.
    pub fn parse(s: &str) -> Option<Topic> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tech" | "technical" => Some(Topic::Technical),
            "application" | "app" => Some(Topic::Application),
            "industry" => Some(Topic::Industry),
            "general" => Some(Topic::General),
            _ => [
                Topic::Technical,
                Topic::Application,
                Topic::Industry,
                Topic::General,
            ]
            .into_iter()
            .find(|t| t.label() == s.trim()),
        }
    }
}

/// An article as it arrives from a snapshot, the fallback list, or the
/// ingestion pipeline. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    pub title: Option<String>,
    #[serde(alias = "title_zh")]
    pub title_localized: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "url")]
    pub link: Option<String>,
    pub source: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "pubDate", alias = "date")]
    pub publish_time: Option<String>,
    pub ai_score: Option<f64>,
    pub author: Option<String>,
}

impl From<ScoredItem> for RawArticle {
    fn from(item: ScoredItem) -> Self {
        RawArticle {
            title: Some(item.title),
            description: Some(item.description),
            link: Some(item.link),
            source: Some(item.source),
            category: Some(item.category),
            publish_time: Some(item.published.to_rfc3339()),
            ai_score: Some(item.score),
            ..Default::default()
        }
    }
}

impl Article {
    /// Normalize a raw article, filling every missing field with its default.
    pub fn from_raw(raw: RawArticle, now: DateTime<Utc>) -> Article {
        let title = non_empty(raw.title).unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let raw_summary = non_empty(raw.summary);
        let description = non_empty(raw.description)
            .or_else(|| raw_summary.clone())
            .unwrap_or_else(|| title.clone());
        let summary = truncate_chars(raw_summary.as_deref().unwrap_or(&description), SUMMARY_CHARS);
        let url = non_empty(raw.link).unwrap_or_else(|| DEFAULT_LINK.to_string());
        let publish_time = raw
            .publish_time
            .as_deref()
            .map(|d| parse_date(d, now))
            .unwrap_or(now);

        Article {
            id: article_id(&title, &url),
            title_localized: non_empty(raw.title_localized).unwrap_or_else(|| title.clone()),
            summary,
            summary_localized: String::new(),
            description,
            url,
            source: non_empty(raw.source).unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            category: non_empty(raw.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            publish_time,
            ai_score: clamp_score(raw.ai_score.unwrap_or(DEFAULT_AI_SCORE)),
            author: non_empty(raw.author).unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            matched_tools: Vec::new(),
            topic: Topic::General,
            title,
        }
    }

    /// Normalize a list of loosely typed JSON articles. Entries that are not
    /// objects or carry wrongly typed fields are skipped.
    pub fn from_values(values: &[Value], now: DateTime<Utc>) -> Vec<Article> {
        values
            .iter()
            .filter_map(|value| match RawArticle::deserialize(value) {
                Ok(raw) => Some(Article::from_raw(raw, now)),
                Err(e) => {
                    warn!("Skipping malformed article: {}", e);
                    None
                }
            })
            .collect()
    }
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(1.0, 10.0)
    } else {
        DEFAULT_AI_SCORE
    }
}

fn article_id(title: &str, link: &str) -> String {
    let digest = Sha256::digest(format!("{}{}", title, link).as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
