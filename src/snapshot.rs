//! Ingestion output documents.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::article::Article;
use crate::config::{Config, KeywordTables};
use crate::scorer::ScoredItem;

pub const PRIMARY_FILE: &str = "rss-data.json";
pub const COMPACT_FILE: &str = "rss-data-simple.json";

const RESEARCH_MARKER: &str = "研究";
const INDUSTRY_MARKER: &str = "行业";
const ACADEMIC_MARKER: &str = "学术";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub articles: Vec<Article>,
    pub metadata: SnapshotMetadata,
    pub summary: SnapshotSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Deduplicated article count before truncation
    pub total_count: usize,
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<SourceInfo>,
    pub keywords: KeywordTables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    pub category: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub research_articles: usize,
    pub industry_articles: usize,
    pub academic_articles: usize,
    pub average_score: f64,
}

impl SnapshotSummary {
    pub fn from_items(items: &[ScoredItem]) -> Self {
        let count = |marker: &str| items.iter().filter(|i| i.category.contains(marker)).count();

        let average_score = if items.is_empty() {
            0.0
        } else {
            items.iter().map(|i| i.score).sum::<f64>() / items.len() as f64
        };

        Self {
            research_articles: count(RESEARCH_MARKER),
            industry_articles: count(INDUSTRY_MARKER),
            academic_articles: count(ACADEMIC_MARKER),
            average_score,
        }
    }
}

/// Reduced form of the snapshot, read when the primary one is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactSnapshot {
    pub articles: Vec<CompactArticle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactArticle {
    pub title: String,
    pub title_zh: String,
    pub description: String,
    pub link: String,
    pub source: String,
    pub category: String,
    /// `YYYY-MM-DD`
    pub date: String,
}

impl Snapshot {
    /// `unique` is the full deduplicated set the statistics are computed
    /// over; `articles` is its truncated, enriched head.
    pub fn build(
        articles: Vec<Article>,
        unique: &[ScoredItem],
        config: &Config,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            articles,
            metadata: SnapshotMetadata {
                total_count: unique.len(),
                generated_at,
                sources: config
                    .enabled_sources()
                    .map(|s| SourceInfo {
                        name: s.name.clone(),
                        category: s.category.clone(),
                        weight: s.weight,
                    })
                    .collect(),
                keywords: config.keywords.clone(),
            },
            summary: SnapshotSummary::from_items(unique),
        }
    }

    pub fn compact(&self) -> CompactSnapshot {
        CompactSnapshot {
            articles: self
                .articles
                .iter()
                .map(|a| CompactArticle {
                    title: a.title.clone(),
                    title_zh: a.title_localized.clone(),
                    description: a.summary.clone(),
                    link: a.url.clone(),
                    source: a.source.clone(),
                    category: a.category.clone(),
                    date: a.publish_time.format("%Y-%m-%d").to_string(),
                })
                .collect(),
        }
    }

    /// Write both documents into `dir`, creating it if needed. Returns the
    /// paths written.
    pub fn write_to(&self, dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;

        let primary = dir.join(PRIMARY_FILE);
        std::fs::write(&primary, serde_json::to_string_pretty(self)?)?;

        let compact = dir.join(COMPACT_FILE);
        std::fs::write(&compact, serde_json::to_string_pretty(&self.compact())?)?;

        Ok((primary, compact))
    }
}
