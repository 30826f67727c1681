use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::ensure;
use serde::{Deserialize, Serialize};

use crate::article::RawArticle;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory the ingestion snapshots are written to and served from
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub sources: Vec<SourceConfig>,
    pub keywords: KeywordTables,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub translation: TranslationConfig,
    /// Articles shown when neither snapshot can be loaded
    #[serde(default)]
    pub fallback_articles: Vec<RawArticle>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    pub category: String,
    pub weight: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Keyword weight tables used by the relevance scorer.
///
/// Terms are matched case-insensitively on whole words, so the casing used
/// in the file does not matter.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct KeywordTables {
    #[serde(default)]
    pub tier1: BTreeMap<String, f64>,
    #[serde(default)]
    pub tier2: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    /// Minimum relevance score for an item to be kept
    pub threshold: f64,
    pub max_items_per_source: usize,
    pub max_articles: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            max_items_per_source: 8,
            max_articles: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Background ingestion interval in minutes
    pub refresh_interval: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            refresh_interval: 30,
            user_agent: "AiDigest/1.0 (Feed Aggregator)".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_minutes: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_minutes: 30 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TranslationConfig {
    /// Remote translation endpoint. Without it (or without a credential)
    /// the built-in dictionary is used.
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the credential
    pub api_key_env: String,
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: "TRANSLATION_API_KEY".to_string(),
            source_lang: "en".to_string(),
            target_lang: "zh".to_string(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for source in &self.sources {
            ensure!(!source.name.trim().is_empty(), "source with empty name");
            ensure!(
                !source.url.trim().is_empty(),
                "source '{}' has an empty url",
                source.name
            );
            ensure!(
                (0.0..=1.0).contains(&source.weight),
                "source '{}' weight {} is outside [0, 1]",
                source.name,
                source.weight
            );
        }

        for (term, weight) in self.keywords.tier1.iter().chain(&self.keywords.tier2) {
            ensure!(*weight >= 0.0, "keyword '{}' has negative weight", term);
        }

        ensure!(
            self.scoring.max_articles > 0,
            "scoring.max_articles must be positive"
        );
        ensure!(
            self.cache.ttl_minutes > 0,
            "cache.ttl_minutes must be positive"
        );

        Ok(())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}
