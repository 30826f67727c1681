//! Cache-first loading of the JSON documents the service presents.
//!
//! Every loader asks the cache first and only goes to the origin on a miss.
//! Origin failures are logged and reported as `None`, so callers always
//! have a degraded path (the compact snapshot, configured fallbacks, or an
//! empty list).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::article::{Article, RawArticle};
use crate::cache::{
    CacheManager, LEARNING_CACHE, NEWS_BACKUP_CACHE, NEWS_CACHE, PRODUCTS_CACHE, TOOLS_CACHE,
    TOPICS_CACHE,
};
use crate::config::ToolDefinition;
use crate::enricher::Enricher;
use crate::snapshot::{COMPACT_FILE, PRIMARY_FILE};

pub const TOOLS_FILE: &str = "tools.json";
pub const PRODUCTS_FILE: &str = "products.json";
pub const LEARNING_FILE: &str = "learning-resources.json";
pub const TOPICS_FILE: &str = "topics.json";

/// Where named JSON documents come from.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch_json(&self, name: &str) -> anyhow::Result<Value>;
}

/// Documents stored as files under a directory.
pub struct FileOrigin {
    root: PathBuf,
}

impl FileOrigin {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Origin for FileOrigin {
    async fn fetch_json(&self, name: &str) -> anyhow::Result<Value> {
        let path = self.root.join(name);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(value)
    }
}

/// Documents served over HTTP below a base URL.
pub struct HttpOrigin {
    client: Client,
    base_url: String,
}

impl HttpOrigin {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch_json(&self, name: &str) -> anyhow::Result<Value> {
        let url = format!("{}/{}", self.base_url, name);
        let value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }
}

pub struct DataLoader {
    origin: Arc<dyn Origin>,
    cache: CacheManager,
}

impl DataLoader {
    pub fn new(origin: Arc<dyn Origin>, cache: CacheManager) -> Self {
        Self { origin, cache }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Cached document under `key`, fetched from `location` on a miss.
    pub async fn load_with_cache(&self, location: &str, key: &str) -> Option<Value> {
        if let Some(value) = self.cache.get::<Value>(key).await {
            return Some(value);
        }

        match self.origin.fetch_json(location).await {
            Ok(value) => {
                self.cache.set(key, &value).await;
                Some(value)
            }
            Err(e) => {
                warn!("Could not load {}: {:#}", location, e);
                None
            }
        }
    }
}

/// Take the array under `field`, if any.
fn list_field(document: Option<Value>, field: &str) -> Option<Vec<Value>> {
    let mut document = document?;
    match document.get_mut(field)?.take() {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// Loaders for the auxiliary catalogs.
pub struct ContentManager {
    loader: Arc<DataLoader>,
    default_tools: Vec<ToolDefinition>,
}

impl ContentManager {
    pub fn new(loader: Arc<DataLoader>, default_tools: Vec<ToolDefinition>) -> Self {
        Self {
            loader,
            default_tools,
        }
    }

    /// The tool catalog document, or the configured catalog when it cannot
    /// be loaded.
    pub async fn load_tools(&self) -> Vec<ToolDefinition> {
        let items = list_field(
            self.loader.load_with_cache(TOOLS_FILE, TOOLS_CACHE).await,
            "tools",
        );

        match items.map(|items| serde_json::from_value::<Vec<ToolDefinition>>(Value::Array(items))) {
            Some(Ok(tools)) if !tools.is_empty() => tools,
            Some(Err(e)) => {
                warn!("Malformed tool catalog, using configured tools: {}", e);
                self.default_tools.clone()
            }
            _ => self.default_tools.clone(),
        }
    }

    pub async fn load_products(&self) -> Vec<Value> {
        self.load_list(PRODUCTS_FILE, PRODUCTS_CACHE, "products").await
    }

    pub async fn load_learning_resources(&self) -> Vec<Value> {
        self.load_list(LEARNING_FILE, LEARNING_CACHE, "resources").await
    }

    pub async fn load_topics(&self) -> Vec<Value> {
        self.load_list(TOPICS_FILE, TOPICS_CACHE, "topics").await
    }

    /// A catalog by its public name. `None` for names that are not catalogs.
    pub async fn catalog(&self, name: &str) -> Option<Vec<Value>> {
        let items = match name {
            "tools" => self
                .load_tools()
                .await
                .into_iter()
                .filter_map(|tool| serde_json::to_value(tool).ok())
                .collect(),
            "products" => self.load_products().await,
            "learning" | "learning-resources" => self.load_learning_resources().await,
            "topics" => self.load_topics().await,
            _ => return None,
        };
        Some(items)
    }

    async fn load_list(&self, location: &str, key: &str, field: &str) -> Vec<Value> {
        list_field(self.loader.load_with_cache(location, key).await, field).unwrap_or_default()
    }
}

/// Normalized, enriched articles for presentation.
pub struct NewsService {
    loader: Arc<DataLoader>,
    enricher: Arc<Enricher>,
    fallback: Vec<RawArticle>,
    articles: RwLock<Vec<Article>>,
}

impl NewsService {
    pub fn new(loader: Arc<DataLoader>, enricher: Arc<Enricher>, fallback: Vec<RawArticle>) -> Self {
        Self {
            loader,
            enricher,
            fallback,
            articles: RwLock::new(Vec::new()),
        }
    }

    /// Load from the primary snapshot, then the compact one, then the
    /// configured fallback list.
    pub async fn load(&self) -> Vec<Article> {
        let now = Utc::now();

        let articles = if let Some(values) = self.snapshot_articles(PRIMARY_FILE, NEWS_CACHE).await {
            info!("Loaded {} articles from the primary snapshot", values.len());
            Article::from_values(&values, now)
        } else if let Some(values) = self.snapshot_articles(COMPACT_FILE, NEWS_BACKUP_CACHE).await {
            info!("Loaded {} articles from the compact snapshot", values.len());
            Article::from_values(&values, now)
        } else {
            warn!("No snapshot available, using {} fallback articles", self.fallback.len());
            self.fallback
                .iter()
                .cloned()
                .map(|raw| Article::from_raw(raw, now))
                .collect()
        };

        let articles = self.enricher.enrich_all(articles).await;
        *self.articles.write().await = articles.clone();
        articles
    }

    /// The loaded articles, loading them first if nothing is held yet.
    pub async fn articles(&self) -> Vec<Article> {
        {
            let held = self.articles.read().await;
            if !held.is_empty() {
                return held.clone();
            }
        }
        self.load().await
    }

    /// Manual update: drop both cached snapshots and reload.
    pub async fn update(&self) -> Vec<Article> {
        let cache = self.loader.cache();
        cache.invalidate(NEWS_CACHE).await;
        cache.invalidate(NEWS_BACKUP_CACHE).await;
        info!("News cache cleared, reloading");
        self.load().await
    }

    async fn snapshot_articles(&self, location: &str, key: &str) -> Option<Vec<Value>> {
        list_field(self.loader.load_with_cache(location, key).await, "articles")
            .filter(|values| !values.is_empty())
    }
}
