use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::article::Article;
use crate::config::{Config, SourceConfig};
use crate::db::Database;
use crate::enricher::Enricher;
use crate::fetcher::{Fetcher, SourceOutcome};
use crate::loader::NewsService;
use crate::ranker;
use crate::scorer::Scorer;
use crate::snapshot::Snapshot;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No articles retrieved from any source")]
    NoArticles,
}

/// One ingestion pass: fetch, score, rank, enrich.
pub struct Pipeline {
    config: Arc<Config>,
    fetcher: Fetcher,
    scorer: Scorer,
    enricher: Arc<Enricher>,
    db: Option<Arc<Database>>,
    refreshing: RwLock<bool>,
    last_generated: RwLock<Option<DateTime<Utc>>>,
}

impl Pipeline {
    pub fn new(config: Arc<Config>, enricher: Arc<Enricher>) -> anyhow::Result<Self> {
        let fetcher = Fetcher::new(&config.fetch)?;
        let scorer = Scorer::from_config(&config);

        Ok(Self {
            config,
            fetcher,
            scorer,
            enricher,
            db: None,
            refreshing: RwLock::new(false),
            last_generated: RwLock::new(None),
        })
    }

    /// Record per-source fetch status in the database.
    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    pub async fn is_refreshing(&self) -> bool {
        *self.refreshing.read().await
    }

    pub async fn last_generated(&self) -> Option<DateTime<Utc>> {
        *self.last_generated.read().await
    }

    pub async fn run(&self) -> Result<Snapshot, PipelineError> {
        let started = Instant::now();
        let sources: Vec<&SourceConfig> = self.config.enabled_sources().collect();
        info!("Starting ingestion over {} sources", sources.len());

        let harvest = self
            .fetcher
            .harvest(
                sources,
                &self.scorer,
                self.config.scoring.max_items_per_source,
            )
            .await;
        self.record_outcomes(&harvest.outcomes).await;

        info!(
            succeeded = harvest.succeeded,
            failed = harvest.failed,
            "Fetch complete: {} relevant items in {}ms",
            harvest.items.len(),
            started.elapsed().as_millis()
        );

        if harvest.items.is_empty() {
            error!("No articles retrieved, check network connectivity and sources");
            return Err(PipelineError::NoArticles);
        }

        let unique = ranker::sort_unique(harvest.items);
        let now = Utc::now();

        let articles: Vec<Article> = unique
            .iter()
            .take(self.config.scoring.max_articles)
            .cloned()
            .map(|item| Article::from_raw(item.into(), now))
            .collect();
        let articles = self.enricher.enrich_all(articles).await;

        let snapshot = Snapshot::build(articles, &unique, &self.config, now);
        let summary = &snapshot.summary;
        info!(
            "Kept {} of {} unique articles. Research: {}, industry: {}, academic: {}, average score: {:.1}",
            snapshot.articles.len(),
            snapshot.metadata.total_count,
            summary.research_articles,
            summary.industry_articles,
            summary.academic_articles,
            summary.average_score
        );

        *self.last_generated.write().await = Some(now);
        Ok(snapshot)
    }

    /// Run and write both snapshot documents into the data directory.
    pub async fn run_and_write(&self) -> anyhow::Result<Snapshot> {
        let snapshot = self.run().await?;
        let (primary, compact) = snapshot.write_to(&self.config.data_dir)?;
        info!(
            "Snapshots written to {} and {}",
            primary.display(),
            compact.display()
        );
        Ok(snapshot)
    }

    /// [`Pipeline::run_and_write`] unless a refresh is already in progress,
    /// in which case `None` is returned straight away.
    pub async fn refresh(&self) -> anyhow::Result<Option<Snapshot>> {
        {
            let mut refreshing = self.refreshing.write().await;
            if *refreshing {
                info!("Refresh already in progress, skipping");
                return Ok(None);
            }
            *refreshing = true;
        }

        let result = self.run_and_write().await;

        {
            let mut refreshing = self.refreshing.write().await;
            *refreshing = false;
        }

        result.map(Some)
    }

    async fn record_outcomes(&self, outcomes: &[SourceOutcome]) {
        let Some(db) = &self.db else {
            return;
        };

        for outcome in outcomes {
            let result = match &outcome.result {
                Ok(count) => db.update_source_fetched(&outcome.url, None, *count).await,
                Err(e) => {
                    db.update_source_fetched(&outcome.url, Some(&e.to_string()), 0)
                        .await
                }
            };
            if let Err(e) = result {
                warn!("Could not record status for '{}': {}", outcome.name, e);
            }
        }
    }
}

/// Refresh now and then every `interval_minutes`, reloading the news
/// service after each successful run.
pub async fn start_background_refresh(
    pipeline: Arc<Pipeline>,
    news: Arc<NewsService>,
    interval_minutes: u64,
) {
    let interval = Duration::from_secs(interval_minutes * 60);

    info!("Starting initial ingestion");
    refresh_and_reload(&pipeline, &news).await;

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled ingestion");
        refresh_and_reload(&pipeline, &news).await;
    }
}

pub async fn refresh_and_reload(pipeline: &Pipeline, news: &NewsService) {
    match pipeline.refresh().await {
        Ok(Some(_)) => {
            news.update().await;
        }
        Ok(None) => {}
        Err(e) => error!("Ingestion failed: {}", e),
    }
}
