//! Integration tests for the ai-digest feed aggregator
//!
//! These tests exercise the full workflow from configuration loading
//! through ingestion, snapshot writing, caching and presentation.

mod common {
    use tempfile::TempDir;

    /// Create a temporary directory for test databases and snapshots
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("test.db");
        format!("sqlite:{}?mode=rwc", db_path.display())
    }

    pub const ARXIV_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>cs.AI updates</title>
    <item>
      <title>Scaling laws for neural networks in machine learning</title>
      <link>https://arxiv.org/abs/2510.00001</link>
      <description><![CDATA[<p>We study deep learning &amp; AI model scaling.</p>]]></description>
      <dc:date>2025-10-28T09:00:00Z</dc:date>
    </item>
    <item>
      <title>A survey of compilers</title>
      <link>https://arxiv.org/abs/2510.00002</link>
      <description>Nothing about the topic</description>
    </item>
    <item>
      <title>Robotics without AI</title>
      <description>Missing link, dropped</description>
    </item>
  </channel>
</rss>"#;

    pub const VENTUREBEAT_FEED: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>VentureBeat AI</title>
  <entry>
    <title>ChatGPT maker raises funding for enterprise AI</title>
    <link rel="alternate" href="https://venturebeat.com/ai/chatgpt-funding"/>
    <summary>OpenAI startup market investment in AI</summary>
    <published>2025-10-28T12:00:00Z</published>
  </entry>
  <entry>
    <title>scaling laws for neural networks in   machine learning</title>
    <link href="https://venturebeat.com/ai/dup"/>
    <summary>AI</summary>
  </entry>
</feed>"#;
}

#[cfg(test)]
mod config_integration_tests {
    use ai_digest::config::Config;

    #[test]
    fn test_load_actual_feeds_config() {
        // Test loading the actual feeds.toml from the project
        let config = Config::load("feeds.toml");
        assert!(config.is_ok(), "Failed to load feeds.toml: {:?}", config.err());

        let config = config.unwrap();
        assert_eq!(config.sources.len(), 4);
        assert_eq!(config.enabled_sources().count(), 4);
        assert_eq!(config.keywords.tier1.get("artificial intelligence"), Some(&5.0));
        assert_eq!(config.keywords.tier1.get("robotics"), Some(&2.5));
        assert_eq!(config.keywords.tier2.get("dall-e"), Some(&2.0));
        assert_eq!(config.scoring.threshold, 3.0);
        assert!(config.fetch.refresh_interval > 0, "refresh_interval should be positive");
        assert!(!config.tools.is_empty(), "feeds.toml should ship a tool catalog");
        assert!(!config.fallback_articles.is_empty());
    }
}

#[cfg(test)]
mod cache_integration_tests {
    use super::common::*;
    use ai_digest::cache::{CacheManager, CacheStore, NEWS_CACHE};
    use ai_digest::db::Database;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cache_persists_across_connections() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);
        let t0 = Utc.with_ymd_and_hms(2025, 10, 29, 9, 0, 0).unwrap();

        {
            let db = Database::new(&db_url).await.unwrap();
            db.initialize().await.unwrap();
            let cache = CacheManager::new(Arc::new(db), Duration::minutes(30));
            cache
                .set_at(NEWS_CACHE, &json!({"articles": [{"title": "kept"}]}), t0)
                .await;
        }

        // Reopen database and verify data persists
        let db = Arc::new(Database::new(&db_url).await.unwrap());
        let cache = CacheManager::new(db.clone(), Duration::minutes(30));

        let value: Option<serde_json::Value> =
            cache.get_at(NEWS_CACHE, t0 + Duration::minutes(10)).await;
        assert_eq!(value.unwrap()["articles"][0]["title"], "kept");

        // Expired on read, then gone from the table
        let value: Option<serde_json::Value> =
            cache.get_at(NEWS_CACHE, t0 + Duration::minutes(31)).await;
        assert!(value.is_none());
        assert!(db.load(NEWS_CACHE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_row_is_evicted() {
        let temp_dir = create_temp_dir();
        let db = Database::new(&create_db_path(&temp_dir)).await.unwrap();
        db.initialize().await.unwrap();
        db.save("tools_cache", "{\"value\": [1, 2").await.unwrap();
        let db = Arc::new(db);

        let cache = CacheManager::new(db.clone(), Duration::minutes(30));
        assert!(cache.get::<serde_json::Value>("tools_cache").await.is_none());
        assert!(db.load("tools_cache").await.unwrap().is_none());
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::common::*;
    use ai_digest::article::Topic;
    use ai_digest::cache::{CacheManager, MemoryStore};
    use ai_digest::config::Config;
    use ai_digest::db::Database;
    use ai_digest::enricher::Enricher;
    use ai_digest::loader::{DataLoader, FileOrigin, NewsService};
    use ai_digest::pipeline::{Pipeline, PipelineError};
    use ai_digest::snapshot::{CompactSnapshot, COMPACT_FILE, PRIMARY_FILE};
    use ai_digest::translate::DictionaryTranslator;
    use std::path::Path;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, data_dir: &Path) -> Arc<Config> {
        let mut config = Config::load("feeds.toml").unwrap();
        config.data_dir = data_dir.to_path_buf();
        config.sources[0].url = format!("{}/arxiv", server.uri());
        config.sources[1].url = format!("{}/mit", server.uri());
        config.sources[2].url = format!("{}/trends", server.uri());
        config.sources[3].url = format!("{}/venturebeat", server.uri());
        Arc::new(config)
    }

    async fn mount_sources(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/arxiv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ARXIV_FEED))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mit"))
            .respond_with(ResponseTemplate::new(503))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/trends"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a feed</html>"))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/venturebeat"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VENTUREBEAT_FEED))
            .mount(server)
            .await;
    }

    fn enricher(config: &Config) -> Arc<Enricher> {
        Arc::new(Enricher::new(
            config.tools.clone(),
            Arc::new(DictionaryTranslator::new()),
        ))
    }

    #[tokio::test]
    async fn test_ingest_write_and_serve() {
        let server = MockServer::start().await;
        mount_sources(&server).await;
        let temp_dir = create_temp_dir();
        let data_dir = temp_dir.path().join("data");
        let config = config_for(&server, &data_dir);

        let db = Database::new(&create_db_path(&temp_dir)).await.unwrap();
        db.initialize().await.unwrap();
        db.sync_sources(&config.sources).await.unwrap();
        let db = Arc::new(db);

        let pipeline = Pipeline::new(config.clone(), enricher(&config))
            .unwrap()
            .with_database(db.clone());
        let snapshot = pipeline.run_and_write().await.unwrap();

        // Duplicate story across sources collapses to one
        assert_eq!(snapshot.articles.len(), 2);
        assert_eq!(snapshot.metadata.total_count, 2);
        assert!(snapshot
            .articles
            .iter()
            .all(|a| (1.0..=10.0).contains(&a.ai_score)));
        assert!(snapshot.articles[0].title.starts_with("Scaling laws"));
        assert_eq!(snapshot.articles[0].source, "ArXiv AI 研究");
        assert_eq!(
            snapshot.articles[1].url,
            "https://venturebeat.com/ai/chatgpt-funding"
        );
        assert_eq!(snapshot.articles[1].topic, Topic::Industry);
        assert_eq!(snapshot.articles[1].matched_tools[0].tool_name, "ChatGPT");

        // Failure accounting survives in the database
        let statuses = db.get_all_sources().await.unwrap();
        let mit = statuses.iter().find(|s| s.name == "MIT人工智能新闻").unwrap();
        assert_eq!(mit.last_error.as_deref(), Some("HTTP error: status 503"));
        let trends = statuses.iter().find(|s| s.name == "AI 趋势").unwrap();
        assert!(trends.last_error.is_none());
        assert_eq!(trends.last_item_count, 0);

        // The written snapshots feed the presentation side
        let compact: CompactSnapshot = serde_json::from_str(
            &std::fs::read_to_string(data_dir.join(COMPACT_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(compact.articles.len(), 2);
        assert_eq!(compact.articles[0].date, "2025-10-28");

        let cache = CacheManager::new(Arc::new(MemoryStore::new()), chrono::Duration::minutes(30));
        let loader = Arc::new(DataLoader::new(Arc::new(FileOrigin::new(&data_dir)), cache));
        let news = NewsService::new(loader, enricher(&config), Vec::new());

        let articles = news.load().await;
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].id, snapshot.articles[0].id);
        assert_eq!(articles[0].ai_score, snapshot.articles[0].ai_score);

        // Losing the primary snapshot falls back to the compact one
        std::fs::remove_file(data_dir.join(PRIMARY_FILE)).unwrap();
        let articles = news.update().await;
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, snapshot.articles[0].title);
        assert_eq!(articles[0].ai_score, 5.0);
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let temp_dir = create_temp_dir();
        let data_dir = temp_dir.path().join("data");
        let config = config_for(&server, &data_dir);

        let pipeline = Pipeline::new(config.clone(), enricher(&config)).unwrap();
        let result = pipeline.run().await;

        assert!(matches!(result, Err(PipelineError::NoArticles)));
        assert!(!data_dir.join(PRIMARY_FILE).exists());
    }

    #[tokio::test]
    async fn test_presentation_without_any_snapshot_uses_fallback() {
        let temp_dir = create_temp_dir();
        let config = Config::load("feeds.toml").unwrap();

        let cache = CacheManager::new(Arc::new(MemoryStore::new()), chrono::Duration::minutes(30));
        let loader = Arc::new(DataLoader::new(
            Arc::new(FileOrigin::new(temp_dir.path())),
            cache,
        ));
        let news = NewsService::new(loader, enricher(&config), config.fallback_articles.clone());

        let articles = news.load().await;
        assert_eq!(articles.len(), config.fallback_articles.len());
        assert!(articles.iter().all(|a| !a.summary_localized.is_empty()));
    }
}
