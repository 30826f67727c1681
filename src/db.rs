use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::cache::{CacheStore, StorageError};
use crate::config::SourceConfig;

/// Fetch status of one configured source.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SourceStatus {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub last_fetched: Option<String>,
    pub last_error: Option<String>,
    pub last_item_count: i64,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                last_fetched TEXT,
                last_error TEXT,
                last_item_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                envelope TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn sync_sources(&self, sources: &[SourceConfig]) -> anyhow::Result<()> {
        for source in sources {
            sqlx::query(
                r#"
                INSERT INTO sources (name, url)
                VALUES (?, ?)
                ON CONFLICT(url) DO UPDATE SET name = excluded.name
                "#,
            )
            .bind(&source.name)
            .bind(&source.url)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn get_all_sources(&self) -> anyhow::Result<Vec<SourceStatus>> {
        let sources = sqlx::query_as::<_, SourceStatus>("SELECT * FROM sources ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(sources)
    }

    pub async fn get_source_by_url(&self, url: &str) -> anyhow::Result<Option<SourceStatus>> {
        let source = sqlx::query_as::<_, SourceStatus>("SELECT * FROM sources WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(source)
    }

    /// Record the outcome of fetching a source. A successful fetch clears
    /// the previous error.
    pub async fn update_source_fetched(
        &self,
        url: &str,
        error: Option<&str>,
        item_count: usize,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE sources
            SET last_fetched = ?, last_error = ?, last_item_count = ?
            WHERE url = ?
            "#,
        )
        .bind(&now)
        .bind(error)
        .bind(item_count as i64)
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for Database {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT envelope FROM cache_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(envelope,)| envelope))
    }

    async fn save(&self, key: &str, envelope: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, envelope)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET envelope = excluded.envelope
            "#,
        )
        .bind(key)
        .bind(envelope)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    fn source(name: &str, url: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            url: url.to_string(),
            category: "学术研究".to_string(),
            weight: 0.9,
            enabled: true,
        }
    }

    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_database_initialization() {
            let db = create_test_db().await;
            let sources = db.get_all_sources().await.unwrap();
            assert!(sources.is_empty());
        }

        #[tokio::test]
        async fn test_double_initialization_is_safe() {
            let db = create_test_db().await;
            assert!(db.initialize().await.is_ok());
        }
    }

    mod sync_sources_tests {
        use super::*;

        #[tokio::test]
        async fn test_sync_multiple_sources() {
            let db = create_test_db().await;
            let sources = vec![
                source("ArXiv", "https://export.arxiv.org/rss/cs.AI"),
                source("MIT", "https://news.mit.edu/rss"),
            ];

            db.sync_sources(&sources).await.unwrap();

            let stored = db.get_all_sources().await.unwrap();
            assert_eq!(stored.len(), 2);
            assert_eq!(stored[0].name, "ArXiv");
            assert!(stored[0].last_fetched.is_none());
        }

        #[tokio::test]
        async fn test_sync_updates_existing_source() {
            let db = create_test_db().await;
            db.sync_sources(&[source("Old", "https://a.example.com/rss")])
                .await
                .unwrap();
            db.sync_sources(&[source("New", "https://a.example.com/rss")])
                .await
                .unwrap();

            let stored = db.get_all_sources().await.unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].name, "New");
        }
    }

    mod fetch_status_tests {
        use super::*;

        #[tokio::test]
        async fn test_failure_then_success_clears_error() {
            let db = create_test_db().await;
            let url = "https://a.example.com/rss";
            db.sync_sources(&[source("A", url)]).await.unwrap();

            db.update_source_fetched(url, Some("Request timed out"), 0)
                .await
                .unwrap();
            let status = db.get_source_by_url(url).await.unwrap().unwrap();
            assert!(status.last_fetched.is_some());
            assert_eq!(status.last_error.as_deref(), Some("Request timed out"));

            db.update_source_fetched(url, None, 6).await.unwrap();
            let status = db.get_source_by_url(url).await.unwrap().unwrap();
            assert!(status.last_error.is_none());
            assert_eq!(status.last_item_count, 6);
        }

        #[tokio::test]
        async fn test_unknown_source() {
            let db = create_test_db().await;
            assert!(db
                .get_source_by_url("https://nowhere.example.com")
                .await
                .unwrap()
                .is_none());
        }
    }

    mod cache_store_tests {
        use super::*;

        #[tokio::test]
        async fn test_save_load_remove() {
            let db = create_test_db().await;

            assert!(db.load("news_cache").await.unwrap().is_none());

            db.save("news_cache", r#"{"value":1}"#).await.unwrap();
            assert_eq!(
                db.load("news_cache").await.unwrap().as_deref(),
                Some(r#"{"value":1}"#)
            );

            db.save("news_cache", r#"{"value":2}"#).await.unwrap();
            assert_eq!(
                db.load("news_cache").await.unwrap().as_deref(),
                Some(r#"{"value":2}"#)
            );

            db.remove("news_cache").await.unwrap();
            assert!(db.load("news_cache").await.unwrap().is_none());
        }
    }
}
