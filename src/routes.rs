use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::article::{Article, Topic};
use crate::db::{Database, SourceStatus};
use crate::loader::{ContentManager, NewsService};
use crate::pipeline::{refresh_and_reload, Pipeline};
use crate::search::filter_articles;

pub struct AppState {
    pub db: Arc<Database>,
    pub pipeline: Arc<Pipeline>,
    pub news: Arc<NewsService>,
    pub content: Arc<ContentManager>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/articles", get(list_articles))
        .route("/api/update", post(update))
        .route("/api/catalog/:name", get(catalog))
        .route("/api/sources", get(sources))
        .route("/refresh", post(refresh))
        .route("/refresh/status", get(refresh_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Custom error type
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    fn new(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.error.to_string() })),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticlesQuery {
    #[serde(default)]
    pub q: String,
    /// Topic label or short name; `all` or empty means no filter
    pub topic: Option<String>,
}

impl ArticlesQuery {
    fn topic(&self) -> Result<Option<Topic>, AppError> {
        match self.topic.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(name) => Topic::parse(name).map(Some).ok_or_else(|| {
                AppError::new(
                    StatusCode::BAD_REQUEST,
                    anyhow::anyhow!("Unknown topic: {}", name),
                )
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticlesResponse {
    pub total: usize,
    pub articles: Vec<Article>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub name: String,
    pub items: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub refreshing: bool,
    pub last_generated: Option<DateTime<Utc>>,
}

// Route handlers
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticlesQuery>,
) -> Result<Json<ArticlesResponse>, AppError> {
    let topic = query.topic()?;
    let articles = state.news.articles().await;
    let articles = filter_articles(&articles, &query.q, topic);

    Ok(Json(ArticlesResponse {
        total: articles.len(),
        articles,
    }))
}

pub async fn update(State(state): State<Arc<AppState>>) -> Json<ArticlesResponse> {
    let articles = state.news.update().await;
    Json(ArticlesResponse {
        total: articles.len(),
        articles,
    })
}

pub async fn catalog(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CatalogResponse>, AppError> {
    let items = state.content.catalog(&name).await.ok_or_else(|| {
        AppError::new(
            StatusCode::NOT_FOUND,
            anyhow::anyhow!("Unknown catalog: {}", name),
        )
    })?;

    Ok(Json(CatalogResponse { name, items }))
}

pub async fn sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SourceStatus>>, AppError> {
    Ok(Json(state.db.get_all_sources().await?))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Json<RefreshStatus> {
    // Spawn the ingestion task
    let pipeline = state.pipeline.clone();
    let news = state.news.clone();
    tokio::spawn(async move {
        refresh_and_reload(&pipeline, &news).await;
    });

    // Return refreshing state immediately
    Json(RefreshStatus {
        refreshing: true,
        last_generated: state.pipeline.last_generated().await,
    })
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> Json<RefreshStatus> {
    Json(RefreshStatus {
        refreshing: state.pipeline.is_refreshing().await,
        last_generated: state.pipeline.last_generated().await,
    })
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
