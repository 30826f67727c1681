use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ai_digest::cache::{CacheManager, CacheStore};
use ai_digest::config::Config;
use ai_digest::db::Database;
use ai_digest::enricher::Enricher;
use ai_digest::loader::{ContentManager, DataLoader, FileOrigin, HttpOrigin, NewsService, Origin};
use ai_digest::pipeline::{start_background_refresh, Pipeline, PipelineError};
use ai_digest::routes::{self, AppState};
use ai_digest::translate::{translator_from_config, Translator};

#[derive(Parser)]
#[command(name = "ai-digest", version, about = "AI news feed aggregator")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "feeds.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion pipeline once and write the snapshots (default)
    Fetch,
    /// Serve the JSON API with periodic background ingestion
    Serve {
        #[arg(long, default_value = "0.0.0.0:3000")]
        bind: String,
        /// Load snapshots and catalogs from this base URL instead of the data directory
        #[arg(long)]
        origin: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_digest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Arc::new(Config::load(&cli.config)?);
    info!(
        "Loaded {} sources from {}",
        config.sources.len(),
        cli.config.display()
    );

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:ai_digest.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    db.sync_sources(&config.sources).await?;
    info!("Database initialized");
    let db = Arc::new(db);

    let translator = translator_from_config(&config.translation);

    match cli.command.unwrap_or(Command::Fetch) {
        Command::Fetch => fetch(config, db, translator).await,
        Command::Serve { bind, origin } => {
            serve(config, db, translator, &bind, origin).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn fetch(
    config: Arc<Config>,
    db: Arc<Database>,
    translator: Arc<dyn Translator>,
) -> anyhow::Result<ExitCode> {
    let enricher = Arc::new(Enricher::new(config.tools.clone(), translator));
    let pipeline = Pipeline::new(config.clone(), enricher)?.with_database(db);

    match pipeline.run().await {
        Ok(snapshot) => {
            let (primary, compact) = snapshot.write_to(&config.data_dir)?;
            info!(
                "Wrote {} articles to {} and {}",
                snapshot.articles.len(),
                primary.display(),
                compact.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(PipelineError::NoArticles) => {
            error!("Ingestion produced no articles");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn serve(
    config: Arc<Config>,
    db: Arc<Database>,
    translator: Arc<dyn Translator>,
    bind: &str,
    origin: Option<String>,
) -> anyhow::Result<()> {
    let store: Arc<dyn CacheStore> = db.clone();
    let cache = CacheManager::new(store, chrono::Duration::minutes(config.cache.ttl_minutes));

    let origin: Arc<dyn Origin> = match origin {
        Some(base_url) => Arc::new(HttpOrigin::new(base_url)?),
        None => Arc::new(FileOrigin::new(&config.data_dir)),
    };
    let loader = Arc::new(DataLoader::new(origin, cache));

    let content = Arc::new(ContentManager::new(loader.clone(), config.tools.clone()));
    let tools = content.load_tools().await;
    info!("Tool catalog has {} entries", tools.len());

    let enricher = Arc::new(Enricher::new(tools, translator));
    let news = Arc::new(NewsService::new(
        loader,
        enricher.clone(),
        config.fallback_articles.clone(),
    ));
    let pipeline = Arc::new(Pipeline::new(config.clone(), enricher)?.with_database(db.clone()));

    // Start background ingestion task
    let bg_pipeline = pipeline.clone();
    let bg_news = news.clone();
    let refresh_interval = config.fetch.refresh_interval;
    tokio::spawn(async move {
        start_background_refresh(bg_pipeline, bg_news, refresh_interval).await;
    });

    let state = Arc::new(AppState {
        db,
        pipeline,
        news,
        content,
    });
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Server starting on http://{}", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
