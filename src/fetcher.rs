use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{FetchConfig, SourceConfig};
use crate::parser;
use crate::scorer::{ScoredItem, Scorer};

/// Per-source fetch failures. None of them abort a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,
    #[error("Request failed: {0}")]
    Network(reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }
}

/// Feed body as downloaded, before parsing.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source: String,
    pub text: String,
}

/// Outcome for one source in a harvest.
#[derive(Debug)]
pub struct SourceOutcome {
    pub name: String,
    pub url: String,
    /// Number of items kept, or the fetch error
    pub result: Result<usize, FetchError>,
}

/// Everything collected from one sequential pass over the sources.
#[derive(Debug, Default)]
pub struct Harvest {
    pub items: Vec<ScoredItem>,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<SourceOutcome>,
}

pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn fetch(&self, source: &SourceConfig) -> Result<RawDocument, FetchError> {
        let response = self
            .client
            .get(&source.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        Ok(RawDocument {
            source: source.name.clone(),
            text: response.text().await?,
        })
    }

    /// Fetch, parse and score each source in turn, keeping at most
    /// `max_items` relevant items per source.
    ///
    /// A source finishes (or fails) before the next one starts. Failures
    /// are counted and logged, and the source contributes nothing.
    pub async fn harvest<'a, I>(&self, sources: I, scorer: &Scorer, max_items: usize) -> Harvest
    where
        I: IntoIterator<Item = &'a SourceConfig>,
    {
        let mut harvest = Harvest::default();

        for source in sources {
            info!("Fetching source: {} ({})", source.name, source.url);

            let result = match self.fetch(source).await {
                Ok(document) => {
                    let now = Utc::now();
                    let kept: Vec<ScoredItem> = parser::parse(&document.text)
                        .filter_map(|item| scorer.evaluate(item, source, now))
                        .take(max_items)
                        .collect();

                    info!("{}: kept {} relevant items", source.name, kept.len());
                    harvest.succeeded += 1;
                    let count = kept.len();
                    harvest.items.extend(kept);
                    Ok(count)
                }
                Err(e) => {
                    warn!("Failed to fetch source '{}': {}", source.name, e);
                    harvest.failed += 1;
                    Err(e)
                }
            };

            harvest.outcomes.push(SourceOutcome {
                name: source.name.clone(),
                url: source.url.clone(),
                result,
            });
        }

        harvest
    }
}
