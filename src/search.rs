use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::article::{Article, Topic};
use crate::debounce::Debouncer;
use crate::enricher::classify;

pub const SEARCH_DELAY: Duration = Duration::from_millis(300);

/// Case-insensitive substring search over title, summary and source, plus
/// an optional topic filter. An empty query matches everything.
pub fn filter_articles(articles: &[Article], query: &str, topic: Option<Topic>) -> Vec<Article> {
    let query = query.trim().to_lowercase();

    articles
        .iter()
        .filter(|a| topic.map_or(true, |t| classify(&a.title, &a.description) == t))
        .filter(|a| {
            query.is_empty()
                || [&a.title, &a.title_localized, &a.summary, &a.source]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub query: String,
    pub topic: Option<Topic>,
    pub articles: Vec<Article>,
}

/// Search-as-you-type. Results of the last query in each quiet window are
/// published to subscribers.
pub struct DebouncedSearch {
    articles: Arc<Vec<Article>>,
    debouncer: Debouncer,
    results: Arc<watch::Sender<SearchResult>>,
}

impl DebouncedSearch {
    pub fn new(articles: Vec<Article>, delay: Duration) -> Self {
        let initial = SearchResult {
            articles: articles.clone(),
            ..Default::default()
        };
        let (results, _) = watch::channel(initial);

        Self {
            articles: Arc::new(articles),
            debouncer: Debouncer::new(delay),
            results: Arc::new(results),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResult> {
        self.results.subscribe()
    }

    pub fn search(&self, query: impl Into<String>, topic: Option<Topic>) {
        let query = query.into();
        let articles = Arc::clone(&self.articles);
        let results = Arc::clone(&self.results);

        self.debouncer.call(async move {
            let matched = filter_articles(&articles, &query, topic);
            results.send_replace(SearchResult {
                query,
                topic,
                articles: matched,
            });
        });
    }
}
