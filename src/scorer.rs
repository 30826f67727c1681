use chrono::{DateTime, Utc};

use crate::config::{Config, KeywordTables, SourceConfig};
use crate::parser::{parse_date, FeedItem};

/// A feed item that passed the relevance threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub title: String,
    pub link: String,
    /// Description for display, the title when the feed gave none
    pub description: String,
    pub published: DateTime<Utc>,
    /// Relevance score rounded to one decimal place
    pub score: f64,
    pub source: String,
    pub category: String,
}

/// Weighted keyword relevance scorer.
pub struct Scorer {
    terms: Vec<(String, f64)>,
    threshold: f64,
}

impl Scorer {
    pub fn new(keywords: &KeywordTables, threshold: f64) -> Self {
        let terms = keywords
            .tier1
            .iter()
            .chain(&keywords.tier2)
            .map(|(term, weight)| (term.to_lowercase(), *weight))
            .filter(|(term, _)| !term.trim().is_empty())
            .collect();

        Self { terms, threshold }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.keywords, config.scoring.threshold)
    }

    /// Sum of `weight * occurrences` over every keyword of both tiers.
    pub fn score(&self, title: &str, description: &str) -> f64 {
        let text = format!("{} {}", title, description).to_lowercase();

        self.terms
            .iter()
            .map(|(term, weight)| weight * count_whole_words(&text, term) as f64)
            .sum()
    }

    /// Score an item and keep it only when it reaches the threshold.
    ///
    /// A missing description scores as empty text; the title only stands in
    /// for it on the kept item.
    pub fn evaluate(
        &self,
        item: FeedItem,
        source: &SourceConfig,
        now: DateTime<Utc>,
    ) -> Option<ScoredItem> {
        let score = self.score(&item.title, item.description.as_deref().unwrap_or(""));
        if score < self.threshold {
            return None;
        }

        Some(ScoredItem {
            published: item
                .pub_date
                .as_deref()
                .map(|d| parse_date(d, now))
                .unwrap_or(now),
            score: round_score(score),
            description: item.description.unwrap_or_else(|| item.title.clone()),
            title: item.title,
            link: item.link,
            source: source.name.clone(),
            category: source.category.clone(),
        })
    }
}

pub fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}

/// Count non-overlapping occurrences of `needle` in `haystack` that sit on
/// ASCII word boundaries. Both arguments are expected to be lowercased.
pub fn count_whole_words(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut pos = 0;
    while let Some(rel) = haystack[pos..].find(needle) {
        let start = pos + rel;
        let end = start + needle.len();

        let before_ok = !haystack[..start].chars().next_back().is_some_and(is_word_char);
        let after_ok = !haystack[end..].chars().next().is_some_and(is_word_char);

        if before_ok && after_ok {
            count += 1;
            pos = end;
        } else {
            pos = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
        }
    }
    count
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
