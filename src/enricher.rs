//! Derived article metadata: localized title and summary, matched tools and
//! topic.

use std::sync::Arc;

use tracing::debug;

use crate::article::{Article, MatchedTool, Topic};
use crate::config::ToolDefinition;
use crate::parser::{clean_text, truncate_chars};
use crate::translate::Translator;

const TITLE_LOCALIZED_CHARS: usize = 60;
const CJK_SUMMARY_CHARS: usize = 120;
const CJK_MIN_CHARS: usize = 20;
const LEAD_IN_DESCRIPTION_CHARS: usize = 80;
const MAX_MATCHED_TOOLS: usize = 3;

const DOMAIN_LEAD_IN: &str = "人工智能领域最新进展：";
const GENERIC_LEAD_IN: &str = "AI相关资讯：";

const SEED_PHRASES: &[&str] = &[
    "artificial intelligence",
    "ai",
    "machine learning",
    "deep learning",
    "neural network",
    "natural language",
    "computer vision",
    "robotics",
];

const INDUSTRY_TERMS: &[&str] = &[
    "business",
    "market",
    "funding",
    "company",
    "investment",
    "startup",
    "enterprise",
    "industry",
    "commercial",
    "launch",
];

const TECHNICAL_TERMS: &[&str] = &[
    "research",
    "model",
    "algorithm",
    "technical",
    "science",
    "study",
    "development",
    "innovation",
    "breakthrough",
    "method",
    "architecture",
];

const APPLICATION_TERMS: &[&str] = &[
    "use",
    "application",
    "tool",
    "platform",
    "solution",
    "product",
    "implementation",
    "real-world",
    "practical",
    "case study",
];

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FA5}').contains(&c)
}

/// Summary in the reader's language.
///
/// Text that is already largely Chinese yields its first CJK run. Anything
/// else gets a lead-in phrase followed by the start of the cleaned
/// description.
pub fn localized_summary(title: &str, description: &str) -> String {
    let full_text = format!("{} {}", title, description);

    let mut runs = Vec::new();
    let mut current = String::new();
    for c in full_text.chars() {
        if is_cjk(c) {
            current.push(c);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    let cjk_total: usize = runs.iter().map(|r| r.chars().count()).sum();
    if cjk_total > CJK_MIN_CHARS {
        if let Some(first) = runs.first() {
            return format!("{}...", truncate_chars(first, CJK_SUMMARY_CHARS));
        }
    }

    let lowered = full_text.to_lowercase();
    let lead_in = if SEED_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        DOMAIN_LEAD_IN
    } else {
        GENERIC_LEAD_IN
    };

    format!(
        "{}{}...",
        lead_in,
        truncate_chars(&clean_text(description), LEAD_IN_DESCRIPTION_CHARS)
    )
}

/// Assign one of the four topics. Each term set counts the distinct terms
/// present and the greatest count wins. On ties application beats
/// technical, and technical beats industry. Text with no term at all is
/// [`Topic::General`].
pub fn classify(title: &str, description: &str) -> Topic {
    let text = format!("{} {}", title, description).to_lowercase();
    let count = |terms: &[&str]| terms.iter().filter(|t| text.contains(*t)).count();

    let industry = count(INDUSTRY_TERMS);
    let technical = count(TECHNICAL_TERMS);
    let application = count(APPLICATION_TERMS);

    let best = industry.max(technical).max(application);
    if best == 0 {
        Topic::General
    } else if application == best {
        Topic::Application
    } else if technical == best {
        Topic::Technical
    } else {
        Topic::Industry
    }
}

pub struct Enricher {
    tools: Vec<ToolDefinition>,
    translator: Arc<dyn Translator>,
}

impl Enricher {
    pub fn new(tools: Vec<ToolDefinition>, translator: Arc<dyn Translator>) -> Self {
        Self { tools, translator }
    }

    /// Up to three catalog tools whose keywords appear in the text, best
    /// first. Equal scores keep catalog order.
    pub fn match_tools(&self, title: &str, description: &str) -> Vec<MatchedTool> {
        let text = format!("{} {}", title, description).to_lowercase();

        let mut matched: Vec<MatchedTool> = self
            .tools
            .iter()
            .filter_map(|tool| {
                let hits: Vec<&String> = tool
                    .keywords
                    .iter()
                    .filter(|k| !k.trim().is_empty() && text.contains(&k.to_lowercase()))
                    .collect();

                let first = hits.first()?;
                Some(MatchedTool {
                    tool_name: tool.name.clone(),
                    tool_category: tool.category.clone(),
                    reason: first.to_string(),
                    score: hits.len() as u32,
                })
            })
            .collect();

        matched.sort_by(|a, b| b.score.cmp(&a.score));
        matched.truncate(MAX_MATCHED_TOOLS);
        matched
    }

    pub async fn enrich(&self, article: &mut Article) {
        // A title localized upstream is kept as is
        if article.title_localized == article.title {
            let translated = match self.translator.translate(&article.title).await {
                Ok(translated) => translated,
                Err(e) => {
                    debug!("Title translation failed: {}", e);
                    article.title.clone()
                }
            };
            article.title_localized = truncate_chars(&translated, TITLE_LOCALIZED_CHARS);
        }

        article.summary_localized = localized_summary(&article.title, &article.description);
        article.matched_tools = self.match_tools(&article.title, &article.description);
        article.topic = classify(&article.title, &article.description);
    }

    pub async fn enrich_all(&self, mut articles: Vec<Article>) -> Vec<Article> {
        for article in &mut articles {
            self.enrich(article).await;
        }
        articles
    }
}
