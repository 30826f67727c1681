use std::cmp::Ordering;
use std::collections::HashSet;

use crate::scorer::ScoredItem;

/// Lowercased, whitespace-collapsed title used to detect the same story
/// arriving from several sources.
pub fn dedup_key(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Order items by score (highest first), newest first among equal scores,
/// then by title and link so the result never depends on fetch order.
fn compare(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.published.cmp(&a.published))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.link.cmp(&b.link))
}

/// Sort and deduplicate without truncating. The first (best ranked)
/// instance of a repeated story is kept.
pub fn sort_unique(mut items: Vec<ScoredItem>) -> Vec<ScoredItem> {
    items.sort_by(compare);

    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(dedup_key(&item.title)));
    items
}

/// Sorted, deduplicated items truncated to `limit`.
pub fn rank(items: Vec<ScoredItem>, limit: usize) -> Vec<ScoredItem> {
    let mut ranked = sort_unique(items);
    ranked.truncate(limit);
    ranked
}
