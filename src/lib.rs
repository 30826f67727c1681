//! AI Digest - an AI news feed aggregator
//!
//! This crate fetches syndication feeds, keeps the items relevant to AI,
//! ranks and enriches them, and writes JSON snapshots that a small API
//! serves through a TTL cache.

pub mod article;
pub mod cache;
pub mod config;
pub mod db;
pub mod debounce;
pub mod enricher;
pub mod fetcher;
pub mod loader;
pub mod parser;
pub mod pipeline;
pub mod ranker;
pub mod routes;
pub mod scorer;
pub mod search;
pub mod snapshot;
pub mod translate;
