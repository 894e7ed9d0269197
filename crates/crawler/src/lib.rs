//! citetree crawler
//!
//! Builds a local citation graph incrementally:
//! - `resolver`: user ids to canonical paper ids, recorded as roots
//! - `crawler`: depth-bounded BFS that treats stored edges as a cache
//! - `fetcher`: batched, retrying metadata backfill
//! - `pipeline`: the three in sequence over one store

pub mod crawler;
pub mod fetcher;
pub mod pipeline;
pub mod resolver;

pub use crawler::{CrawlOutcome, CrawlParams, Crawler, EmptyResultShim};
pub use fetcher::{FetchReport, MetadataFetcher};
pub use pipeline::{ExplorationPipeline, ExplorationSummary};
pub use resolver::{ExternalId, Resolution, ResolvedRoot, RootResolver};
