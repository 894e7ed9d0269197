//! citetree Common Library
//!
//! Shared code for the crawler and the command-line front end including:
//! - Graph store models and repository
//! - Scholar API client abstraction
//! - Error types and exit codes
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod graph;
pub mod metrics;
pub mod scholar;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use graph::Direction;
pub use scholar::ScholarClient;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
