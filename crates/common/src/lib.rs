//! ScholarSearch Common Library
//!
//! Shared code for the search and ranking services including:
//! - Document index contract, query builder and Elasticsearch client
//! - Search result caching
//! - Relational pool, entities and repository
//! - Error types and handling
//! - Configuration management
//! - Caller identity
//! - Metrics and observability

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod ids;
pub mod index;
pub mod metrics;
pub mod translation;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use ids::DocId;
pub use index::{Collection, DocumentIndex};
pub use translation::Translator;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
