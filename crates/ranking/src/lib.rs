//! ScholarSearch ranking library
//!
//! Builds per-domain scholar leaderboards from the author index and serves
//! them back in rank order.

pub mod batch;
pub mod domains;
pub mod influence;
pub mod store;

pub use batch::RankingGenerator;
pub use domains::{TableNamer, ALL_DOMAINS, DOMAINS};
pub use influence::{influence_score, RankingRow};
pub use store::{MemoryRankingStore, RankingStore, SqlRankingStore};
