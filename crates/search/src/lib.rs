//! ScholarSearch search library
//!
//! Achievement search over the document index: entity resolution, composite
//! query construction, result caching, engagement counters, plus patent
//! search and hot topics.

pub mod achievements;
pub mod composer;
pub mod counters;
pub mod fallback;
pub mod patents;
pub mod resolver;
pub mod topics;
pub mod views;

pub use achievements::{AchievementDeps, AchievementService};
pub use composer::{QueryComposer, SearchCriteria};
pub use counters::EngagementCounters;
pub use fallback::FallbackPolicy;
pub use patents::{PatentCriteria, PatentService};
pub use resolver::{EntityResolver, ResolvedEntities};
pub use topics::{TimeRange, TopicService, TopicWeight};
pub use views::{AchievementView, PageRequest, PatentView, ResultPage};
