//! SeaORM entity models
//!
//! Relational entities read by the search engine

mod paper_keyword;
mod user_collection;

pub use paper_keyword::{
    ActiveModel as PaperKeywordActiveModel, Column as PaperKeywordColumn,
    Entity as PaperKeywordEntity, Model as PaperKeyword,
};

pub use user_collection::{
    ActiveModel as UserCollectionActiveModel, Column as UserCollectionColumn,
    Entity as UserCollectionEntity, Model as UserCollection,
};
