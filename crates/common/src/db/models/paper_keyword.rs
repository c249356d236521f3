//! Keyword popularity entity
//!
//! One row per concept: a lifetime count plus twelve calendar-month buckets.

use crate::db::MonthlyCounts;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paper_keywords")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "String(StringLen::N(36))")]
    pub id: String,

    #[sea_orm(unique)]
    pub keyword: String,

    pub cnt: i32,

    pub cnt1: Option<i32>,
    pub cnt2: Option<i32>,
    pub cnt3: Option<i32>,
    pub cnt4: Option<i32>,
    pub cnt5: Option<i32>,
    pub cnt6: Option<i32>,
    pub cnt7: Option<i32>,
    pub cnt8: Option<i32>,
    pub cnt9: Option<i32>,
    pub cnt10: Option<i32>,
    pub cnt11: Option<i32>,
    pub cnt12: Option<i32>,
}

impl Model {
    /// Month buckets, missing values as zero
    pub fn monthly(&self) -> MonthlyCounts {
        let buckets = [
            self.cnt1, self.cnt2, self.cnt3, self.cnt4, self.cnt5, self.cnt6,
            self.cnt7, self.cnt8, self.cnt9, self.cnt10, self.cnt11, self.cnt12,
        ];
        MonthlyCounts::new(buckets.map(|c| i64::from(c.unwrap_or(0))))
    }
}

impl Column {
    /// Bucket column of a calendar month (1 = January)
    pub fn month(month: u32) -> Option<Self> {
        let column = match month {
            1 => Self::Cnt1,
            2 => Self::Cnt2,
            3 => Self::Cnt3,
            4 => Self::Cnt4,
            5 => Self::Cnt5,
            6 => Self::Cnt6,
            7 => Self::Cnt7,
            8 => Self::Cnt8,
            9 => Self::Cnt9,
            10 => Self::Cnt10,
            11 => Self::Cnt11,
            12 => Self::Cnt12,
            _ => return None,
        };
        Some(column)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
