//! API handlers module

pub mod achievements;
pub mod health;
pub mod patents;
pub mod rankings;
pub mod topics;
