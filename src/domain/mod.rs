//! Core domain types and logic.

pub mod error;
pub mod fill;
pub mod journal;
pub mod reconstruct;
pub mod tags;
pub mod instrument;
pub mod live;
pub mod analytics;
