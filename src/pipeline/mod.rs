//! Emissions pipeline - clean, derive, and rank taxi trip data

pub mod clean;
pub mod error;
pub mod rank;
pub mod report;
pub mod store;
pub mod transform;
pub mod types;
pub mod unify;

pub use types::*;
