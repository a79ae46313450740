//! Data types for the profile extraction pipeline.

pub mod config;
pub mod metrics;
pub mod profile;
pub mod state;
pub mod verdict;
