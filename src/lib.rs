//! Coral Funnel: onboarding quiz funnel core.

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod funnel;
pub mod storage;
