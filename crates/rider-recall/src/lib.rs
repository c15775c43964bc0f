//! Rider recall orchestration for instant delivery sites.
//!
//! A recall run predicts the capacity gap for a site and date, gates the recall on a
//! threshold plus approver feedback, ranks eligible riders, contacts them under a bounded
//! worker pool and summarises the outcome.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
