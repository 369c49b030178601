//! Shared domain types for the media scrape pipeline.
//!
//! Jobs are user submissions, media are extracted assets scoped to a job,
//! users are the Basic-Auth/login principals. Kept dependency-free of any particular
//! backend (Postgres, Redis, axum) so every other crate in the workspace
//! can depend on it without pulling in transport concerns.

pub mod config;
pub mod error;
pub mod models;

pub use config::AppConfig;
pub use error::ScrapeError;
pub use models::{
    Job, JobStatus, Media, MediaType, QueueItemPayload, User,
};
