//! HTTP surface for the media scrape pipeline: Basic-Auth, job
//! submission, job/media lookup, queue stats, and health. The worker
//! pool and backpressure loops live in [`scrape_pipeline`] /
//! [`scrape_queue`]; this crate only wires them to axum and runs them in
//! the same process (`app::App`).

pub mod app;
pub mod auth;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod validation;
