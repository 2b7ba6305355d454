//! HTTP backend for Evently.
//!
//! This crate wires the event store, the filter pipeline and the ranking
//! strategies together behind an axum router:
//! - [`config`]: environment-backed settings
//! - [`ranker`]: local, remote and fallback ranking strategies
//! - [`orchestrator`]: one recommendation request end to end
//! - [`api`]: routes and handlers

pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod ranker;
pub mod state;

pub use api::{cors_layer, create_router};
pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use orchestrator::RecommendationOrchestrator;
pub use ranker::{FallbackRanker, LocalRanker, RankInput, Ranker, RemoteRanker, build_ranker};
pub use state::AppState;
