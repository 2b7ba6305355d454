//! Filtering and relevance scoring of event candidates.
//!
//! This crate provides:
//! - Filter trait and implementations for candidate filtering
//! - FilterPipeline for composing filters
//! - Scorer for the tag / text / recency relevance model
//!
//! ## Architecture
//! A recommendation request is processed in stages:
//! 1. Filters drop events outside the requested category
//! 2. The Scorer assigns each remaining event a relevance score
//! 3. Events are stably sorted by score and cut to the requested limit
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{ScoreRequest, score_and_rank};
//!
//! let request = ScoreRequest::new()
//!     .with_interests(["ai", "ml"])
//!     .with_query("workshop")
//!     .with_limit(5);
//!
//! let ranked = score_and_rank(&events, &request, chrono::Utc::now());
//! ```

pub mod filter_pipeline;
pub mod filters;
pub mod scorer;
pub mod traits;

// Re-export main types
pub use filter_pipeline::FilterPipeline;
pub use scorer::{
    ALL_CATEGORIES, DEFAULT_LIMIT, RecencyMode, ScoreBreakdown, ScoreRequest, ScoredEvent, Scorer,
    score_and_rank, score_and_rank_with,
};
pub use traits::Filter;
