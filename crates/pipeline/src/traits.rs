//! Core traits for the filtering pipeline.
//!
//! This module defines the Filter trait that allows composable,
//! extensible filters to be applied to candidate events.

use event_store::Event;

use crate::scorer::ScoreRequest;

/// Core trait for filtering candidate events.
///
/// All filters must implement this trait to be used in the FilterPipeline.
///
/// ## Design Note
/// - `Send + Sync` allows filters to be shared across request handlers
/// - Filters are predicates over borrowed events, so applying a pipeline
///   never copies or mutates the caller's collection
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    /// Whether `event` stays in the candidate set for `request`.
    fn matches(&self, event: &Event, request: &ScoreRequest) -> bool;
}
