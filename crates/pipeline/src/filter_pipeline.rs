//! Ordered chain of [`Filter`]s applied before scoring.

use event_store::Event;
use tracing::debug;

use crate::filters::CategoryFilter;
use crate::scorer::ScoreRequest;
use crate::traits::Filter;

/// Runs each filter in turn over a borrowed candidate list.
///
/// ## Usage
/// ```ignore
/// let pipeline = FilterPipeline::new().add_filter(CategoryFilter);
/// let candidates = pipeline.apply(&events, &request);
/// ```
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    /// A pipeline that keeps every event.
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// The pipeline used in front of every recommendation request.
    pub fn recommendations() -> Self {
        Self::new().add_filter(CategoryFilter)
    }

    /// Add a filter to the pipeline (builder pattern).
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Apply all filters in sequence to the events.
    ///
    /// Returns borrowed events in their original relative order.
    pub fn apply<'a>(&self, events: &'a [Event], request: &ScoreRequest) -> Vec<&'a Event> {
        let mut current: Vec<&'a Event> = events.iter().collect();
        for filter in &self.filters {
            let before = current.len();
            current.retain(|event| filter.matches(event, request));
            debug!(
                "Filter applied: {} ({} -> {} events)",
                filter.name(),
                before,
                current.len()
            );
        }
        current
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}
