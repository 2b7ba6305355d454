//! Filter to keep only events in the requested category.

use event_store::Event;

use crate::scorer::ScoreRequest;
use crate::traits::Filter;

/// Keeps events whose category contains the requested one.
///
/// ## Algorithm
/// 1. The exact string `"All"` disables the filter
/// 2. Otherwise both sides are lower-cased and the event's category must
///    *contain* the requested value, so `"seminar"` matches `"Tech Seminar"`
pub struct CategoryFilter;

impl Filter for CategoryFilter {
    fn name(&self) -> &str {
        "CategoryFilter"
    }

    fn matches(&self, event: &Event, request: &ScoreRequest) -> bool {
        match request.category_filter() {
            Some(category) => event
                .category
                .to_lowercase()
                .contains(&category.to_lowercase()),
            None => true,
        }
    }
}
