//! Relevance scoring for event recommendations.
//!
//! Each candidate gets three independent scores that are summed:
//!
//! | term    | rule                                                         |
//! |---------|--------------------------------------------------------------|
//! | tag     | +3 per interest equal (case-insensitively) to one of the tags |
//! | text    | query found in title +3, description +2, venue +1             |
//! | recency | `max(0, 5 - min(days_until, 10)) * 0.6`                      |
//!
//! Candidates are then stably sorted by total score (descending) and
//! truncated to the request limit. Nothing here reads the clock; callers
//! pass `now` explicitly.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use event_store::Event;

use crate::filter_pipeline::FilterPipeline;

/// Category value that disables category filtering
pub const ALL_CATEGORIES: &str = "All";

/// Number of results when the caller does not say otherwise
pub const DEFAULT_LIMIT: usize = 9;

const TAG_WEIGHT: f64 = 3.0;
const TITLE_WEIGHT: f64 = 3.0;
const DESCRIPTION_WEIGHT: f64 = 2.0;
const VENUE_WEIGHT: f64 = 1.0;

const RECENCY_PEAK: f64 = 5.0;
const RECENCY_HORIZON_DAYS: i64 = 10;
const RECENCY_WEIGHT: f64 = 0.6;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

// =============================================================================
// Request
// =============================================================================

/// What the caller is looking for.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRequest {
    pub interests: Vec<String>,
    pub query: String,
    /// `"All"` (exactly) means no category filtering
    pub category: String,
    /// Maximum number of results; `0` yields an empty result
    pub limit: usize,
}

impl Default for ScoreRequest {
    fn default() -> Self {
        Self {
            interests: Vec::new(),
            query: String::new(),
            category: ALL_CATEGORIES.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ScoreRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests = interests.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// The category to filter on, or `None` for the `"All"` sentinel.
    pub fn category_filter(&self) -> Option<&str> {
        if self.category == ALL_CATEGORIES {
            None
        } else {
            Some(&self.category)
        }
    }
}

// =============================================================================
// Recency mode
// =============================================================================

/// How events that already started are treated by the recency term.
///
/// The historical formula never clamps negative day counts, so an event
/// that happened a month ago scores far above one happening tomorrow.
/// `ClampPast` treats anything in the past as "today".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecencyMode {
    #[default]
    ClampPast,
    /// Reproduce the historical formula exactly
    Parity,
}

impl FromStr for RecencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" | "clamp-past" => Ok(Self::ClampPast),
            "parity" => Ok(Self::Parity),
            other => Err(format!("unknown recency mode '{other}' (expected 'clamp' or 'parity')")),
        }
    }
}

impl fmt::Display for RecencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClampPast => f.write_str("clamp"),
            Self::Parity => f.write_str("parity"),
        }
    }
}

// =============================================================================
// Scores
// =============================================================================

/// Per-term scores of one event.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub tag: f64,
    pub text: f64,
    pub recency: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.tag + self.text + self.recency
    }
}

/// An event together with how it scored.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEvent<'a> {
    pub event: &'a Event,
    pub breakdown: ScoreBreakdown,
}

/// Lower-cased request terms, computed once per ranking call.
struct PreparedRequest {
    interests: Vec<String>,
    query: Option<String>,
}

impl PreparedRequest {
    fn new(request: &ScoreRequest) -> Self {
        let query = request.query.trim();
        Self {
            interests: request.interests.iter().map(|i| i.to_lowercase()).collect(),
            query: (!query.is_empty()).then(|| query.to_lowercase()),
        }
    }
}

/// Scores and ranks candidate events.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    recency_mode: RecencyMode,
}

impl Scorer {
    pub fn new(recency_mode: RecencyMode) -> Self {
        Self { recency_mode }
    }

    pub fn recency_mode(&self) -> RecencyMode {
        self.recency_mode
    }

    /// Score a single event.
    pub fn score(&self, event: &Event, request: &ScoreRequest, now: DateTime<Utc>) -> ScoreBreakdown {
        self.score_prepared(event, &PreparedRequest::new(request), now)
    }

    /// Score, sort and truncate, keeping the per-term breakdown.
    ///
    /// No category filtering happens here; see [`score_and_rank`].
    pub fn rank_scored<'a, I>(
        &self,
        candidates: I,
        request: &ScoreRequest,
        now: DateTime<Utc>,
    ) -> Vec<ScoredEvent<'a>>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let prepared = PreparedRequest::new(request);
        let mut scored: Vec<ScoredEvent<'a>> = candidates
            .into_iter()
            .map(|event| ScoredEvent {
                event,
                breakdown: self.score_prepared(event, &prepared, now),
            })
            .collect();

        // sort_by is stable: equal scores keep their input order
        scored.sort_by(|a, b| {
            b.breakdown
                .total()
                .partial_cmp(&a.breakdown.total())
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(request.limit);
        scored
    }

    /// Score, sort and truncate, returning copies of the winning events.
    pub fn rank<'a, I>(&self, candidates: I, request: &ScoreRequest, now: DateTime<Utc>) -> Vec<Event>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        self.rank_scored(candidates, request, now)
            .into_iter()
            .map(|scored| scored.event.clone())
            .collect()
    }

    fn score_prepared(
        &self,
        event: &Event,
        prepared: &PreparedRequest,
        now: DateTime<Utc>,
    ) -> ScoreBreakdown {
        ScoreBreakdown {
            tag: tag_score(event, &prepared.interests),
            text: prepared
                .query
                .as_deref()
                .map_or(0.0, |query| text_score(event, query)),
            recency: self.recency_score(event, now),
        }
    }

    fn recency_score(&self, event: &Event, now: DateTime<Utc>) -> f64 {
        let Some(starts_at) = event.starts_at() else {
            return 0.0;
        };

        let mut days = days_until(starts_at, now);
        if self.recency_mode == RecencyMode::ClampPast {
            days = days.max(0);
        }
        (RECENCY_PEAK - days.min(RECENCY_HORIZON_DAYS) as f64).max(0.0) * RECENCY_WEIGHT
    }
}

/// Whole days until `starts_at`, rounding partial days up.
fn days_until(starts_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (starts_at - now).num_milliseconds() as f64;
    (millis / MILLIS_PER_DAY).ceil() as i64
}

fn tag_score(event: &Event, interests: &[String]) -> f64 {
    if interests.is_empty() || event.tags.is_empty() {
        return 0.0;
    }
    let tags: Vec<String> = event.tags.iter().map(|t| t.to_lowercase()).collect();
    let matching = interests.iter().filter(|interest| tags.contains(interest)).count();
    matching as f64 * TAG_WEIGHT
}

fn text_score(event: &Event, query: &str) -> f64 {
    let mut score = 0.0;
    if event.title.to_lowercase().contains(query) {
        score += TITLE_WEIGHT;
    }
    if event.description.to_lowercase().contains(query) {
        score += DESCRIPTION_WEIGHT;
    }
    if event.venue.to_lowercase().contains(query) {
        score += VENUE_WEIGHT;
    }
    score
}

// =============================================================================
// Entry points
// =============================================================================

/// Filter by category, then score and rank with the default scorer.
///
/// `events` is never modified; the result holds copies in relevance order.
pub fn score_and_rank(events: &[Event], request: &ScoreRequest, now: DateTime<Utc>) -> Vec<Event> {
    score_and_rank_with(&Scorer::default(), events, request, now)
}

/// [`score_and_rank`] with an explicit scorer configuration.
pub fn score_and_rank_with(
    scorer: &Scorer,
    events: &[Event],
    request: &ScoreRequest,
    now: DateTime<Utc>,
) -> Vec<Event> {
    let candidates = FilterPipeline::recommendations().apply(events, request);
    scorer.rank(candidates, request, now)
}
