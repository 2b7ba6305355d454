//! # Recommendation Orchestrator
//!
//! This module coordinates one recommendation request:
//! 1. Snapshot the event catalogue from the store
//! 2. Apply the filter pipeline (category)
//! 3. Hand the candidates to the configured ranker
//! 4. Return the ordered events

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use event_store::{Event, EventStore};
use pipeline::{FilterPipeline, ScoreRequest};

use crate::ranker::{RankInput, Ranker};

/// Main orchestrator that coordinates the recommendation pipeline
#[derive(Clone)]
pub struct RecommendationOrchestrator {
    store: Arc<EventStore>,
    filter_pipeline: Arc<FilterPipeline>,
    ranker: Arc<dyn Ranker>,
}

impl RecommendationOrchestrator {
    /// Create a new orchestrator over `store`, ranking with `ranker`.
    pub fn new(store: Arc<EventStore>, ranker: Arc<dyn Ranker>) -> Self {
        Self {
            store,
            filter_pipeline: Arc::new(FilterPipeline::recommendations()),
            ranker,
        }
    }

    pub fn ranker_name(&self) -> &str {
        self.ranker.name()
    }

    /// Main entry point: recommendations as of the current wall-clock time.
    pub async fn get_recommendations(&self, request: &ScoreRequest) -> Result<Vec<Event>> {
        self.get_recommendations_at(request, Utc::now()).await
    }

    /// Recommendations as of `now`.
    pub async fn get_recommendations_at(
        &self,
        request: &ScoreRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let start_time = Instant::now();

        let catalog = self.store.list_events().await;
        let candidates: Vec<Event> = self
            .filter_pipeline
            .apply(&catalog, request)
            .into_iter()
            .cloned()
            .collect();
        info!(
            "Filtered catalogue: {} of {} events in category '{}'",
            candidates.len(),
            catalog.len(),
            request.category
        );

        let recommendations = self
            .ranker
            .rank(RankInput {
                candidates: &candidates,
                catalog: &catalog,
                request,
                now,
            })
            .await
            .context("Failed to rank candidates")?;

        info!(
            "Returned {} recommendations via {} ranker in {:.2?}",
            recommendations.len(),
            self.ranker.name(),
            start_time.elapsed()
        );
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranker::LocalRanker;
    use chrono::{Duration, SecondsFormat, TimeZone};
    use event_store::Database;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn build_test_store() -> Arc<EventStore> {
        let date = |days: i64| (now() + Duration::days(days)).to_rfc3339_opts(SecondsFormat::Millis, true);
        let events = vec![
            Event {
                id: "seminar".to_string(),
                title: "AI Seminar".to_string(),
                category: "Seminar".to_string(),
                tags: vec!["ai".to_string(), "ml".to_string()],
                date: date(1),
                ..Default::default()
            },
            Event {
                id: "workshop".to_string(),
                title: "Node Workshop".to_string(),
                category: "Workshop".to_string(),
                tags: vec!["node".to_string()],
                date: date(3),
                ..Default::default()
            },
            Event {
                id: "fest".to_string(),
                title: "Frontend Fest".to_string(),
                category: "Fest".to_string(),
                tags: vec!["frontend".to_string()],
                date: date(2),
                ..Default::default()
            },
        ];
        Arc::new(EventStore::with_database(
            std::env::temp_dir().join("evently-orchestrator-unused.json"),
            Database::with_events(events),
        ))
    }

    fn build_test_orchestrator() -> RecommendationOrchestrator {
        RecommendationOrchestrator::new(build_test_store(), Arc::new(LocalRanker::default()))
    }

    #[tokio::test]
    async fn test_recommendations_ranked_by_interest() {
        let orchestrator = build_test_orchestrator();
        let request = ScoreRequest::new().with_interests(["node"]);

        let recs = orchestrator.get_recommendations_at(&request, now()).await.unwrap();
        let ids: Vec<&str> = recs.iter().map(|e| e.id.as_str()).collect();
        // node tag (+3 + 1.2) beats the sooner events (2.4 and 1.8)
        assert_eq!(ids, vec!["workshop", "seminar", "fest"]);
    }

    #[tokio::test]
    async fn test_recommendations_respect_category() {
        let orchestrator = build_test_orchestrator();
        let request = ScoreRequest::new().with_interests(["node"]).with_category("seminar");

        let recs = orchestrator.get_recommendations_at(&request, now()).await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id, "seminar");
    }

    #[tokio::test]
    async fn test_recommendations_limit() {
        let orchestrator = build_test_orchestrator();

        let recs = orchestrator
            .get_recommendations_at(&ScoreRequest::new().with_limit(2), now())
            .await
            .unwrap();
        assert_eq!(recs.len(), 2);

        let recs = orchestrator
            .get_recommendations_at(&ScoreRequest::new().with_limit(0), now())
            .await
            .unwrap();
        assert!(recs.is_empty());
    }

    #[test]
    fn test_ranker_name() {
        assert_eq!(build_test_orchestrator().ranker_name(), "local");
    }
}
