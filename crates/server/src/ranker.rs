//! Interchangeable ranking strategies.
//!
//! - [`LocalRanker`] runs the in-process scorer and never fails
//! - [`RemoteRanker`] delegates to the external recommendation service
//! - [`FallbackRanker`] tries a primary ranker under a timeout and answers
//!   with the local scorer whenever the primary errors or is too slow

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_store::Event;
use ml_client::{MLClientError, MLScorerClient, RecommendPayload};
use pipeline::{ScoreRequest, Scorer};
use tracing::{debug, warn};

/// Everything a ranker needs for one request.
#[derive(Debug, Clone, Copy)]
pub struct RankInput<'a> {
    /// Events that passed the filter pipeline
    pub candidates: &'a [Event],
    /// The full catalogue, for resolving ids returned by a remote service
    pub catalog: &'a [Event],
    pub request: &'a ScoreRequest,
    pub now: DateTime<Utc>,
}

/// A strategy that orders candidates by relevance.
#[async_trait]
pub trait Ranker: Send + Sync {
    /// Returns the name of this ranker (for logging/debugging)
    fn name(&self) -> &str;

    /// Return at most `input.request.limit` events, most relevant first.
    async fn rank(&self, input: RankInput<'_>) -> Result<Vec<Event>>;
}

/// Ranks with the in-process [`Scorer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRanker {
    scorer: Scorer,
}

impl LocalRanker {
    pub fn new(scorer: Scorer) -> Self {
        Self { scorer }
    }

    /// Synchronous form of [`Ranker::rank`]; this ranker cannot fail.
    pub fn rank_now(&self, input: RankInput<'_>) -> Vec<Event> {
        self.scorer.rank(input.candidates, input.request, input.now)
    }
}

#[async_trait]
impl Ranker for LocalRanker {
    fn name(&self) -> &str {
        "local"
    }

    async fn rank(&self, input: RankInput<'_>) -> Result<Vec<Event>> {
        Ok(self.rank_now(input))
    }
}

/// Ranks by asking the external recommendation service.
#[derive(Clone)]
pub struct RemoteRanker {
    client: MLScorerClient,
}

impl RemoteRanker {
    pub fn new(client: MLScorerClient) -> Self {
        Self { client }
    }

    pub fn service_url(&self) -> &str {
        self.client.service_url()
    }
}

#[async_trait]
impl Ranker for RemoteRanker {
    fn name(&self) -> &str {
        "remote"
    }

    async fn rank(&self, input: RankInput<'_>) -> Result<Vec<Event>> {
        let payload = RecommendPayload {
            interests: &input.request.interests,
            query: &input.request.query,
            limit: input.request.limit,
            events: input.candidates,
        };
        let ranking = self.client.recommend(&payload).await?;
        Ok(ranking.resolve(input.catalog, input.request.limit))
    }
}

/// Tries `primary` first, falls back to the local scorer on any failure.
pub struct FallbackRanker {
    primary: Box<dyn Ranker>,
    fallback: LocalRanker,
    timeout: Duration,
}

impl FallbackRanker {
    pub fn new(primary: impl Ranker + 'static, fallback: LocalRanker, timeout: Duration) -> Self {
        Self {
            primary: Box::new(primary),
            fallback,
            timeout,
        }
    }
}

#[async_trait]
impl Ranker for FallbackRanker {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn rank(&self, input: RankInput<'_>) -> Result<Vec<Event>> {
        match tokio::time::timeout(self.timeout, self.primary.rank(input)).await {
            Ok(Ok(events)) => {
                debug!("{} ranker returned {} events", self.primary.name(), events.len());
                return Ok(events);
            }
            Ok(Err(e)) => warn!(
                "{} ranker failed, using local scorer: {:#}",
                self.primary.name(),
                e
            ),
            Err(_) => warn!(
                "{} ranker timed out after {:?}, using local scorer",
                self.primary.name(),
                self.timeout
            ),
        }
        Ok(self.fallback.rank_now(input))
    }
}

/// Build the ranker stack: remote-with-fallback when `ml_url` is set,
/// otherwise local only.
pub fn build_ranker(
    ml_url: Option<&str>,
    timeout: Duration,
    scorer: Scorer,
) -> Result<Arc<dyn Ranker>, MLClientError> {
    let local = LocalRanker::new(scorer);
    match ml_url {
        Some(url) => {
            let client = MLScorerClient::new(url, timeout)?;
            Ok(Arc::new(FallbackRanker::new(
                RemoteRanker::new(client),
                local,
                timeout,
            )))
        }
        None => Ok(Arc::new(local)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FailingRanker;

    #[async_trait]
    impl Ranker for FailingRanker {
        fn name(&self) -> &str {
            "failing"
        }

        async fn rank(&self, _input: RankInput<'_>) -> Result<Vec<Event>> {
            Err(anyhow!("service unavailable"))
        }
    }

    struct SlowRanker;

    #[async_trait]
    impl Ranker for SlowRanker {
        fn name(&self) -> &str {
            "slow"
        }

        async fn rank(&self, input: RankInput<'_>) -> Result<Vec<Event>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(input.candidates.to_vec())
        }
    }

    /// Returns candidates in reverse input order.
    struct ReversingRanker;

    #[async_trait]
    impl Ranker for ReversingRanker {
        fn name(&self) -> &str {
            "reversing"
        }

        async fn rank(&self, input: RankInput<'_>) -> Result<Vec<Event>> {
            Ok(input.candidates.iter().rev().cloned().collect())
        }
    }

    fn events() -> Vec<Event> {
        vec![
            Event {
                id: "plain".to_string(),
                ..Default::default()
            },
            Event {
                id: "tagged".to_string(),
                tags: vec!["ai".to_string()],
                ..Default::default()
            },
        ]
    }

    fn input<'a>(events: &'a [Event], request: &'a ScoreRequest) -> RankInput<'a> {
        RankInput {
            candidates: events,
            catalog: events,
            request,
            now: Utc::now(),
        }
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_local_ranker() {
        let events = events();
        let request = ScoreRequest::new().with_interests(["ai"]);

        let ranked = LocalRanker::default().rank(input(&events, &request)).await.unwrap();
        assert_eq!(ids(&ranked), vec!["tagged", "plain"]);
    }

    #[tokio::test]
    async fn test_fallback_uses_primary_when_it_succeeds() {
        let events = events();
        let request = ScoreRequest::new();
        let ranker = FallbackRanker::new(ReversingRanker, LocalRanker::default(), Duration::from_secs(1));

        let ranked = ranker.rank(input(&events, &request)).await.unwrap();
        assert_eq!(ids(&ranked), vec!["tagged", "plain"]);
    }

    #[tokio::test]
    async fn test_fallback_on_error() {
        let events = events();
        let request = ScoreRequest::new().with_interests(["ai"]);
        let ranker = FallbackRanker::new(FailingRanker, LocalRanker::default(), Duration::from_secs(1));

        let ranked = ranker.rank(input(&events, &request)).await.unwrap();
        assert_eq!(ids(&ranked), vec!["tagged", "plain"]);
    }

    #[tokio::test]
    async fn test_fallback_on_timeout() {
        let events = events();
        let request = ScoreRequest::new().with_interests(["ai"]).with_limit(1);
        let ranker = FallbackRanker::new(SlowRanker, LocalRanker::default(), Duration::from_millis(50));

        let ranked = ranker.rank(input(&events, &request)).await.unwrap();
        assert_eq!(ids(&ranked), vec!["tagged"]);
    }

    #[tokio::test]
    async fn test_build_ranker_without_url_is_local() {
        let ranker = build_ranker(None, Duration::from_secs(1), Scorer::default()).unwrap();
        assert_eq!(ranker.name(), "local");

        let ranker = build_ranker(
            Some("http://127.0.0.1:9/recommend"),
            Duration::from_secs(1),
            Scorer::default(),
        )
        .unwrap();
        assert_eq!(ranker.name(), "fallback");
    }
}
