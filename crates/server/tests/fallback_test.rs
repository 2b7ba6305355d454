//! Remote ranking through the orchestrator, against a mock ranking service
//! on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use event_store::{Database, Event, EventStore};
use pipeline::{ScoreRequest, Scorer};
use serde_json::{Value, json};
use server::{RecommendationOrchestrator, build_ranker};
use tokio::net::TcpListener;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn catalog() -> Vec<Event> {
    let date = |days: i64| {
        (now() + chrono::Duration::days(days)).to_rfc3339_opts(SecondsFormat::Millis, true)
    };
    vec![
        Event {
            id: "ai".to_string(),
            title: "AI Workshop".to_string(),
            category: "Workshop".to_string(),
            tags: vec!["ai".to_string()],
            date: date(1),
            ..Default::default()
        },
        Event {
            id: "cooking".to_string(),
            title: "Cooking Class".to_string(),
            category: "Class".to_string(),
            tags: vec!["food".to_string()],
            date: date(1),
            ..Default::default()
        },
        Event {
            id: "seminar".to_string(),
            title: "Cloud Seminar".to_string(),
            category: "Seminar".to_string(),
            tags: vec!["cloud".to_string()],
            date: date(4),
            ..Default::default()
        },
    ]
}

async fn start_mock_service(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock ML service");
    let addr = listener.local_addr().expect("Failed to get local address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Mock ML service failed");
    });

    format!("http://{addr}/recommend")
}

fn orchestrator(ml_url: Option<&str>, timeout: Duration) -> RecommendationOrchestrator {
    let store = Arc::new(EventStore::with_database(
        std::env::temp_dir().join("evently-fallback-unused.json"),
        Database::with_events(catalog()),
    ));
    let ranker = build_ranker(ml_url, timeout, Scorer::default()).unwrap();
    RecommendationOrchestrator::new(store, ranker)
}

async fn recommend(orchestrator: &RecommendationOrchestrator, request: ScoreRequest) -> Vec<String> {
    orchestrator
        .get_recommendations_at(&request, now())
        .await
        .unwrap()
        .into_iter()
        .map(|event| event.id)
        .collect()
}

/// Echoes the ids of the received candidates in reverse order.
fn reversing_service() -> Router {
    Router::new().route(
        "/recommend",
        post(|Json(body): Json<Value>| async move {
            let mut ids: Vec<Value> = body["events"]
                .as_array()
                .map(|events| events.iter().map(|e| e["id"].clone()).collect())
                .unwrap_or_default();
            ids.reverse();
            Json(Value::Array(ids))
        }),
    )
}

#[tokio::test]
async fn test_remote_ranking_is_used() {
    let url = start_mock_service(reversing_service()).await;
    let orchestrator = orchestrator(Some(&url), Duration::from_secs(2));

    let ids = recommend(&orchestrator, ScoreRequest::new()).await;
    assert_eq!(ids, vec!["seminar", "cooking", "ai"]);
}

#[tokio::test]
async fn test_remote_sees_only_category_candidates() {
    let url = start_mock_service(reversing_service()).await;
    let orchestrator = orchestrator(Some(&url), Duration::from_secs(2));

    let ids = recommend(&orchestrator, ScoreRequest::new().with_category("class")).await;
    assert_eq!(ids, vec!["cooking"]);
}

#[tokio::test]
async fn test_remote_event_objects_truncated() {
    let router = Router::new().route(
        "/recommend",
        post(|| async {
            Json(json!([
                {"id": "x", "title": "Remote One"},
                {"id": "y", "title": "Remote Two"},
            ]))
        }),
    );
    let url = start_mock_service(router).await;
    let orchestrator = orchestrator(Some(&url), Duration::from_secs(2));

    let ids = recommend(&orchestrator, ScoreRequest::new().with_limit(1)).await;
    assert_eq!(ids, vec!["x"]);
}

#[tokio::test]
async fn test_remote_error_falls_back_to_local() {
    let router = Router::new().route(
        "/recommend",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let url = start_mock_service(router).await;
    let orchestrator = orchestrator(Some(&url), Duration::from_secs(2));

    let ids = recommend(&orchestrator, ScoreRequest::new().with_interests(["ai"])).await;
    assert_eq!(ids, vec!["ai", "cooking", "seminar"]);
}

#[tokio::test]
async fn test_remote_non_array_falls_back_to_local() {
    let router = Router::new().route(
        "/recommend",
        post(|| async { Json(json!({"results": ["seminar"]})) }),
    );
    let url = start_mock_service(router).await;
    let orchestrator = orchestrator(Some(&url), Duration::from_secs(2));

    let ids = recommend(&orchestrator, ScoreRequest::new().with_interests(["food"])).await;
    assert_eq!(ids, vec!["cooking", "ai", "seminar"]);
}

#[tokio::test]
async fn test_slow_remote_falls_back_to_local() {
    let router = Router::new().route(
        "/recommend",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!(["seminar"]))
        }),
    );
    let url = start_mock_service(router).await;
    let orchestrator = orchestrator(Some(&url), Duration::from_millis(100));

    let ids = recommend(&orchestrator, ScoreRequest::new().with_interests(["ai"]).with_limit(1)).await;
    assert_eq!(ids, vec!["ai"]);
}

#[tokio::test]
async fn test_unreachable_remote_falls_back_to_local() {
    // Reserve a port, then free it so nothing is listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{addr}/recommend");
    let orchestrator = orchestrator(Some(&url), Duration::from_secs(2));

    let ids = recommend(&orchestrator, ScoreRequest::new().with_interests(["ai"])).await;
    assert_eq!(ids, vec!["ai", "cooking", "seminar"]);
}
