//! Tests against a mock recommendation service on an ephemeral port.

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use event_store::Event;
use ml_client::{MLClientError, MLScorerClient, RecommendPayload, RemoteRanking};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Serve `router` on 127.0.0.1 and return its base URL.
async fn start_mock_service(router: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock ML service");
    let addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Mock ML service failed");
    });

    (format!("http://{addr}/recommend"), handle)
}

fn events() -> Vec<Event> {
    vec![
        Event {
            id: "a".to_string(),
            title: "AI Seminar".to_string(),
            ..Default::default()
        },
        Event {
            id: "b".to_string(),
            title: "Node Workshop".to_string(),
            ..Default::default()
        },
    ]
}

#[tokio::test]
async fn test_recommend_reverses_ids() {
    // Echo the candidate ids back in reverse order
    let router = Router::new().route(
        "/recommend",
        post(|Json(body): Json<Value>| async move {
            let mut ids: Vec<Value> = body["events"]
                .as_array()
                .map(|events| events.iter().map(|e| e["id"].clone()).collect())
                .unwrap_or_default();
            ids.reverse();
            Json(Value::Array(ids))
        }),
    );
    let (url, handle) = start_mock_service(router).await;

    let client = MLScorerClient::new(url, Duration::from_secs(2)).unwrap();
    let interests = vec!["ai".to_string()];
    let catalog = events();
    let payload = RecommendPayload {
        interests: &interests,
        query: "",
        limit: 9,
        events: &catalog,
    };

    let ranking = client.recommend(&payload).await.unwrap();
    assert_eq!(
        ranking,
        RemoteRanking::Ids(vec!["b".to_string(), "a".to_string()])
    );

    handle.abort();
}

#[tokio::test]
async fn test_recommend_payload_shape() {
    // Answer with the payload's own fields so the test can inspect them
    let router = Router::new().route(
        "/recommend",
        post(|Json(body): Json<Value>| async move {
            Json(json!([{
                "id": "echo",
                "title": body["query"],
                "tags": body["interests"],
                "description": body["limit"].to_string(),
            }]))
        }),
    );
    let (url, handle) = start_mock_service(router).await;

    let client = MLScorerClient::new(url, Duration::from_secs(2)).unwrap();
    let interests = vec!["ai".to_string(), "ml".to_string()];
    let payload = RecommendPayload {
        interests: &interests,
        query: "seminar",
        limit: 4,
        events: &[],
    };

    match client.recommend(&payload).await.unwrap() {
        RemoteRanking::Events(events) => {
            assert_eq!(events[0].title, "seminar");
            assert_eq!(events[0].tags, interests);
            assert_eq!(events[0].description, "4");
        }
        other => panic!("expected events, got {other:?}"),
    }

    handle.abort();
}

#[tokio::test]
async fn test_recommend_server_error() {
    let router = Router::new().route(
        "/recommend",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let (url, handle) = start_mock_service(router).await;

    let client = MLScorerClient::new(url, Duration::from_secs(2)).unwrap();
    let payload = RecommendPayload {
        interests: &[],
        query: "",
        limit: 9,
        events: &[],
    };

    let result = client.recommend(&payload).await;
    assert!(matches!(result, Err(MLClientError::ScoringError(500))));

    handle.abort();
}

#[tokio::test]
async fn test_recommend_timeout() {
    let router = Router::new().route(
        "/recommend",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!([]))
        }),
    );
    let (url, handle) = start_mock_service(router).await;

    let client = MLScorerClient::new(url, Duration::from_millis(100)).unwrap();
    let payload = RecommendPayload {
        interests: &[],
        query: "",
        limit: 9,
        events: &[],
    };

    let result = client.recommend(&payload).await;
    assert!(matches!(result, Err(MLClientError::ConnectionError(_))));

    handle.abort();
}

#[tokio::test]
async fn test_recommend_unreachable() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        MLScorerClient::new(format!("http://{addr}/recommend"), Duration::from_secs(1)).unwrap();
    let payload = RecommendPayload {
        interests: &[],
        query: "",
        limit: 9,
        events: &[],
    };

    assert!(client.recommend(&payload).await.is_err());
}
