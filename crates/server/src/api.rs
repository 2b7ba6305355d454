//! HTTP routes.
//!
//! All endpoints live under `/api` and speak JSON. Unknown paths answer
//! `404 {"error":"Route not found"}`.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderValue, Method, header, header::InvalidHeaderValue},
    response::IntoResponse,
    routing::{get, post},
};
use event_store::{Event, EventId, NewRegistration, Registration, RegistrationId, Stats};
use pipeline::{ALL_CATEGORIES, DEFAULT_LIMIT, ScoreRequest};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/events", get(list_events_handler))
        .route("/api/events/{id}", get(get_event_handler))
        .route("/api/register", post(register_handler))
        .route("/api/registrations", post(register_handler))
        .route("/api/admin/registrations", get(admin_registrations_handler))
        .route("/api/admin/participants/{event_id}", get(participants_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/recommendations", post(recommendations_handler))
        .fallback(not_found_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy allowing a single browser origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    Ok(CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

pub async fn list_events_handler(State(state): State<AppState>) -> Json<Vec<Event>> {
    Json(state.store.list_events().await)
}

pub async fn get_event_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    state
        .store
        .get_event(&id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("Not found"))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub registration_id: RegistrationId,
    pub event: Event,
}

pub async fn register_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RegisterResponse>, ApiError> {
    let payload: NewRegistration = parse_body(&body)?;
    let (registration, event) = state.store.register(payload, chrono::Utc::now()).await?;
    info!(
        "Registered {} for event {}",
        registration.id, registration.event_id
    );

    Ok(Json(RegisterResponse {
        registration_id: registration.id,
        event,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationQuery {
    pub event_id: Option<EventId>,
}

pub async fn admin_registrations_handler(
    State(state): State<AppState>,
    Query(query): Query<RegistrationQuery>,
) -> Json<Vec<Registration>> {
    // `?eventId=` with no value lists everything
    let event_id = query.event_id.as_deref().filter(|id| !id.is_empty());
    Json(state.store.registrations(event_id).await)
}

pub async fn participants_handler(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
) -> Json<Vec<Registration>> {
    Json(state.store.registrations(Some(&event_id)).await)
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<Stats> {
    Json(state.store.stats().await)
}

/// Body of `POST /api/recommendations`. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendationBody {
    pub interests: Vec<String>,
    pub query: String,
    pub limit: i64,
    pub category: String,
}

impl Default for RecommendationBody {
    fn default() -> Self {
        Self {
            interests: Vec::new(),
            query: String::new(),
            limit: DEFAULT_LIMIT as i64,
            category: ALL_CATEGORIES.to_string(),
        }
    }
}

impl From<RecommendationBody> for ScoreRequest {
    fn from(body: RecommendationBody) -> Self {
        ScoreRequest {
            interests: body.interests,
            query: body.query,
            category: body.category,
            // Negative limits select nothing
            limit: usize::try_from(body.limit).unwrap_or(0),
        }
    }
}

pub async fn recommendations_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<Event>>, ApiError> {
    let body: RecommendationBody = if body.iter().all(u8::is_ascii_whitespace) {
        RecommendationBody::default()
    } else {
        parse_body(&body)?
    };
    let request = ScoreRequest::from(body);

    let events = state
        .orchestrator
        .get_recommendations(&request)
        .await
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    Ok(Json(events))
}

pub async fn not_found_handler() -> impl IntoResponse {
    ApiError::NotFound("Route not found")
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidPayload(vec![format!("body: {e}")]))
}
