//! Client for the external recommendation service.
//!
//! The service is an optional HTTP endpoint that receives the candidate
//! events together with the user's interests and query, and answers with
//! its own ordering. This crate handles:
//! - Building the JSON request body
//! - Sending it with a bounded timeout
//! - Decoding both response shapes the service may use (event ids or
//!   full event objects)
//! - Mapping everything that can go wrong into `MLClientError`

use std::collections::HashMap;
use std::time::Duration;

use event_store::Event;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors that can occur when interacting with the ML service
#[derive(Error, Debug)]
pub enum MLClientError {
    #[error("Failed to connect to ML service: {0}")]
    ConnectionError(String),

    #[error("ML service returned status {0}")]
    ScoringError(u16),

    #[error("Invalid response from ML service: {0}")]
    InvalidResponse(String),
}

/// Request body sent to the service.
#[derive(Debug, Serialize)]
pub struct RecommendPayload<'a> {
    pub interests: &'a [String],
    pub query: &'a str,
    pub limit: usize,
    /// Candidates, already narrowed to the requested category
    pub events: &'a [Event],
}

/// The service's answer, in whichever shape it chose.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRanking {
    /// Ordered event ids, to be resolved against the catalogue
    Ids(Vec<String>),
    /// Ordered event objects
    Events(Vec<Event>),
}

impl RemoteRanking {
    /// Turn the answer into at most `limit` events.
    ///
    /// Ids are looked up in `catalog`; ids that match nothing are dropped.
    pub fn resolve(self, catalog: &[Event], limit: usize) -> Vec<Event> {
        match self {
            RemoteRanking::Ids(ids) => {
                let by_id: HashMap<&str, &Event> =
                    catalog.iter().map(|event| (event.id.as_str(), event)).collect();
                ids.iter()
                    .filter_map(|id| by_id.get(id.as_str()).map(|event| (*event).clone()))
                    .take(limit)
                    .collect()
            }
            RemoteRanking::Events(mut events) => {
                events.truncate(limit);
                events
            }
        }
    }
}

/// Decode a response body.
///
/// Only JSON arrays are accepted. An array whose first element is a string
/// is a list of ids (non-string entries are ignored); any other array must
/// decode as a list of events.
pub fn parse_ranking(body: Value) -> Result<RemoteRanking, MLClientError> {
    let Value::Array(items) = body else {
        return Err(MLClientError::InvalidResponse(
            "expected a JSON array".to_string(),
        ));
    };

    if matches!(items.first(), Some(Value::String(_))) {
        let ids = items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(id) => Some(id),
                _ => None,
            })
            .collect();
        return Ok(RemoteRanking::Ids(ids));
    }

    serde_json::from_value(Value::Array(items))
        .map(RemoteRanking::Events)
        .map_err(|e| MLClientError::InvalidResponse(e.to_string()))
}

/// Client for the ML recommendation service.
#[derive(Clone)]
pub struct MLScorerClient {
    client: reqwest::Client,
    service_url: String,
}

impl MLScorerClient {
    /// Build a client for the service at `url`.
    ///
    /// No connection is made here; every call to [`recommend`] is a single
    /// POST bounded by `timeout`.
    ///
    /// [`recommend`]: MLScorerClient::recommend
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MLClientError> {
        let service_url = url.into();
        info!("Using ML service at {}", service_url);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MLClientError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            service_url,
        })
    }

    /// Ask the service to rank `payload.events`.
    pub async fn recommend(
        &self,
        payload: &RecommendPayload<'_>,
    ) -> Result<RemoteRanking, MLClientError> {
        debug!(
            "Requesting ranking of {} candidates (limit {})",
            payload.events.len(),
            payload.limit
        );

        let response = self
            .client
            .post(&self.service_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!("HTTP error while calling ML service: {}", e);
                MLClientError::ConnectionError(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MLClientError::ScoringError(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MLClientError::InvalidResponse(e.to_string()))?;

        parse_ranking(body)
    }

    /// Get the URL of the ML service this client talks to.
    pub fn service_url(&self) -> &str {
        &self.service_url
    }
}
