//! Core domain types for events and registrations.
//!
//! Field names follow the JSON document the backend has always written
//! (`eventId`, `createdAt`, ...), so a database file produced by earlier
//! deployments loads unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Fields of a stored object that this crate does not model.
///
/// They are kept verbatim and written back on the next save.
pub type ExtraFields = Map<String, Value>;

// =============================================================================
// Type Aliases
// =============================================================================

/// Opaque identifier of an event
pub type EventId = String;

/// Opaque identifier of a registration
pub type RegistrationId = String;

// =============================================================================
// Events
// =============================================================================

/// An event listed by the backend.
///
/// Every field except `id` may be missing from the stored document; missing
/// text fields read as the empty string and missing tags as an empty list.
/// Explicit `null`s are treated the same as missing fields. Empty fields are
/// left out when writing, and unknown fields (`image`, `capacity`, ...) are
/// carried through in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub id: EventId,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub venue: String,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Start time as written by whoever created the event. Usually ISO 8601,
    /// but nothing guarantees it parses; see [`parse_event_date`].
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub date: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Event {
    /// Parsed start time, or `None` when `date` is not a recognised format.
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        parse_event_date(&self.date)
    }
}

/// Parse an event date.
///
/// Accepted forms, tried in order:
/// 1. RFC 3339 / ISO 8601 with an offset (`2025-03-01T18:30:00.000Z`)
/// 2. ISO 8601 without an offset, read as UTC (`2025-03-01T18:30:00`)
/// 3. A bare date, read as UTC midnight (`2025-03-01`)
/// 4. RFC 2822 (`Sat, 01 Mar 2025 18:30:00 +0000`)
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// =============================================================================
// Registrations
// =============================================================================

/// A stored registration of one attendee for one event.
///
/// Decoding is lenient so that one hand-edited entry cannot make the whole
/// file unreadable: missing or `null` fields read as empty, and `createdAt`
/// is kept as written (see [`Registration::created_at`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Registration {
    pub id: RegistrationId,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub event_id: EventId,
    #[serde(deserialize_with = "null_as_default")]
    pub interests: Vec<String>,
    /// ISO 8601 timestamp, millisecond precision, `Z` suffix when written here
    #[serde(rename = "createdAt", deserialize_with = "null_as_default")]
    pub created_at_raw: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Registration {
    /// Parsed creation time, or `None` when the stored value is not a date.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_event_date(&self.created_at_raw)
    }
}

/// Registration payload as submitted by a client, before validation.
///
/// Missing fields decode as empty so that [`NewRegistration::validate`] can
/// report them alongside any other problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewRegistration {
    pub name: String,
    pub email: String,
    /// `None` when the field is absent; an empty id is accepted here and
    /// rejected by the store as an unknown event
    pub event_id: Option<EventId>,
    pub interests: Vec<String>,
}

impl NewRegistration {
    /// Check the payload and return every rule it breaks.
    ///
    /// An empty list means the registration is acceptable. Whether the
    /// referenced event exists is checked by the store, not here.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.name.chars().count() < 2 {
            issues.push("name: must contain at least 2 characters".to_string());
        }
        if !is_valid_email(&self.email) {
            issues.push("email: invalid email address".to_string());
        }
        if self.event_id.is_none() {
            issues.push("eventId: required".to_string());
        }

        issues
    }
}

/// Minimal structural email check: `local@domain.tld`, no whitespace,
/// no empty domain labels.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

// =============================================================================
// Database document
// =============================================================================

/// The whole JSON document persisted on disk.
///
/// Top-level collections other than `events` and `registrations` are kept in
/// `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub events: Vec<Event>,
    pub registrations: Vec<Registration>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Aggregate counts for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_events: usize,
    pub total_regs: usize,
    /// Registrations per known event. Events with no registrations are
    /// present with a count of zero.
    pub by_event: BTreeMap<EventId, usize>,
}

impl Database {
    /// A database holding `events` and nothing else.
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn find_event(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn stats(&self) -> Stats {
        let by_event = self
            .events
            .iter()
            .map(|event| {
                let count = self
                    .registrations
                    .iter()
                    .filter(|reg| reg.event_id == event.id)
                    .count();
                (event.id.clone(), count)
            })
            .collect();

        Stats {
            total_events: self.events.len(),
            total_regs: self.registrations.len(),
            by_event,
        }
    }
}
