//! Demo catalogue used to populate an empty database.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::types::Event;

/// Length of generated event ids
pub const EVENT_ID_LEN: usize = 10;

/// (title, category, days from now, venue, tags)
const DEMO_EVENTS: &[(&str, &str, i64, &str, &[&str])] = &[
    ("AI for Product Managers", "Seminar", 2, "Auditorium A", &["AI", "Product", "ML"]),
    ("React Advanced Workshop", "Workshop", 5, "Lab 2", &["React", "Frontend"]),
    ("Startup Networking Night", "Networking", 6, "Cafe Commons", &["Networking", "Founders"]),
    ("Design Systems 101", "Seminar", 10, "Hall B", &["Design", "UX"]),
    ("Cloud & DevOps Bootcamp", "Workshop", 14, "Lab 1", &["DevOps", "Cloud"]),
    ("Music Fest: Indie Beats", "Fest", 20, "Open Arena", &["Music", "Fest"]),
];

/// Build the demo events relative to `now`.
///
/// Each event starts at 18:30 UTC on its day and gets a fresh random id.
pub fn demo_events(now: DateTime<Utc>) -> Vec<Event> {
    DEMO_EVENTS
        .iter()
        .map(|(title, category, days, venue, tags)| Event {
            id: crate::store::generate_id(EVENT_ID_LEN),
            title: title.to_string(),
            description: format!("{title}: join us for hands-on sessions, Q&A, and networking."),
            venue: venue.to_string(),
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            date: evening_of(now, *days),
            ..Default::default()
        })
        .collect()
}

fn evening_of(now: DateTime<Utc>, days_from_now: i64) -> String {
    let day = (now + Duration::days(days_from_now)).date_naive();
    day.and_hms_opt(18, 30, 0)
        .map(|naive| naive.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_demo_events_shape() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let events = demo_events(now);

        assert_eq!(events.len(), 6);
        assert_eq!(events[0].title, "AI for Product Managers");
        assert_eq!(events[0].date, "2025-03-03T18:30:00.000Z");
        assert!(events.iter().all(|e| e.id.len() == EVENT_ID_LEN));
        assert!(events.iter().all(|e| e.starts_at().is_some()));
    }
}
