use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wall-clock format used in SMS bodies and in the gateway's `at` field.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive timestamp layouts accepted for an event's `start`, tried in order.
const NAIVE_START_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// A calendar-derived event considered for notification.
///
/// Immutable once decoded; lives for a single processing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: String,
    /// Lookup key of the owning recipient (the calendar owner's email).
    pub subject: String,
    pub title: String,
    pub location: Option<String>,
    /// Start time as wall-clock in the event's own timezone.
    pub start: NaiveDateTime,
}

/// An event exactly as the source API serialises it.
///
/// Every field is optional here so that one bad record can be rejected on its
/// own instead of failing the whole batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    pub id: Option<String>,
    pub subject: Option<String>,
    pub user_email: Option<String>,
    pub title: Option<String>,
    pub start: Option<String>,
    pub location: Option<String>,
}

/// Why a single raw event could not become an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventDecodeError {
    #[error("not an event object: {0}")]
    Shape(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unparseable start timestamp `{0}`")]
    InvalidStart(String),
}

impl TryFrom<RawEvent> for Event {
    type Error = EventDecodeError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let id = non_empty(raw.id).ok_or(EventDecodeError::MissingField("id"))?;
        let subject = non_empty(raw.subject)
            .or_else(|| non_empty(raw.user_email))
            .ok_or(EventDecodeError::MissingField("user_email"))?;
        let title = non_empty(raw.title).ok_or(EventDecodeError::MissingField("title"))?;
        let start_raw = non_empty(raw.start).ok_or(EventDecodeError::MissingField("start"))?;
        let start = parse_start(&start_raw).ok_or(EventDecodeError::InvalidStart(start_raw))?;

        Ok(Event {
            id,
            subject,
            title,
            location: non_empty(raw.location),
            start,
        })
    }
}

impl Event {
    /// Decode one element of the source's `events` array.
    pub fn from_json(value: serde_json::Value) -> Result<Self, EventDecodeError> {
        let raw: RawEvent =
            serde_json::from_value(value).map_err(|e| EventDecodeError::Shape(e.to_string()))?;
        Event::try_from(raw)
    }
}

/// Parse an event start into a fixed-precision wall-clock instant.
///
/// RFC 3339 timestamps keep the wall-clock of their own offset, naive
/// timestamps are taken as-is, and all-day dates map to midnight.
pub fn parse_start(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_local());
    }

    for format in NAIVE_START_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A deliverable contact resolved from the recipient directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Lookup key, matches [`Event::subject`].
    pub key: String,
    /// Phone number in canonical form (see [`canonical_phone`]).
    pub phone: String,
}

impl Recipient {
    pub fn new(key: impl Into<String>, phone: &str) -> Self {
        Self {
            key: key.into(),
            phone: canonical_phone(phone),
        }
    }
}

/// Strip formatting characters from a phone number and normalise an
/// international `00` prefix to `+`.
pub fn canonical_phone(raw: &str) -> String {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '.' | '-' | '(' | ')'))
        .collect();

    match digits.strip_prefix("00") {
        Some(rest) => format!("+{rest}"),
        None => digits,
    }
}

/// Acknowledgment returned by the SMS gateway for an accepted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub status: u16,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_parse_start_naive() {
        assert_eq!(
            parse_start("2024-12-12T10:00:00"),
            Some(ymd_hms(2024, 12, 12, 10, 0, 0))
        );
        assert_eq!(
            parse_start("2024-12-12 10:00:00"),
            Some(ymd_hms(2024, 12, 12, 10, 0, 0))
        );
    }

    #[test]
    fn test_parse_start_keeps_offset_wall_clock() {
        assert_eq!(
            parse_start("2024-12-12T10:00:00+01:00"),
            Some(ymd_hms(2024, 12, 12, 10, 0, 0))
        );
        assert_eq!(
            parse_start("2024-12-12T10:00:00Z"),
            Some(ymd_hms(2024, 12, 12, 10, 0, 0))
        );
    }

    #[test]
    fn test_parse_start_fractional_seconds_and_all_day() {
        let parsed = parse_start("2024-12-12T10:00:00.250").unwrap();
        assert_eq!(parsed.format(DISPLAY_FORMAT).to_string(), "2024-12-12 10:00:00");

        assert_eq!(parse_start("2024-12-12"), Some(ymd_hms(2024, 12, 12, 0, 0, 0)));
    }

    #[test]
    fn test_parse_start_rejects_garbage() {
        assert_eq!(parse_start("tomorrow"), None);
        assert_eq!(parse_start(""), None);
        assert_eq!(parse_start("2024-13-40T10:00:00"), None);
    }

    #[test]
    fn test_event_from_json_user_email() {
        let event = Event::from_json(json!({
            "id": "e1",
            "user_email": "a@x.com",
            "title": "Exam",
            "start": "2024-12-12T10:00:00",
            "location": "Room 5"
        }))
        .unwrap();

        assert_eq!(event.id, "e1");
        assert_eq!(event.subject, "a@x.com");
        assert_eq!(event.title, "Exam");
        assert_eq!(event.location.as_deref(), Some("Room 5"));
        assert_eq!(event.start, ymd_hms(2024, 12, 12, 10, 0, 0));
    }

    #[test]
    fn test_event_from_json_subject_and_null_location() {
        let event = Event::from_json(json!({
            "id": "e2",
            "subject": "b@x.com",
            "title": "Deadline",
            "start": "2024-12-13",
            "location": null
        }))
        .unwrap();

        assert_eq!(event.subject, "b@x.com");
        assert_eq!(event.location, None);
    }

    #[test]
    fn test_event_from_json_missing_fields() {
        let err = Event::from_json(json!({
            "id": "e3",
            "title": "Demo",
            "start": "2024-12-12T10:00:00"
        }))
        .unwrap_err();
        assert_eq!(err, EventDecodeError::MissingField("user_email"));

        let err = Event::from_json(json!({
            "id": "e3",
            "user_email": "a@x.com",
            "title": "Demo",
            "start": "soon"
        }))
        .unwrap_err();
        assert_eq!(err, EventDecodeError::InvalidStart("soon".to_string()));

        assert!(matches!(
            Event::from_json(json!(42)),
            Err(EventDecodeError::Shape(_))
        ));
    }

    #[test]
    fn test_canonical_phone() {
        assert_eq!(canonical_phone("+1 555-010 (22)"), "+155501022");
        assert_eq!(canonical_phone("0033 6.12.34.56.78"), "+33612345678");
        assert_eq!(canonical_phone("0612345678"), "0612345678");
        assert_eq!(Recipient::new("a@x.com", " +1 555 0100 ").phone, "+15550100");
    }
}
