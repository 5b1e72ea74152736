use chrono::{NaiveDateTime, TimeDelta};

use reminder_common::types::{DISPLAY_FORMAT, Event};

const UNKNOWN_LOCATION: &str = "Unknown location";

/// Render the SMS body for an event.
pub fn compose_message(event: &Event) -> String {
    format!(
        "Reminder: {} at {} on {}",
        event.title,
        event.location.as_deref().unwrap_or(UNKNOWN_LOCATION),
        event.start.format(DISPLAY_FORMAT)
    )
}

/// Time the gateway should release the message: submission time plus the buffer.
pub fn scheduled_send_time(submitted_at: NaiveDateTime, delay: std::time::Duration) -> NaiveDateTime {
    let delay = TimeDelta::from_std(delay).unwrap_or(TimeDelta::zero());
    submitted_at
        .checked_add_signed(delay)
        .unwrap_or(submitted_at)
}

/// Render a scheduled time in the gateway's `at` format.
pub fn format_gateway_time(at: NaiveDateTime) -> String {
    at.format(DISPLAY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn exam(location: Option<&str>) -> Event {
        Event {
            id: "e1".to_string(),
            subject: "a@x.com".to_string(),
            title: "Exam".to_string(),
            location: location.map(str::to_string),
            start: NaiveDate::from_ymd_opt(2024, 12, 12)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_compose_message_with_location() {
        let text = compose_message(&exam(Some("Room 5")));
        assert_eq!(text, "Reminder: Exam at Room 5 on 2024-12-12 10:00:00");
    }

    #[test]
    fn test_compose_message_without_location() {
        let text = compose_message(&exam(None));
        assert_eq!(text, "Reminder: Exam at Unknown location on 2024-12-12 10:00:00");
    }

    #[test]
    fn test_scheduled_send_time_adds_buffer() {
        let submitted = NaiveDate::from_ymd_opt(2024, 12, 31)
            .unwrap()
            .and_hms_opt(23, 58, 30)
            .unwrap();
        let at = scheduled_send_time(submitted, Duration::from_secs(180));
        assert_eq!(format_gateway_time(at), "2025-01-01 00:01:30");
    }
}
