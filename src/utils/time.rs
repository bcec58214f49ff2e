use chrono::{DateTime, NaiveDateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn from_rfc3339(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses the timestamp shapes the backend and the form inputs produce.
///
/// Offset-less values (`2024-01-05T10:30` from a datetime-local input) are
/// taken as UTC. Blank strings and placeholders such as `"No Time"` yield
/// `None`.
pub fn parse_portal_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = from_rfc3339(raw) {
        return Some(dt);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// `"{m}m {ss}s"`, as shown while an account is locked.
pub fn format_lockout(seconds: u64) -> String {
    format!("{}m {:02}s", seconds / 60, seconds % 60)
}

/// `"m:ss"`, as shown next to a pending verification code.
pub fn format_countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_and_form_values() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).unwrap();
        assert_eq!(parse_portal_datetime("2024-01-05T10:30:00Z"), Some(expected));
        assert_eq!(parse_portal_datetime("2024-01-05T16:00:00+05:30"), Some(expected));
        assert_eq!(parse_portal_datetime("2024-01-05T10:30"), Some(expected));
        assert_eq!(parse_portal_datetime("2024-01-05 10:30:00"), Some(expected));
        assert_eq!(parse_portal_datetime("No Time"), None);
        assert_eq!(parse_portal_datetime("  "), None);
    }

    #[test]
    fn formats_timers() {
        assert_eq!(format_lockout(300), "5m 00s");
        assert_eq!(format_lockout(61), "1m 01s");
        assert_eq!(format_countdown(299), "4:59");
        assert_eq!(format_countdown(0), "0:00");
    }
}
