use chrono::{DateTime, Local, TimeZone, Utc};

const TWELVE_HOUR_FORMAT: &str = "%A, %d %B %Y %I:%M:%S %p";
const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

/// Parse an RFC 3339 timestamp as returned by the server.
pub fn parse_server_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format as "Monday, 02 January 2006 03:04:05 PM".
pub fn twelve_hour<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(TWELVE_HOUR_FORMAT).to_string()
}

/// Render a server timestamp in local 12-hour form, falling back to the raw
/// string when it cannot be parsed.
pub fn local_twelve_hour(value: &str) -> String {
    match parse_server_time(value) {
        Some(utc) => twelve_hour(&utc.with_timezone(&Local)),
        None => value.to_string(),
    }
}

pub fn rfc1123<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(RFC1123_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twelve_hour_afternoon() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 15, 4, 5).unwrap();
        assert_eq!(twelve_hour(&t), "Tuesday, 05 March 2024 03:04:05 PM");
    }

    #[test]
    fn test_twelve_hour_midnight() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 9).unwrap();
        assert_eq!(twelve_hour(&t), "Tuesday, 05 March 2024 12:00:09 AM");
    }

    #[test]
    fn test_rfc1123_utc() {
        let t = parse_server_time("2024-03-05T15:04:05Z").unwrap();
        assert_eq!(rfc1123(&t), "Tue, 05 Mar 2024 15:04:05 UTC");
    }

    #[test]
    fn test_local_twelve_hour_unparseable_passthrough() {
        assert_eq!(local_twelve_hour("not a time"), "not a time");
    }
}
