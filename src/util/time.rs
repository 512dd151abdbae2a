use chrono::{DateTime, Local, Utc};

/// Current local time as an ISO-8601 string, used for `created` fields.
pub fn iso_now() -> String {
    Local::now().to_rfc3339()
}

/// Compact UTC timestamp suitable for file names and ids, e.g. `20240131T235959123456Z`.
pub fn utc_stamp() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%6fZ").to_string()
}

/// Parse an ISO-8601 timestamp; `None` for anything unparseable.
pub fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_now_parses_back() {
        assert!(parse_iso(&iso_now()).is_some());
    }

    #[test]
    fn test_utc_stamp_is_filename_safe() {
        let stamp = utc_stamp();
        assert!(stamp.ends_with('Z'));
        assert!(stamp.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
