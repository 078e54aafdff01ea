use chrono::{DateTime, FixedOffset, Utc};

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

const CLOCK_FORMAT: &str = "%I:%M %p";

/// Chat timestamp in India Standard Time, e.g. `02:07 PM`.
pub fn format_clock(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(IST_OFFSET_SECS) {
        Some(ist) => at.with_timezone(&ist).format(CLOCK_FORMAT).to_string(),
        None => at.format(CLOCK_FORMAT).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_in_ist() {
        // 08:37 UTC = 14:07 IST
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 8, 37, 0).unwrap();
        assert_eq!(format_clock(at), "02:07 PM");
    }

    #[test]
    fn crosses_midnight() {
        // 19:00 UTC = 00:30 IST next day
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 19, 0, 0).unwrap();
        assert_eq!(format_clock(at), "12:30 AM");
    }
}
