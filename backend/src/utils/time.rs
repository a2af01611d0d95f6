use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::validation::rules::{format_date_key, parse_date_key};

/// Alias accepted wherever a tour day key is expected.
pub const TODAY_ALIAS: &str = "today";

/// Returns the current time in the configured timezone.
pub fn now_in_timezone(tz: &Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(tz)
}

/// Returns today's date in the configured timezone.
pub fn today_local(tz: &Tz) -> NaiveDate {
    now_in_timezone(tz).date_naive()
}

/// Current wall clock as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Today's tour day key (`YYYY-MM-DD`) in the configured timezone.
pub fn today_key(tz: &Tz) -> String {
    format_date_key(today_local(tz))
}

/// Normalizes a day key from a request path. Accepts `today` or a strict
/// `YYYY-MM-DD` date.
pub fn resolve_date_key(raw: &str, tz: &Tz) -> Option<String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case(TODAY_ALIAS) {
        return Some(today_key(tz));
    }
    parse_date_key(raw).map(format_date_key)
}
