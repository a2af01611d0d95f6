//! Common validation rules shared across request payloads.

use chrono::NaiveDate;
use validator::ValidationError;

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Validates an externally supplied document id (bus codes, uids).
///
/// Requirements:
/// - 1-64 characters in length
/// - Only alphanumeric characters, `-` and `_`
pub fn validate_document_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > 64 {
        return Err(ValidationError::new("id_invalid_length"));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::new("id_invalid_characters"));
    }

    Ok(())
}

/// Parses a strictly formatted `YYYY-MM-DD` key.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    if key.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

pub fn format_date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}
