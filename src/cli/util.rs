use crate::errors::CalendarError;

/// Parses a `key=value` filter argument.
///
/// # Errors
/// Returns `InvalidRequest` when there is no `=` or the key is empty.
pub fn parse_filter(s: &str) -> Result<(String, String), CalendarError> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(CalendarError::InvalidRequest(format!("filter must be key=value, got {s:?}"))),
    }
}
