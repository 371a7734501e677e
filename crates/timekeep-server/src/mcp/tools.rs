//! Helpers shared by the MCP tool implementations.

use chrono::{DateTime, TimeZone};
use timekeep_core::Error;

/// Parse a caller-supplied task-id list.
///
/// Accepts either a JSON array string (`["a","b"]`) or a comma-separated
/// list (`a,b`). Entries are trimmed and empties dropped.
pub fn parse_task_ids(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        if let Ok(ids) = serde_json::from_str::<Vec<String>>(raw) {
            return ids
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
        }
    }
    raw.split(',')
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Structured error payload returned to tool callers.
pub fn error_json(err: &Error) -> String {
    serde_json::json!({
        "error": true,
        "error_code": err.code(),
        "error_message": err.to_string(),
    })
    .to_string()
}

/// Error payload for adapter-level failures with no core error variant.
pub fn error_json_raw(code: &str, message: &str) -> String {
    serde_json::json!({
        "error": true,
        "error_code": code,
        "error_message": message,
    })
    .to_string()
}

/// Human-friendly timestamp, e.g. "December 14, 2025 3:04 PM".
pub fn friendly_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%B %-d, %Y %-I:%M %p").to_string()
}
