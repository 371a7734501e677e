//! Human-readable duration formatting.
//!
//! Pure display helpers over a millisecond count; consumed by the tool
//! layer, never by the registry itself.

/// Breakdown of a millisecond count into calendar-free components.
fn components(milliseconds: i64) -> (i64, i64, i64, i64) {
    let total_seconds = milliseconds / 1000;
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    (days, hours, minutes, seconds)
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Format a duration as a human-readable string, e.g. "2 minutes 34 seconds".
///
/// Durations under one second render as "less than 1 second".
pub fn format(milliseconds: i64) -> String {
    if milliseconds < 1000 {
        return "less than 1 second".to_string();
    }

    let (days, hours, minutes, seconds) = components(milliseconds);
    let mut parts = Vec::new();
    if days > 0 {
        parts.push(plural(days, "day"));
    }
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    }
    if seconds > 0 {
        parts.push(plural(seconds, "second"));
    }
    parts.join(" ")
}

/// Like [`format`], but sub-second durations show millisecond precision.
pub fn format_detailed(milliseconds: i64) -> String {
    if milliseconds < 1000 {
        if milliseconds == 0 {
            return "0 milliseconds".to_string();
        }
        return plural(milliseconds, "millisecond");
    }
    format(milliseconds)
}

/// Format a duration compactly, e.g. "2m 34s".
pub fn format_compact(milliseconds: i64) -> String {
    if milliseconds < 1000 {
        return "<1s".to_string();
    }

    let (days, hours, minutes, seconds) = components(milliseconds);
    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}
