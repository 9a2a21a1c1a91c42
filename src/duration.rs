//! Human-readable elapsed-time rendering shared by uptime and tmux.

use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Render `elapsed` as `"X days, Y hours, Z minutes[, W seconds]"`.
///
/// A unit is shown when it is nonzero or when any larger unit is shown, so
/// `"0 hours"` only ever appears after a day count. Minutes are also kept when
/// seconds are requested (`"0 minutes, 45 seconds"`). Without seconds, anything
/// under a minute renders as the empty string.
pub fn format_duration(elapsed: Duration, incl_seconds: bool) -> String {
    let total = elapsed.as_secs();
    let days = total / DAY;
    let hours = (total % DAY) / HOUR;
    let minutes = (total % HOUR) / MINUTE;
    let seconds = total % MINUTE;

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(unit(days, "day"));
    }
    if hours > 0 || days > 0 {
        parts.push(unit(hours, "hour"));
    }
    if minutes > 0 || hours > 0 || days > 0 || incl_seconds {
        parts.push(unit(minutes, "minute"));
    }
    if incl_seconds {
        parts.push(unit(seconds, "second"));
    }
    parts.join(", ")
}

/// Same as [`format_duration`] for a signed second count; negative spans
/// (clock skew) clamp to zero.
pub fn format_seconds(seconds: i64, incl_seconds: bool) -> String {
    format_duration(Duration::from_secs(seconds.max(0) as u64), incl_seconds)
}

fn unit(value: u64, name: &str) -> String {
    if value == 1 {
        format!("{} {}", value, name)
    } else {
        format!("{} {}s", value, name)
    }
}
