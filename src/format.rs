//! Display formatting and parsing helpers shared by the table projection,
//! the event detail view, and CLI argument validation.

use chrono::NaiveDateTime;

const BYTES_IN_KILOBYTE: f64 = 1024.0;
const BYTES_IN_MEGABYTE: f64 = 1024.0 * 1024.0;
const BYTES_IN_GIGABYTE: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_IN_TERABYTE: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;

/// Timestamps from the query service look like `09/23/2016 16:24:13.660 EDT`.
const EVENT_TIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S%.3f";

/// Formats a byte count using binary units with two decimal places.
///
/// A unit is only used when the value is strictly greater than one of that
/// unit, so 1024 bytes renders as `1,024 bytes` rather than `1.00 KB`.
pub fn format_data_size(bytes: u64) -> String {
    let size = bytes as f64;

    let terabytes = size / BYTES_IN_TERABYTE;
    if terabytes > 1.0 {
        return format!("{terabytes:.2} TB");
    }

    let gigabytes = size / BYTES_IN_GIGABYTE;
    if gigabytes > 1.0 {
        return format!("{gigabytes:.2} GB");
    }

    let megabytes = size / BYTES_IN_MEGABYTE;
    if megabytes > 1.0 {
        return format!("{megabytes:.2} MB");
    }

    let kilobytes = size / BYTES_IN_KILOBYTE;
    if kilobytes > 1.0 {
        return format!("{kilobytes:.2} KB");
    }

    format!("{} bytes", format_integer(bytes))
}

/// Parses a human readable data size such as `2.5 KB`, `100 MB`, `512 bytes`
/// or a bare byte count. Returns `None` when the text is not a size.
pub fn parse_data_size(text: &str) -> Option<u64> {
    let lowered = text.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let (number_part, multiplier) = if let Some(head) = lowered.strip_suffix("tb") {
        (head, BYTES_IN_TERABYTE)
    } else if let Some(head) = lowered.strip_suffix("gb") {
        (head, BYTES_IN_GIGABYTE)
    } else if let Some(head) = lowered.strip_suffix("mb") {
        (head, BYTES_IN_MEGABYTE)
    } else if let Some(head) = lowered.strip_suffix("kb") {
        (head, BYTES_IN_KILOBYTE)
    } else if let Some(head) = lowered.strip_suffix("bytes") {
        (head, 1.0)
    } else if let Some(head) = lowered.strip_suffix('b') {
        (head, 1.0)
    } else {
        (lowered.as_str(), 1.0)
    };

    let value: f64 = number_part.trim().replace(',', "").parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * multiplier).round() as u64)
}

/// Formats an integer with thousands separators, e.g. `1000` as `1,000`.
pub fn format_integer(value: u64) -> String {
    let digits = value.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(ch);
    }
    formatted
}

/// Formats a millisecond duration as `HH:MM:SS.mmm`. Hours are not capped,
/// so durations beyond a day keep accumulating in the hour field.
pub fn format_duration(millis: u64) -> String {
    let fraction = millis % 1000;
    let total_seconds = millis / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{fraction:03}")
}

/// Parses an event timestamp into epoch milliseconds for ordering.
///
/// The trailing zone label is ignored. All timestamps in one result set come
/// from the same service clock, so dropping the zone keeps ordering intact.
pub fn parse_event_time(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let without_zone = match trimmed.rfind(' ') {
        Some(split) if looks_like_zone(&trimmed[split + 1..]) => &trimmed[..split],
        _ => trimmed,
    };

    NaiveDateTime::parse_from_str(without_zone, EVENT_TIME_FORMAT)
        .ok()
        .map(|timestamp| timestamp.and_utc().timestamp_millis())
}

fn looks_like_zone(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == ':')
        && token.chars().any(|c| c.is_ascii_alphabetic())
}
