//! Presentation helpers for recording listings.

use chrono::{Local, TimeZone};

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count with binary (1024) units, rounded to two decimals.
///
/// Sizes beyond the gigabyte range stay in GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut i = 0;
    while i < SIZE_UNITS.len() - 1 && bytes >= 1u64 << (10 * (i + 1)) {
        i += 1;
    }
    let value = (bytes as f64 / (1u64 << (10 * i)) as f64 * 100.0).round() / 100.0;
    format!("{} {}", value, SIZE_UNITS[i])
}

/// Format a modification time (seconds since the epoch) in local time.
///
/// Zero, negative or non-finite timestamps render as an empty string.
pub fn format_date(timestamp: f64) -> String {
    if !timestamp.is_finite() || timestamp <= 0.0 {
        return String::new();
    }
    let millis = (timestamp * 1000.0) as i64;
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
