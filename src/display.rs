//! Human-facing text for version nodes: labels and relative timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use url::Url;

/// Derive a display label for a version record.
///
/// Sources are tried in order: the caller-chosen `label_key` field (any
/// non-null value, stringified), the conventional `label` and `name`
/// fields (non-empty strings only), the trailing segment of the
/// identifier, and finally the literal `"version"`. A `label_key` that is
/// empty after trimming is treated as not given.
pub fn label_for(id: &str, record: &Value, label_key: Option<&str>) -> String {
    let key = label_key.map(str::trim).filter(|key| !key.is_empty());
    if let Some(value) = key.and_then(|key| record.get(key)).filter(|v| !v.is_null()) {
        return scalar_text(value);
    }
    for field in ["label", "name"] {
        if let Some(text) = record.get(field).and_then(Value::as_str) {
            if !text.is_empty() {
                return text.to_owned();
            }
        }
    }
    trailing_segment(id).unwrap_or_else(|| "version".to_owned())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        // Numbers and booleans print bare; arrays and objects print as
        // compact JSON.
        other => other.to_string(),
    }
}

/// The last meaningful path segment of an identifier.
///
/// Identifiers that parse as URLs are split on their path only, so query
/// strings and fragments never leak into labels. Anything else is split
/// on `/`, `#` and `!` directly. Returns `None` when no non-empty
/// segment exists, such as a URL with a bare host.
pub fn trailing_segment(id: &str) -> Option<String> {
    match Url::parse(id) {
        Ok(url) => url
            .path()
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .map(str::to_owned),
        Err(_) => id
            .rsplit(['/', '#', '!'])
            .find(|segment| !segment.is_empty())
            .map(str::to_owned),
    }
}

/// Render a timestamp as a coarse "time ago" phrase.
///
/// A zero timestamp means the record never carried one and renders as an
/// empty string. Sub-minute ages, and timestamps from the future, render
/// as `"just now"`.
pub fn format_time_ago(timestamp_millis: i64, now_millis: i64) -> String {
    if timestamp_millis == 0 {
        return String::new();
    }
    let elapsed = now_millis.saturating_sub(timestamp_millis);
    let days = elapsed / 86_400_000;
    if days > 0 {
        return counted(days, "day");
    }
    let hours = elapsed / 3_600_000;
    if hours > 0 {
        return counted(hours, "hour");
    }
    let minutes = elapsed / 60_000;
    if minutes > 0 {
        return counted(minutes, "minute");
    }
    "just now".to_owned()
}

fn counted(amount: i64, unit: &str) -> String {
    if amount == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{amount} {unit}s ago")
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
