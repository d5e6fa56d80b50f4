//! Parser for the `statistics.json` document a pod publishes
//!
//! The document may arrive embedded in other text (the raw header block in
//! front of it, or noise around it). The parser locates the first *balanced*
//! `{...}` object, honouring string literals and escapes, so nested objects
//! inside the document do not cut it short. Flat documents are extracted the
//! same way a "first `{` to first `}`" match would.
//!
//! A leading raw header block (`HTTP/...` status line up to the first blank
//! line) is skipped before searching, so JSON-valued headers such as `NEL`
//! or `Report-To` are never taken for the document.

use serde_json::{Map, Value};
use tracing::trace;

use super::short_version;

/// Sentinel stored as pod name when the document carries none
pub const UNKNOWN_POD_NAME: &str = "null";

/// Metrics a pod reports about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsFields {
    pub registrations_open: bool,
    pub pod_name: String,
    pub total_users: i64,
    pub active_users_halfyear: i64,
    pub active_users_monthly: i64,
    pub local_posts: i64,
    /// `version` up to the first `-`
    pub software_version: Option<String>,
    /// Full `version` value
    pub long_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatisticsError {
    /// No `{...}` object in the input
    NoDocument,
    /// The extracted object is not valid JSON
    InvalidJson(String),
}

impl std::fmt::Display for StatisticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatisticsError::NoDocument => write!(f, "no statistics document found"),
            StatisticsError::InvalidJson(msg) => {
                write!(f, "statistics document is not valid JSON: {msg}")
            }
        }
    }
}

impl std::error::Error for StatisticsError {}

/// The part of a probe capture after its header block, if it has one
pub fn payload(raw: &str) -> &str {
    if !raw.starts_with("HTTP/") {
        return raw;
    }
    raw.find("\r\n\r\n").map_or("", |end| &raw[end + 4..])
}

/// Locate the first balanced JSON object in `raw`
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the statistics document out of `raw`
///
/// Either every field is produced or the whole parse fails; absent counters
/// default to `0` and an absent name to [`UNKNOWN_POD_NAME`].
pub fn parse_statistics(raw: &str) -> Result<StatisticsFields, StatisticsError> {
    let document = extract_json_object(payload(raw)).ok_or(StatisticsError::NoDocument)?;
    let json: Map<String, Value> = serde_json::from_str(document)
        .map_err(|e| StatisticsError::InvalidJson(e.to_string()))?;

    let long_version = json.get("version").and_then(text);
    let software_version = long_version
        .as_deref()
        .map(|version| short_version(version).to_string());

    let fields = StatisticsFields {
        registrations_open: json.get("registrations_open").is_some_and(flag),
        pod_name: json
            .get("name")
            .and_then(text)
            .unwrap_or_else(|| UNKNOWN_POD_NAME.to_string()),
        total_users: count(&json, "total_users"),
        active_users_halfyear: count(&json, "active_users_halfyear"),
        active_users_monthly: count(&json, "active_users_monthly"),
        local_posts: count(&json, "local_posts"),
        software_version,
        long_version,
    };

    trace!("parsed statistics: {fields:?}");
    Ok(fields)
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.as_str(), "true" | "1"),
        _ => false,
    }
}

fn count(json: &Map<String, Value>, key: &str) -> i64 {
    match json.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
