//! Parsers for the raw text returned by a pod's `statistics.json` probe
//!
//! Both parsers receive the same blob (raw header block followed by the
//! payload) and work independently of each other.

pub mod headers;
pub mod statistics;

pub use headers::{HeaderFields, parse_headers};
pub use statistics::{StatisticsError, StatisticsFields, parse_statistics};

/// Version up to the first `-`, e.g. `0.7.10.0` for `0.7.10.0-p1`
pub fn short_version(version: &str) -> &str {
    version.split('-').next().unwrap_or(version)
}
