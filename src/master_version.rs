//! Upstream reference version, fetched once per batch

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::config::HttpMethod;
use crate::probe::{Probe, ProbeOptions};

static VERSION_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"number:\s*"(.*?)""#).unwrap_or_else(|e| panic!("invalid version pattern: {e}"))
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterVersionError {
    /// The upstream file could not be retrieved
    Unavailable(u16),
    /// The upstream file carries no `number: "..."` field
    NotFound,
}

impl std::fmt::Display for MasterVersionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MasterVersionError::Unavailable(code) => {
                write!(f, "upstream version source unavailable (HTTP {code})")
            }
            MasterVersionError::NotFound => write!(f, "no version number in upstream defaults"),
        }
    }
}

impl std::error::Error for MasterVersionError {}

/// Extract the `number: "..."` value from the upstream defaults file
pub fn parse_master_version(defaults: &str) -> Option<String> {
    VERSION_NUMBER
        .captures(defaults)
        .and_then(|caps| caps.get(1))
        .map(|number| number.as_str().trim().to_string())
        .filter(|number| !number.is_empty())
}

#[instrument(skip(probe))]
pub async fn fetch_master_version(
    probe: &dyn Probe,
    url: &str,
    method: HttpMethod,
) -> Result<String, MasterVersionError> {
    let result = probe.probe(url, &ProbeOptions::body_only(method)).await;

    if !(200..300).contains(&result.http_code) {
        return Err(MasterVersionError::Unavailable(result.http_code));
    }

    let version = parse_master_version(&result.body).ok_or(MasterVersionError::NotFound)?;
    debug!("master version: {version}");
    Ok(version)
}
