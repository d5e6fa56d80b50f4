use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use super::short_version;

/// Protocol metadata announced through response headers
///
/// Fields whose header was absent stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub git_date: Option<String>,
    pub git_revision: Option<String>,
    /// Full `X-Diaspora-Version` value
    pub long_version: Option<String>,
    /// `X-Diaspora-Version` up to the first `-`
    pub software_version: Option<String>,
    pub runtime: Option<String>,
    pub server: Option<String>,
    pub encoding: Option<String>,
}

fn header_pattern(name: &str) -> Regex {
    // first "Name: value" line, any line ending
    Regex::new(&format!(r"(?mi)^{}:[ \t]*(.*?)\r?$", regex::escape(name)))
        .unwrap_or_else(|e| panic!("invalid header pattern for {name}: {e}"))
}

static GIT_UPDATE: LazyLock<Regex> = LazyLock::new(|| header_pattern("X-Git-Update"));
static GIT_REVISION: LazyLock<Regex> = LazyLock::new(|| header_pattern("X-Git-Revision"));
static DIASPORA_VERSION: LazyLock<Regex> = LazyLock::new(|| header_pattern("X-Diaspora-Version"));
static RUNTIME: LazyLock<Regex> = LazyLock::new(|| header_pattern("X-Runtime"));
static SERVER: LazyLock<Regex> = LazyLock::new(|| header_pattern("Server"));
static CONTENT_ENCODING: LazyLock<Regex> = LazyLock::new(|| header_pattern("Content-Encoding"));

fn first_value(pattern: &Regex, raw: &str) -> Option<String> {
    pattern
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Extract header metadata from a raw header block
pub fn parse_headers(raw: &str) -> HeaderFields {
    let long_version = first_value(&DIASPORA_VERSION, raw);
    let software_version = long_version
        .as_deref()
        .map(|version| short_version(version).to_string());

    let fields = HeaderFields {
        git_date: first_value(&GIT_UPDATE, raw),
        git_revision: first_value(&GIT_REVISION, raw),
        long_version,
        software_version,
        runtime: first_value(&RUNTIME, raw),
        server: first_value(&SERVER, raw),
        encoding: first_value(&CONTENT_ENCODING, raw),
    };

    trace!("parsed header fields: {fields:?}");
    fields
}
