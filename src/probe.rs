//! HTTP probing of pod, monitor and upstream endpoints
//!
//! A probe never fails: transport errors are folded into a [`ProbeResult`]
//! with `http_code == 0` and an empty body. Interpreting status codes and
//! deciding whether to fall back to another URL is left to the caller.
//!
//! When headers are captured the body is prefixed with a raw header block
//! (`HTTP/1.1 200 OK\r\nName: value\r\n...\r\n\r\n`) so header and payload
//! parsers can work on the same text.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, trace, warn};

use crate::config::{HttpMethod, ProbeConfig};

/// Options for a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    pub method: HttpMethod,
    /// Prefix the captured body with the raw response headers
    pub include_headers: bool,
    /// Stop reading the body after this many bytes
    pub max_body_bytes: Option<usize>,
}

impl ProbeOptions {
    pub fn with_headers(method: HttpMethod) -> Self {
        Self {
            method,
            include_headers: true,
            max_body_bytes: None,
        }
    }

    pub fn body_only(method: HttpMethod) -> Self {
        Self {
            method,
            include_headers: false,
            max_body_bytes: None,
        }
    }

    pub fn truncate_at(mut self, max_body_bytes: Option<usize>) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Outcome of one HTTP request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// HTTP status code, `0` when no response was received
    pub http_code: u16,
    /// Response headers with canonical names, in arrival order
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ProbeResult {
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// A response that can be parsed: anything but "no response" or 404
    pub fn is_usable(&self) -> bool {
        self.http_code != 0 && self.http_code != 404
    }
}

#[derive(Debug)]
pub enum ProbeError {
    /// The HTTP client could not be constructed
    ClientBuild(reqwest::Error),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::ClientBuild(err) => write!(f, "failed to build HTTP client: {err}"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::ClientBuild(err) => Some(err),
        }
    }
}

/// Anything that can fetch a URL and report code, headers and body
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str, options: &ProbeOptions) -> ProbeResult;
}

/// [`Probe`] backed by a shared `reqwest` client
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(ProbeError::ClientBuild)?;

        Ok(Self { client })
    }

    async fn read_body(
        response: &mut reqwest::Response,
        max_body_bytes: Option<usize>,
    ) -> Vec<u8> {
        let mut body = Vec::new();

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if let Some(max) = max_body_bytes {
                        if body.len() >= max {
                            trace!("truncating body at {max} bytes");
                            body.truncate(max);
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("failed to read response body: {e}");
                    break;
                }
            }
        }

        body
    }
}

#[async_trait]
impl Probe for HttpProbe {
    #[instrument(skip(self, options), fields(method = ?options.method))]
    async fn probe(&self, url: &str, options: &ProbeOptions) -> ProbeResult {
        let mut response = match self
            .client
            .request(options.method.into(), url)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("no response from {url}: {e}");
                return ProbeResult::unreachable();
            }
        };

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    canonical_header_name(name.as_str()),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let payload = if matches!(options.method, HttpMethod::Head) {
            Vec::new()
        } else {
            Self::read_body(&mut response, options.max_body_bytes).await
        };
        let payload = String::from_utf8_lossy(&payload);

        let body = if options.include_headers {
            let mut raw = render_header_block(status, &headers);
            raw.push_str(&payload);
            raw
        } else {
            payload.into_owned()
        };

        trace!("{url}: {} ({} bytes)", status.as_u16(), body.len());

        ProbeResult {
            http_code: status.as_u16(),
            headers,
            body,
        }
    }
}

/// Render `x-git-revision` as `X-Git-Revision`
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn render_header_block(status: reqwest::StatusCode, headers: &[(String, String)]) -> String {
    let mut block = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    for (name, value) in headers {
        block.push_str(name);
        block.push_str(": ");
        block.push_str(value);
        block.push_str("\r\n");
    }
    block.push_str("\r\n");
    block
}
