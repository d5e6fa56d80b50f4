//! Uptime monitor backends
//!
//! A pod's stored monitor string is either the URL of a legacy public
//! dashboard (scraped as HTML) or the key of an uptime API monitor. The
//! backend is resolved once per pod via [`MonitorBackend::from_config`] and
//! both variants report a common [`MonitorStatus`].

pub mod pingdom;
pub mod uptimerobot;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::config::{HttpMethod, MonitorConfig};
use crate::probe::Probe;
use crate::{LiveState, ResponseTime};

pub use pingdom::PingdomDashboard;
pub use uptimerobot::UptimeRobotApi;

/// Normalised monitor report
///
/// Fields a backend could not determine stay `None`. `score_delta` is added
/// to the pod's running score by the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorStatus {
    pub uptime_percent: Option<f64>,
    pub months_monitored: Option<i64>,
    pub response_time: Option<ResponseTime>,
    pub live_state: Option<LiveState>,
    pub score_delta: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// The backend answered with nothing at all
    EmptyBody,
    /// The API response lacks its callback wrapper
    MissingWrapper,
    InvalidJson(String),
    /// The API response lists no monitor
    NoMonitor,
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::EmptyBody => write!(f, "no response from uptime monitor"),
            MonitorError::MissingWrapper => {
                write!(f, "uptime monitor response is missing its callback wrapper")
            }
            MonitorError::InvalidJson(msg) => {
                write!(f, "uptime monitor response is not valid JSON: {msg}")
            }
            MonitorError::NoMonitor => write!(f, "uptime monitor response lists no monitor"),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Which backend a pod is monitored by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorBackend {
    /// Public HTML dashboard, obsolete but still supported
    LegacyDashboard { url: String },
    /// Uptime API monitor identified by its key
    ApiMonitor { api_key: String },
}

impl MonitorBackend {
    /// Resolve the backend from the stored monitor string
    ///
    /// Returns `None` when the pod has no monitor configured.
    pub fn from_config(monitor: &str, legacy_host_marker: &str) -> Option<Self> {
        let monitor = monitor.trim();
        if monitor.is_empty() {
            return None;
        }

        if monitor.contains(legacy_host_marker) {
            Some(MonitorBackend::LegacyDashboard {
                url: monitor.to_string(),
            })
        } else {
            Some(MonitorBackend::ApiMonitor {
                api_key: monitor.to_string(),
            })
        }
    }
}

/// Everything a backend needs to know about the pod it reports on
#[derive(Debug, Clone, Copy)]
pub struct MonitorRequest<'a> {
    /// Dashboard URL or API key, depending on the backend
    pub target: &'a str,
    pub date_created: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

/// A single uptime monitor backend
#[async_trait]
pub trait UptimeMonitor: Send + Sync {
    async fn fetch_status(&self, request: &MonitorRequest<'_>) -> Result<MonitorStatus, MonitorError>;
}

/// Dispatches a [`MonitorBackend`] to the matching implementation
pub struct MonitorAdapter {
    legacy_host_marker: String,
    pingdom: PingdomDashboard,
    uptimerobot: UptimeRobotApi,
}

impl MonitorAdapter {
    pub fn new(probe: Arc<dyn Probe>, config: &MonitorConfig, method: HttpMethod) -> Self {
        Self {
            legacy_host_marker: config.legacy_host_marker.clone(),
            pingdom: PingdomDashboard::new(probe.clone(), method),
            uptimerobot: UptimeRobotApi::new(probe, &config.uptimerobot_api_url, method),
        }
    }

    pub fn backend_for(&self, monitor: &str) -> Option<MonitorBackend> {
        MonitorBackend::from_config(monitor, &self.legacy_host_marker)
    }

    #[instrument(skip(self, date_created, now))]
    pub async fn fetch_status(
        &self,
        backend: &MonitorBackend,
        date_created: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<MonitorStatus, MonitorError> {
        let (monitor, target): (&dyn UptimeMonitor, &str) = match backend {
            MonitorBackend::LegacyDashboard { url } => (&self.pingdom, url.as_str()),
            MonitorBackend::ApiMonitor { api_key } => (&self.uptimerobot, api_key.as_str()),
        };

        let status = monitor
            .fetch_status(&MonitorRequest {
                target,
                date_created,
                now,
            })
            .await?;

        debug!("monitor status: {status:?}");
        Ok(status)
    }
}

/// Whole 30-day periods between pod creation and `now`
pub fn months_since(date_created: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = (now - date_created).num_seconds().abs();
    elapsed / (30 * 24 * 60 * 60)
}
