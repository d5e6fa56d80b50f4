//! Uptime API backend
//!
//! The API answers with JSON wrapped in a JavaScript callback,
//! `jsonUptimeRobotApi({...})`. Only the first monitor of the response is
//! read. Months monitored is derived from the pod's creation date, not from
//! anything the API reports.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{MonitorError, MonitorRequest, MonitorStatus, UptimeMonitor, months_since};
use crate::config::HttpMethod;
use crate::probe::{Probe, ProbeOptions};
use crate::{LiveState, ResponseTime};

const CALLBACK_PREFIX: &str = "jsonUptimeRobotApi(";
const CALLBACK_SUFFIX: &str = ")";

pub struct UptimeRobotApi {
    probe: Arc<dyn Probe>,
    api_url: String,
    method: HttpMethod,
}

impl UptimeRobotApi {
    pub fn new(probe: Arc<dyn Probe>, api_url: &str, method: HttpMethod) -> Self {
        Self {
            probe,
            api_url: api_url.to_string(),
            method,
        }
    }

    pub fn query_url(&self, api_key: &str) -> String {
        format!(
            "{}?format=json&customUptimeRatio=7-30-60-90&apiKey={}",
            self.api_url, api_key
        )
    }
}

#[async_trait]
impl UptimeMonitor for UptimeRobotApi {
    #[instrument(skip_all)]
    async fn fetch_status(&self, request: &MonitorRequest<'_>) -> Result<MonitorStatus, MonitorError> {
        let url = self.query_url(request.target);
        let result = self
            .probe
            .probe(&url, &ProbeOptions::body_only(self.method))
            .await;

        if result.body.is_empty() {
            debug!("no connection to uptime API, monitor fields stay empty this pass");
            return Err(MonitorError::EmptyBody);
        }

        let monitor = first_monitor(&result.body)?;

        Ok(MonitorStatus {
            uptime_percent: monitor.get("alltimeuptimeratio").and_then(number),
            months_monitored: request
                .date_created
                .map(|created| months_since(created, request.now)),
            response_time: Some(ResponseTime::NotApplicable),
            live_state: monitor
                .get("status")
                .and_then(number)
                .map(|code| live_state(code as i64)),
            score_delta: 0,
        })
    }
}

/// Map an API status code to a live state, "n/a" for codes it does not know
pub fn live_state(code: i64) -> LiveState {
    match code {
        1 => LiveState::Paused,
        2 => LiveState::Up,
        8 => LiveState::SeemsDown,
        9 => LiveState::Down,
        _ => LiveState::NotAvailable,
    }
}

/// Strip the callback wrapper from an API response
pub fn unwrap_callback(body: &str) -> Result<&str, MonitorError> {
    body.trim()
        .strip_prefix(CALLBACK_PREFIX)
        .and_then(|rest| rest.strip_suffix(CALLBACK_SUFFIX))
        .ok_or(MonitorError::MissingWrapper)
}

/// First monitor object of a wrapped API response
///
/// Older API versions serialise `monitor` as an object keyed by index,
/// newer ones as an array.
pub fn first_monitor(body: &str) -> Result<Value, MonitorError> {
    let json: Value = serde_json::from_str(unwrap_callback(body)?)
        .map_err(|e| MonitorError::InvalidJson(e.to_string()))?;

    let monitors = json
        .get("monitors")
        .and_then(|monitors| monitors.get("monitor").or(Some(monitors)));

    let first = match monitors {
        Some(Value::Array(list)) => list.first(),
        Some(Value::Object(map)) => map.get("0").or_else(|| map.values().next()),
        _ => None,
    };

    first.cloned().ok_or(MonitorError::NoMonitor)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
