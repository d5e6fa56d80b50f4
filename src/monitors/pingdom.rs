//! Legacy public dashboard scraper
//!
//! The dashboard page for the current month is fetched from
//! `{url}/{year}/{month}` and scraped with fixed patterns. A page that is not
//! served with `200`, or that carries no state marker, costs the pod two
//! score points.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use tracing::{debug, instrument, warn};

use super::{MonitorError, MonitorRequest, MonitorStatus, UptimeMonitor};
use crate::config::HttpMethod;
use crate::probe::{Probe, ProbeOptions};
use crate::{LiveState, ResponseTime};

pub const DASHBOARD_PENALTY: i32 = 2;

static RESPONSE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<h3>Avg\. resp\. time this month</h3>\s*<p class="large">(.*?)<"#)
        .unwrap_or_else(|e| panic!("invalid response time pattern: {e}"))
});

static HISTORY_SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)"historySelect">\s*(.*?)\s*</select"#)
        .unwrap_or_else(|e| panic!("invalid history pattern: {e}"))
});

static UPTIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<h3>Uptime this month</h3>\s*<p class="large">(.*?)%<"#)
        .unwrap_or_else(|e| panic!("invalid uptime pattern: {e}"))
});

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)\s*(ms|s)?")
        .unwrap_or_else(|e| panic!("invalid number pattern: {e}"))
});

pub struct PingdomDashboard {
    probe: Arc<dyn Probe>,
    method: HttpMethod,
}

impl PingdomDashboard {
    pub fn new(probe: Arc<dyn Probe>, method: HttpMethod) -> Self {
        Self { probe, method }
    }
}

#[async_trait]
impl UptimeMonitor for PingdomDashboard {
    #[instrument(skip(self, request), fields(url = %request.target))]
    async fn fetch_status(&self, request: &MonitorRequest<'_>) -> Result<MonitorStatus, MonitorError> {
        let url = dashboard_url(request.target, request.now);
        let result = self
            .probe
            .probe(&url, &ProbeOptions::with_headers(self.method))
            .await;

        if result.body.is_empty() {
            debug!("no connection to dashboard {url}");
            return Err(MonitorError::EmptyBody);
        }

        if result.http_code != 200 {
            warn!("dashboard {url} answered {}, stats are gone", result.http_code);
            return Ok(MonitorStatus {
                score_delta: -DASHBOARD_PENALTY,
                ..Default::default()
            });
        }

        Ok(scrape_dashboard(&result.body))
    }
}

/// Dashboard page of the month containing `now`
pub fn dashboard_url(base: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{:02}",
        base.trim_end_matches('/'),
        now.year(),
        now.month()
    )
}

/// Scrape a dashboard page served with `200`
pub fn scrape_dashboard(page: &str) -> MonitorStatus {
    let response_time = RESPONSE_TIME
        .captures(page)
        .and_then(|caps| caps.get(1))
        .and_then(|text| parse_response_time(text.as_str()));

    let months_monitored = HISTORY_SELECT
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|options| options.as_str().matches("<option").count() as i64)
        .unwrap_or(0);

    let uptime_percent = UPTIME
        .captures(page)
        .and_then(|caps| caps.get(1))
        .and_then(|text| text.as_str().trim().replace(',', ".").parse().ok())
        .unwrap_or(0.0);

    let (live_state, score_delta) = if page.contains(r#"class="up""#) {
        (LiveState::Up, 0)
    } else if page.contains(r#"class="down""#) {
        (LiveState::Down, 0)
    } else if page.contains(r#"class="paused""#) {
        (LiveState::Paused, 0)
    } else {
        (LiveState::Error, -DASHBOARD_PENALTY)
    };

    MonitorStatus {
        uptime_percent: Some(uptime_percent),
        months_monitored: Some(months_monitored),
        response_time,
        live_state: Some(live_state),
        score_delta,
    }
}

/// `"734 ms"` → 734, `"1,2 s"` → 1200
fn parse_response_time(text: &str) -> Option<ResponseTime> {
    let caps = NUMBER.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let millis = match caps.get(2).map(|unit| unit.as_str()) {
        Some("s") => value * 1000.0,
        _ => value,
    };
    Some(ResponseTime::Millis(millis.round() as u32))
}
