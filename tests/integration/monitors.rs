//! Uptime monitor backends against a local mock server

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use podmon::config::{HttpMethod, MonitorConfig, ProbeConfig};
use podmon::monitors::{MonitorAdapter, MonitorBackend, MonitorError};
use podmon::probe::HttpProbe;
use podmon::{LiveState, ResponseTime};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DASHBOARD_PAGE: &str = r#"<html><body>
<div id="status" class="up">Up</div>
<h3>Uptime this month</h3>
<p class="large">99,87%</p>
<h3>Avg. resp. time this month</h3>
<p class="large">734 ms</p>
<select id="historySelect" class="historySelect">
  <option value="2019/01">January</option>
  <option value="2019/02">February</option>
  <option value="2019/03">March</option>
</select>
</body></html>"#;

fn adapter(server: &MockServer) -> MonitorAdapter {
    let probe = HttpProbe::new(&ProbeConfig {
        connect_timeout_secs: 2,
        request_timeout_secs: 5,
        ..Default::default()
    })
    .unwrap();

    MonitorAdapter::new(
        Arc::new(probe),
        &MonitorConfig {
            uptimerobot_api_url: format!("{}/getMonitors", server.uri()),
            legacy_host_marker: "pingdom.com".to_string(),
        },
        HttpMethod::Get,
    )
}

#[tokio::test]
async fn test_api_monitor_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getMonitors"))
        .and(query_param("apiKey", "m1-abc"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"jsonUptimeRobotApi({"stat":"ok","monitors":{"monitor":{"0":{"status":"9","alltimeuptimeratio":"87.25"}}}})"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let backend = adapter.backend_for("m1-abc").unwrap();
    assert_matches!(backend, MonitorBackend::ApiMonitor { .. });

    let now = Utc::now();
    let status = adapter
        .fetch_status(&backend, Some(now - Duration::days(65)), now)
        .await
        .unwrap();

    assert_eq!(status.live_state, Some(LiveState::Down));
    assert_eq!(status.uptime_percent, Some(87.25));
    assert_eq!(status.months_monitored, Some(2));
    assert_eq!(status.response_time, Some(ResponseTime::NotApplicable));
    assert_eq!(status.score_delta, 0);
}

#[tokio::test]
async fn test_api_monitor_without_creation_date() {
    let server = MockServer::start().await;
    Mock::given(path("/getMonitors"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"jsonUptimeRobotApi({"monitors":{"monitor":[{"status":"2","alltimeuptimeratio":"100"}]}})"#,
        ))
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let backend = adapter.backend_for("m2-def").unwrap();
    let status = adapter.fetch_status(&backend, None, Utc::now()).await.unwrap();

    assert_eq!(status.live_state, Some(LiveState::Up));
    assert_eq!(status.months_monitored, None);
}

#[tokio::test]
async fn test_api_monitor_unknown_status_code() {
    let server = MockServer::start().await;
    Mock::given(path("/getMonitors"))
        .and(query_param("apiKey", "m5-new"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"jsonUptimeRobotApi({"monitors":{"monitor":[{"status":"0","alltimeuptimeratio":"12.5"}]}})"#,
        ))
        .mount(&server)
        .await;
    Mock::given(path("/getMonitors"))
        .and(query_param("apiKey", "m6-bare"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"jsonUptimeRobotApi({"monitors":{"monitor":[{"alltimeuptimeratio":"12.5"}]}})"#,
        ))
        .mount(&server)
        .await;

    let adapter = adapter(&server);

    let backend = adapter.backend_for("m5-new").unwrap();
    let status = adapter.fetch_status(&backend, None, Utc::now()).await.unwrap();
    assert_eq!(status.live_state, Some(LiveState::NotAvailable));
    assert_eq!(status.uptime_percent, Some(12.5));

    // no status at all is not the same as an unknown one
    let backend = adapter.backend_for("m6-bare").unwrap();
    let status = adapter.fetch_status(&backend, None, Utc::now()).await.unwrap();
    assert_eq!(status.live_state, None);
}

#[tokio::test]
async fn test_api_monitor_missing_wrapper() {
    let server = MockServer::start().await;
    Mock::given(path("/getMonitors"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"stat":"fail"}"#))
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let backend = adapter.backend_for("m3-ghi").unwrap();
    let result = adapter.fetch_status(&backend, None, Utc::now()).await;

    assert_eq!(result, Err(MonitorError::MissingWrapper));
}

#[tokio::test]
async fn test_api_monitor_empty_response() {
    let server = MockServer::start().await;
    Mock::given(path("/getMonitors"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let backend = adapter.backend_for("m4-jkl").unwrap();
    let result = adapter.fetch_status(&backend, None, Utc::now()).await;

    assert_eq!(result, Err(MonitorError::EmptyBody));
}

#[tokio::test]
async fn test_legacy_dashboard_is_scraped() {
    let server = MockServer::start().await;
    Mock::given(path_regex(r"^/stats\.pingdom\.com/abc/\d{4}/\d{2}$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DASHBOARD_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let backend = adapter
        .backend_for(&format!("{}/stats.pingdom.com/abc", server.uri()))
        .unwrap();
    assert_matches!(backend, MonitorBackend::LegacyDashboard { .. });

    let status = adapter.fetch_status(&backend, None, Utc::now()).await.unwrap();

    assert_eq!(status.live_state, Some(LiveState::Up));
    assert_eq!(status.uptime_percent, Some(99.87));
    assert_eq!(status.response_time, Some(ResponseTime::Millis(734)));
    assert_eq!(status.months_monitored, Some(3));
    assert_eq!(status.score_delta, 0);
}

#[tokio::test]
async fn test_legacy_dashboard_gone() {
    let server = MockServer::start().await;
    Mock::given(path_regex(r"^/stats\.pingdom\.com/gone/"))
        .respond_with(ResponseTemplate::new(410).set_body_string("gone"))
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let backend = adapter
        .backend_for(&format!("{}/stats.pingdom.com/gone", server.uri()))
        .unwrap();
    let status = adapter.fetch_status(&backend, None, Utc::now()).await.unwrap();

    assert_eq!(status.score_delta, -2);
    assert_eq!(status.live_state, None);
    assert_eq!(status.uptime_percent, None);
}

#[tokio::test]
async fn test_legacy_dashboard_without_state_marker() {
    let server = MockServer::start().await;
    Mock::given(path_regex(r"^/stats\.pingdom\.com/blank/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let backend = adapter
        .backend_for(&format!("{}/stats.pingdom.com/blank", server.uri()))
        .unwrap();
    let status = adapter.fetch_status(&backend, None, Utc::now()).await.unwrap();

    assert_eq!(status.live_state, Some(LiveState::Error));
    assert_eq!(status.score_delta, -2);
    assert_eq!(status.uptime_percent, Some(0.0));
    assert_eq!(status.months_monitored, Some(0));
}
