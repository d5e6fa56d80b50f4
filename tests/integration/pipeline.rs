//! End-to-end passes over pods with scripted collaborators

use std::sync::Arc;

use chrono::Utc;
use podmon::monitors::pingdom::dashboard_url;
use podmon::pipeline::{PodCollectionPipeline, Stage};
use podmon::storage::PodStore;
use podmon::{LiveState, ResponseTime};
use pretty_assertions::assert_eq;

use crate::helpers::*;

const STATISTICS: &str = r#"{"name":"Example Pod","version":"0.7.9.0-abc","registrations_open":true,"total_users":1200,"active_users_halfyear":300,"active_users_monthly":120,"local_posts":99000}"#;

fn pod_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Server", "nginx"),
        ("X-Git-Update", "2019-01-02 03:04:05 +0000"),
        ("X-Git-Revision", "4d5e6f"),
        ("X-Runtime", "0.034512"),
        ("X-Diaspora-Version", "0.7.8.0-old"),
    ]
}

#[tokio::test]
async fn test_secure_pod_full_pass() {
    let probe = Arc::new(
        ScriptedProbe::default()
            .respond(
                "https://pod.example/statistics.json",
                statistics_response(&pod_headers(), STATISTICS),
            )
            .respond(api_query("k-123"), api_response("2", "99.5"))
            .respond(MASTER_VERSION_URL, master_version_response("0.7.18.2")),
    );
    let store = seeded_store(
        &[new_pod("pod.example", Some("k-123"), 20)],
        &[
            rating("pod.example", true, 8.0),
            rating("pod.example", false, 4.0),
            rating("pod.example", false, 5.0),
        ],
    )
    .await;

    let pipeline =
        PodCollectionPipeline::new(&test_config(), store.clone(), stub_collaborators(probe.clone()));
    let report = pipeline.run(None).await.unwrap();

    assert_eq!(report.processed(), 1);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.master_version.as_deref(), Some("0.7.18.2"));

    let record = store.get_pod("pod.example").await.unwrap().unwrap().record.unwrap();

    assert!(record.secure);
    assert_eq!(record.short_version.as_deref(), Some("0.7.9.0"));
    assert_eq!(record.long_version.as_deref(), Some("0.7.9.0-abc"));
    assert_eq!(record.master_version.as_deref(), Some("0.7.18.2"));
    assert_eq!(record.git_revision.as_deref(), Some("4d5e6f"));
    assert_eq!(record.git_date.as_deref(), Some("2019-01-02 03:04:05 +0000"));
    assert_eq!(record.runtime.as_deref(), Some("0.034512"));
    assert_eq!(record.server.as_deref(), Some("nginx"));
    assert_eq!(record.encoding, None);

    assert_eq!(record.pod_name.as_deref(), Some("Example Pod"));
    assert_eq!(record.registrations_open, Some(true));
    assert_eq!(record.total_users, Some(1200));
    assert_eq!(record.active_users_halfyear, Some(300));
    assert_eq!(record.active_users_monthly, Some(120));
    assert_eq!(record.local_posts, Some(99000));

    assert_eq!(record.live_state, Some(LiveState::Up));
    assert_eq!(record.uptime_percent, Some(99.5));
    assert_eq!(record.months_monitored, Some(3));
    assert_eq!(record.response_time, Some(ResponseTime::NotApplicable));

    assert_eq!(record.ipv4.as_deref(), Some("203.0.113.7"));
    assert_eq!(record.ipv6.as_deref(), Some("2001:db8::7"));
    assert_eq!(record.country.as_deref(), Some("Germany"));
    assert_eq!(record.city.as_deref(), Some("Berlin"));
    assert_eq!(record.region.as_deref(), Some("Land Berlin"));
    assert_eq!(record.latitude, Some(52.52));
    assert_eq!(record.longitude, Some(13.4));
    assert_eq!(record.whois.as_deref(), Some("Country: Germany\n Lat:52.52 Long:13.4"));

    assert_eq!(record.admin_rating, 8.0);
    assert_eq!(record.user_rating, 4.5);

    // 20 + 1 for being reachable, clamped
    assert_eq!(record.score, 20);

    // https worked, so http was never tried
    assert!(!probe.calls().contains(&"http://pod.example/statistics.json".to_string()));
}

#[tokio::test]
async fn test_http_fallback_is_not_secure() {
    let probe = Arc::new(
        ScriptedProbe::default()
            .respond("https://plain.example/statistics.json", response(404, "missing"))
            .respond(
                "http://plain.example/statistics.json",
                statistics_response(&[], r#"{"name":"Plain","version":"0.6.0.0"}"#),
            ),
    );
    let store = seeded_store(&[new_pod("plain.example", None, 0)], &[]).await;

    let pipeline =
        PodCollectionPipeline::new(&test_config(), store.clone(), stub_collaborators(probe.clone()));
    let report = pipeline.run(None).await.unwrap();

    let calls = probe.calls();
    let https = calls
        .iter()
        .position(|url| url == "https://plain.example/statistics.json")
        .unwrap();
    let http = calls
        .iter()
        .position(|url| url == "http://plain.example/statistics.json")
        .unwrap();
    assert!(https < http);

    let record = report.outcome("plain.example").unwrap().result.as_ref().unwrap();
    assert!(!record.secure);
    assert_eq!(record.short_version.as_deref(), Some("0.6.0.0"));
    assert_eq!(record.pod_name.as_deref(), Some("Plain"));
    assert_eq!(record.score, 1);
}

#[tokio::test]
async fn test_unreachable_pod_is_still_written() {
    let probe = Arc::new(ScriptedProbe::default());
    let store = seeded_store(&[new_pod("down.example", None, -20)], &[]).await;

    let pipeline =
        PodCollectionPipeline::new(&test_config(), store.clone(), stub_collaborators(probe.clone()));
    let report = pipeline.run(None).await.unwrap();

    let outcome = report.outcome("down.example").unwrap();
    assert!(outcome.is_success());
    assert!(outcome.warnings.iter().any(|w| w.stage == Stage::Probe));
    assert!(outcome.warnings.iter().any(|w| w.stage == Stage::Monitor));

    let record = store.get_pod("down.example").await.unwrap().unwrap().record.unwrap();
    assert!(!record.secure);
    assert_eq!(record.short_version, None);
    assert_eq!(record.pod_name, None);
    assert_eq!(record.total_users, None);
    assert_eq!(record.live_state, None);
    // geolocation does not depend on the pod answering
    assert_eq!(record.city.as_deref(), Some("Berlin"));
    // -20 - 1, clamped
    assert_eq!(record.score, -20);

    assert_eq!(report.master_version, None);
    assert_eq!(record.master_version, None);
}

#[tokio::test]
async fn test_legacy_dashboard_penalty() {
    let monitor = "http://stats.pingdom.com/abc";
    let probe = Arc::new(
        ScriptedProbe::default()
            .respond(
                "https://legacy.example/statistics.json",
                statistics_response(&[], r#"{"name":"Legacy"}"#),
            )
            .respond(
                dashboard_url(monitor, Utc::now()),
                response(503, "HTTP/1.1 503 Service Unavailable\r\n\r\n"),
            ),
    );
    let store = seeded_store(&[new_pod("legacy.example", Some(monitor), 5)], &[]).await;

    let pipeline =
        PodCollectionPipeline::new(&test_config(), store.clone(), stub_collaborators(probe));
    pipeline.run(None).await.unwrap();

    let record = store.get_pod("legacy.example").await.unwrap().unwrap().record.unwrap();
    // 5 + 1 reachable - 2 dashboard gone
    assert_eq!(record.score, 4);
    assert_eq!(record.live_state, None);
}

#[tokio::test]
async fn test_statistics_failure_keeps_header_fields() {
    let probe = Arc::new(ScriptedProbe::default().respond(
        "https://html.example/statistics.json",
        statistics_response(&[("Server", "Apache")], "<html>sign in</html>"),
    ));
    let store = seeded_store(&[new_pod("html.example", None, 0)], &[]).await;

    let pipeline =
        PodCollectionPipeline::new(&test_config(), store.clone(), stub_collaborators(probe));
    let report = pipeline.run(None).await.unwrap();

    let outcome = report.outcome("html.example").unwrap();
    assert!(outcome.warnings.iter().any(|w| w.stage == Stage::Statistics));

    let record = outcome.result.as_ref().unwrap();
    assert_eq!(record.server.as_deref(), Some("Apache"));
    assert_eq!(record.pod_name, None);
    assert!(record.secure);
}

#[tokio::test]
async fn test_domain_filter() {
    let probe = Arc::new(ScriptedProbe::default());
    let store = seeded_store(
        &[
            new_pod("a.example", None, 0),
            new_pod("b.example", None, 0),
            new_pod("c.example", None, 0),
        ],
        &[],
    )
    .await;

    let pipeline =
        PodCollectionPipeline::new(&test_config(), store.clone(), stub_collaborators(probe));
    let report = pipeline.run(Some("b.example")).await.unwrap();

    assert_eq!(report.processed(), 1);
    assert!(report.outcome("b.example").is_some());
    assert!(store.get_pod("a.example").await.unwrap().unwrap().record.is_none());
}

#[tokio::test]
async fn test_many_pods_with_few_workers() {
    let pods: Vec<_> = (0..12)
        .map(|i| new_pod(&format!("pod{i}.example"), None, 0))
        .collect();
    let probe = Arc::new(ScriptedProbe::default());
    let store = seeded_store(&pods, &[]).await;

    let mut config = test_config();
    config.pipeline.workers = 3;
    let pipeline = PodCollectionPipeline::new(&config, store.clone(), stub_collaborators(probe));
    let report = pipeline.run(None).await.unwrap();

    assert_eq!(report.processed(), 12);
    assert_eq!(report.succeeded(), 12);
    for pod in &pods {
        assert!(store.get_pod(&pod.domain).await.unwrap().unwrap().record.is_some());
    }
}

#[tokio::test]
async fn test_out_of_range_stored_scores_are_clamped() {
    let probe = Arc::new(ScriptedProbe::default().respond(
        "https://big.example/statistics.json",
        statistics_response(&[], STATISTICS),
    ));
    let store = seeded_store(
        &[
            new_pod("big.example", None, i32::MAX),
            new_pod("small.example", None, i32::MIN),
        ],
        &[],
    )
    .await;

    let pipeline =
        PodCollectionPipeline::new(&test_config(), store.clone(), stub_collaborators(probe));
    let report = pipeline.run(None).await.unwrap();
    assert_eq!(report.succeeded(), 2);

    let big = store.get_pod("big.example").await.unwrap().unwrap();
    assert_eq!(big.score, 20);
    assert!(big.record.unwrap().secure);

    // unreachable, so the penalty applies on top of the minimum
    let small = store.get_pod("small.example").await.unwrap().unwrap();
    assert_eq!(small.score, -20);
}

#[tokio::test]
async fn test_not_found_on_both_schemes() {
    let https_url = "https://gone.example/statistics.json";
    let http_url = "http://gone.example/statistics.json";
    let not_found = "HTTP/1.1 404 Not Found\r\nServer: nginx\r\nX-Git-Revision: 4d5e6f\r\n\r\nmissing";
    let probe = Arc::new(
        ScriptedProbe::default()
            .respond(https_url, response(404, not_found))
            .respond(http_url, response(404, not_found)),
    );
    let store = seeded_store(&[new_pod("gone.example", None, 3)], &[]).await;

    let pipeline =
        PodCollectionPipeline::new(&test_config(), store.clone(), stub_collaborators(probe.clone()));
    let report = pipeline.run(None).await.unwrap();

    let calls = probe.calls();
    assert_eq!(calls.iter().filter(|url| *url == https_url).count(), 1);
    assert_eq!(calls.iter().filter(|url| *url == http_url).count(), 1);

    let outcome = report.outcome("gone.example").unwrap();
    assert!(outcome.warnings.iter().any(|w| w.stage == Stage::Probe));

    let record = outcome.result.as_ref().unwrap();
    assert!(!record.secure);
    assert_eq!(record.server, None);
    assert_eq!(record.git_revision, None);
    assert_eq!(record.short_version, None);
    assert_eq!(record.pod_name, None);
    assert_eq!(record.total_users, None);
    // 3 - 1 for being unreachable
    assert_eq!(record.score, 2);
}
