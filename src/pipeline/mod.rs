//! PodCollectionPipeline - one batch pass over the pod list
//!
//! ## Flow per pod
//!
//! ```text
//! probe https → (probe http) → parse headers / statistics
//!     → uptime monitor → resolve + geolocate → ratings → clamp score → write
//! ```
//!
//! Pods are independent of each other and processed by a bounded pool of
//! concurrent tasks; the steps for one pod run strictly in order. Network
//! stages degrade to "unavailable" and only storage failures end a pod's
//! pass. Listing the pods is the only failure that ends the batch.

pub mod report;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, PipelineConfig, ProbeConfig};
use crate::dns::{DnsResolver, Resolve};
use crate::geo::{self, DisabledLocator, GeoLocator, MaxMindLocator};
use crate::master_version::fetch_master_version;
use crate::monitors::{MonitorAdapter, MonitorStatus};
use crate::parsers::{HeaderFields, StatisticsFields, parse_headers, parse_statistics};
use crate::probe::{HttpProbe, Probe, ProbeOptions, ProbeResult};
use crate::ratings;
use crate::score;
use crate::storage::{PodRecord, PodStore, PodSummary, StorageResult};

pub use report::{BatchReport, PodFailure, PodOutcome, Stage, StageWarning};

/// External services the pipeline talks to
pub struct Collaborators {
    pub probe: Arc<dyn Probe>,
    pub resolver: Arc<dyn Resolve>,
    pub geo: Arc<dyn GeoLocator>,
}

impl Collaborators {
    /// Build the real HTTP, DNS and geo collaborators
    ///
    /// A geo database that cannot be opened disables geolocation instead of
    /// failing the run.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let probe = HttpProbe::new(&config.probe)?;
        let resolver = DnsResolver::new(Duration::from_secs(config.probe.connect_timeout_secs));

        let geo: Arc<dyn GeoLocator> = match &config.geo {
            Some(geo_config) => match MaxMindLocator::open(&geo_config.database) {
                Ok(locator) => Arc::new(locator),
                Err(e) => {
                    warn!("{e}, geolocation disabled");
                    Arc::new(DisabledLocator)
                }
            },
            None => Arc::new(DisabledLocator),
        };

        Ok(Self {
            probe: Arc::new(probe),
            resolver: Arc::new(resolver),
            geo,
        })
    }
}

/// Statistics probe outcome after scheme fallback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Retrieval {
    /// `None` when neither scheme produced a usable response
    pub response: Option<ProbeResult>,
    /// The HTTPS attempt produced a usable response
    pub secure: bool,
}

pub struct PodCollectionPipeline {
    config: PipelineConfig,
    probe_config: ProbeConfig,
    master_version_url: String,
    store: Arc<dyn PodStore>,
    probe: Arc<dyn Probe>,
    monitors: MonitorAdapter,
    resolver: Arc<dyn Resolve>,
    geo: Arc<dyn GeoLocator>,
}

impl PodCollectionPipeline {
    pub fn new(config: &Config, store: Arc<dyn PodStore>, collaborators: Collaborators) -> Self {
        let Collaborators {
            probe,
            resolver,
            geo,
        } = collaborators;

        Self {
            config: config.pipeline.clone(),
            probe_config: config.probe.clone(),
            master_version_url: config.master_version.url.clone(),
            monitors: MonitorAdapter::new(probe.clone(), &config.monitors, config.probe.method),
            store,
            probe,
            resolver,
            geo,
        }
    }

    /// Collect every listed pod (or only `domain_filter`) once
    #[instrument(skip(self))]
    pub async fn run(&self, domain_filter: Option<&str>) -> StorageResult<BatchReport> {
        let pods = self.store.list_pods(domain_filter).await?;
        info!("collecting {} pods", pods.len());

        let master_version = self.master_version().await;

        let outcomes: Vec<PodOutcome> = stream::iter(pods.iter())
            .map(|pod| self.collect_pod(pod, master_version.as_deref()))
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let report = BatchReport {
            master_version,
            outcomes,
        };
        info!(
            "batch finished: {} of {} pods written",
            report.succeeded(),
            report.processed()
        );
        Ok(report)
    }

    /// Upstream reference version, `None` if it cannot be fetched
    pub async fn master_version(&self) -> Option<String> {
        match fetch_master_version(
            self.probe.as_ref(),
            &self.master_version_url,
            self.probe_config.method,
        )
        .await
        {
            Ok(version) => Some(version),
            Err(e) => {
                warn!("master version unavailable for this run: {e}");
                None
            }
        }
    }

    /// Probe `statistics.json` over HTTPS, falling back to HTTP once
    #[instrument(skip(self))]
    pub async fn retrieve(&self, domain: &str) -> Retrieval {
        let options = ProbeOptions::with_headers(self.probe_config.method)
            .truncate_at(self.probe_config.max_body_bytes);

        let secure = self
            .probe
            .probe(&format!("https://{domain}/statistics.json"), &options)
            .await;
        if secure.is_usable() {
            return Retrieval {
                response: Some(secure),
                secure: true,
            };
        }

        debug!("https answered {}, falling back to http", secure.http_code);
        let plain = self
            .probe
            .probe(&format!("http://{domain}/statistics.json"), &options)
            .await;
        if plain.is_usable() {
            return Retrieval {
                response: Some(plain),
                secure: false,
            };
        }

        debug!("no connection to pod possible");
        Retrieval::default()
    }

    /// Run every stage for one pod and write the result
    #[instrument(skip(self, pod, master_version), fields(domain = %pod.domain))]
    pub async fn collect_pod(&self, pod: &PodSummary, master_version: Option<&str>) -> PodOutcome {
        let now = Utc::now();
        let mut warnings = Vec::new();
        let mut record = PodRecord::empty(pod.domain.clone(), now);
        record.master_version = master_version.map(str::to_string);

        // probe and parse
        let retrieval = self.retrieve(&pod.domain).await;
        record.secure = retrieval.secure;
        // stored scores are not guaranteed to be in range
        let mut running_score = pod.score;

        match &retrieval.response {
            Some(response) => {
                running_score = running_score.saturating_add(self.config.reachable_bonus);

                let headers = parse_headers(&response.body);
                self.trace_stage(&pod.domain, Stage::Probe, format_args!("{headers:?}"));
                apply_headers(&mut record, headers);

                match parse_statistics(&response.body) {
                    Ok(statistics) => {
                        self.trace_stage(&pod.domain, Stage::Statistics, format_args!("{statistics:?}"));
                        apply_statistics(&mut record, statistics);
                    }
                    Err(e) => warnings.push(StageWarning {
                        stage: Stage::Statistics,
                        message: e.to_string(),
                    }),
                }
            }
            None => {
                running_score = running_score.saturating_sub(self.config.unreachable_penalty);
                warnings.push(StageWarning {
                    stage: Stage::Probe,
                    message: "pod unreachable over https and http".to_string(),
                });
            }
        }

        // uptime monitor
        let monitor = pod
            .pingdom_url
            .as_deref()
            .and_then(|monitor| self.monitors.backend_for(monitor));
        match monitor {
            Some(backend) => match self.monitors.fetch_status(&backend, pod.date_created, now).await {
                Ok(status) => {
                    self.trace_stage(&pod.domain, Stage::Monitor, format_args!("{status:?}"));
                    running_score = running_score.saturating_add(status.score_delta);
                    apply_monitor(&mut record, status);
                }
                Err(e) => warnings.push(StageWarning {
                    stage: Stage::Monitor,
                    message: e.to_string(),
                }),
            },
            None => warnings.push(StageWarning {
                stage: Stage::Monitor,
                message: "no uptime monitor configured".to_string(),
            }),
        }

        // addresses and location
        let addresses = self.resolver.resolve(&pod.domain).await;
        match addresses
            .primary()
            .and_then(|ip| geo::locate(self.geo.as_ref(), ip))
        {
            Some(location) => {
                self.trace_stage(&pod.domain, Stage::Geolocation, format_args!("{location:?}"));
                record.country = location.country;
                record.city = Some(location.city);
                record.region = location.region;
                record.latitude = location.latitude;
                record.longitude = location.longitude;
                record.whois = Some(location.summary);
            }
            None => warnings.push(StageWarning {
                stage: Stage::Geolocation,
                message: format!("no location for {addresses:?}"),
            }),
        }
        record.ipv4 = addresses.ipv4;
        record.ipv6 = addresses.ipv6;

        // ratings
        let ratings = match self.store.list_ratings(&pod.domain).await {
            Ok(ratings) => ratings::aggregate(&ratings),
            Err(error) => {
                warn!("failed to read ratings: {error}");
                return PodOutcome {
                    domain: pod.domain.clone(),
                    result: Err(PodFailure {
                        stage: Stage::Ratings,
                        error,
                    }),
                    warnings,
                };
            }
        };
        record.admin_rating = ratings.admin;
        record.user_rating = ratings.user;

        record.score = score::normalize(running_score);
        self.trace_stage(
            &pod.domain,
            Stage::Write,
            format_args!("score {} -> {}", pod.score, record.score),
        );

        for warning in &warnings {
            debug!("{} degraded: {}", warning.stage, warning.message);
        }

        let result = match self.store.update_pod(&record).await {
            Ok(()) => Ok(record),
            Err(error) => {
                warn!("failed to write pod: {error}");
                Err(PodFailure {
                    stage: Stage::Write,
                    error,
                })
            }
        };

        PodOutcome {
            domain: pod.domain.clone(),
            result,
            warnings,
        }
    }

    fn trace_stage(&self, domain: &str, stage: Stage, details: fmt::Arguments<'_>) {
        if self.config.verbose {
            info!("{domain} [{stage}] {details}");
        } else {
            debug!("{domain} [{stage}] {details}");
        }
    }
}

fn apply_headers(record: &mut PodRecord, headers: HeaderFields) {
    record.git_date = headers.git_date;
    record.git_revision = headers.git_revision;
    record.runtime = headers.runtime;
    record.server = headers.server;
    record.encoding = headers.encoding;
    record.short_version = headers.software_version;
    record.long_version = headers.long_version;
}

/// Statistics are applied after headers; their version wins when present
fn apply_statistics(record: &mut PodRecord, statistics: StatisticsFields) {
    record.registrations_open = Some(statistics.registrations_open);
    record.pod_name = Some(statistics.pod_name);
    record.total_users = Some(statistics.total_users);
    record.active_users_halfyear = Some(statistics.active_users_halfyear);
    record.active_users_monthly = Some(statistics.active_users_monthly);
    record.local_posts = Some(statistics.local_posts);
    if statistics.software_version.is_some() {
        record.short_version = statistics.software_version;
        record.long_version = statistics.long_version;
    }
}

fn apply_monitor(record: &mut PodRecord, status: MonitorStatus) {
    record.uptime_percent = status.uptime_percent;
    record.months_monitored = status.months_monitored;
    record.response_time = status.response_time;
    record.live_state = status.live_state;
}
