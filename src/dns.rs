//! A and AAAA resolution for pod domains

use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use tracing::{debug, instrument};

/// Addresses a pod domain resolves to; missing records stay `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodAddresses {
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
}

impl PodAddresses {
    /// Address used for geolocation, IPv4 preferred
    pub fn primary(&self) -> Option<&str> {
        self.ipv4.as_deref().or(self.ipv6.as_deref())
    }
}

#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, domain: &str) -> PodAddresses;
}

pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

#[async_trait]
impl Resolve for DnsResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, domain: &str) -> PodAddresses {
        let ipv4 = match self.resolver.ipv4_lookup(domain).await {
            Ok(lookup) => lookup.iter().next().map(|record| record.0.to_string()),
            Err(e) => {
                debug!("no A record: {e}");
                None
            }
        };

        let ipv6 = match self.resolver.ipv6_lookup(domain).await {
            Ok(lookup) => lookup.iter().next().map(|record| record.0.to_string()),
            Err(e) => {
                debug!("no AAAA record: {e}");
                None
            }
        };

        PodAddresses { ipv4, ipv6 }
    }
}
