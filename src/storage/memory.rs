//! In-memory storage backend (no persistence)
//!
//! This backend keeps pods and ratings in memory.
//! It's useful for:
//! - Testing without database dependencies
//! - Dry runs (`storage: none`) where nothing should be written to disk
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Starts empty**: pods must be added through `insert_pod`

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, PodStore};
use super::error::{StorageError, StorageResult};
use super::schema::{NewPod, PodRecord, PodRow, PodSummary, RatingRecord};

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryBackend {
    /// Pods keyed by domain
    pods: RwLock<BTreeMap<String, PodRow>>,

    ratings: RwLock<Vec<RatingRecord>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pod row (administrative path)
    pub async fn insert_pod(&self, pod: &NewPod) -> StorageResult<()> {
        let mut pods = self.pods.write().await;
        if pods.contains_key(&pod.domain) {
            return Err(StorageError::QueryFailed(format!(
                "pod {} already exists",
                pod.domain
            )));
        }

        pods.insert(
            pod.domain.clone(),
            PodRow {
                pingdom_url: pod.pingdom_url.clone(),
                date_created: pod.date_created,
                hidden: pod.hidden,
                record: None,
                score: pod.score,
            },
        );
        Ok(())
    }

    /// Insert a rating (end-user path)
    pub async fn insert_rating(&self, rating: &RatingRecord) -> StorageResult<()> {
        self.ratings.write().await.push(rating.clone());
        Ok(())
    }
}

#[async_trait]
impl PodStore for MemoryBackend {
    async fn list_pods(&self, domain_filter: Option<&str>) -> StorageResult<Vec<PodSummary>> {
        let pods = self.pods.read().await;

        Ok(pods
            .iter()
            .filter(|(domain, _)| domain_filter.is_none_or(|filter| filter == domain.as_str()))
            .map(|(domain, row)| PodSummary {
                domain: domain.clone(),
                pingdom_url: row.pingdom_url.clone(),
                score: row.score,
                date_created: row.date_created,
                admin_rating: row.record.as_ref().map_or(0.0, |record| record.admin_rating),
            })
            .collect())
    }

    async fn list_ratings(&self, domain: &str) -> StorageResult<Vec<RatingRecord>> {
        Ok(self
            .ratings
            .read()
            .await
            .iter()
            .filter(|rating| rating.domain == domain)
            .cloned()
            .collect())
    }

    async fn update_pod(&self, record: &PodRecord) -> StorageResult<()> {
        let mut pods = self.pods.write().await;
        let row = pods
            .get_mut(&record.domain)
            .ok_or_else(|| StorageError::PodNotFound(record.domain.clone()))?;

        row.score = record.score;
        row.record = Some(record.clone());
        debug!("in-memory pod {} updated", record.domain);
        Ok(())
    }

    async fn get_pod(&self, domain: &str) -> StorageResult<Option<PodRow>> {
        Ok(self.pods.read().await.get(domain).cloned())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("pods".to_string(), self.pods.read().await.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
