//! Storage backend trait definition
//!
//! This module defines the `PodStore` trait that all storage
//! implementations must implement.

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::{PodRecord, PodRow, PodSummary, RatingRecord};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Trait for the store holding pods and their ratings
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as pods are processed by
/// concurrent tasks sharing one store.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>` which wraps `StorageError`.
/// Implementations should convert backend-specific errors to
/// `StorageError` variants. A failed call is fatal for the pod it
/// concerns, never for other pods.
#[async_trait]
pub trait PodStore: Send + Sync {
    /// List the pods to collect
    ///
    /// With a filter, only the pod with exactly that domain is returned.
    async fn list_pods(&self, domain_filter: Option<&str>) -> StorageResult<Vec<PodSummary>>;

    /// All ratings left for a pod
    async fn list_ratings(&self, domain: &str) -> StorageResult<Vec<RatingRecord>>;

    /// Overwrite the collector-owned columns of an existing pod row
    ///
    /// Fails with `StorageError::PodNotFound` when the row does not exist;
    /// rows are never created here.
    async fn update_pod(&self, record: &PodRecord) -> StorageResult<()>;

    /// Read a full pod row
    async fn get_pod(&self, domain: &str) -> StorageResult<Option<PodRow>>;

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend
    /// is operational (e.g., ping database, check file access).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
