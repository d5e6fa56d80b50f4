//! Storage backends for pods and their ratings
//!
//! This module provides a trait-based abstraction over the store that holds
//! the `pods` and `rating_comments` tables.
//!
//! ## Design
//!
//! - **Trait-based**: `PodStore` trait allows swapping implementations
//! - **Async**: All operations are async for use from concurrent pod tasks
//! - **Update-only**: pod rows are created elsewhere, the collector only
//!   rewrites the columns it owns
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database
//! - **In-Memory**: No persistence, for testing or dry runs
//!
//! ## Usage
//!
//! ```no_run
//! use podmon::config::StorageConfig;
//! use podmon::storage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = storage::open(&StorageConfig::default()).await?;
//!     let pods = store.list_pods(None).await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

use tracing::info;

pub use backend::{HealthStatus, PodStore};
pub use error::{StorageError, StorageResult};
pub use schema::{NewPod, PodRecord, PodRow, PodSummary, RatingRecord};

use crate::config::StorageConfig;

/// Open the configured backend
///
/// Failing to reach storage here is fatal for the whole batch.
pub async fn open(config: &StorageConfig) -> StorageResult<Arc<dyn PodStore>> {
    match config {
        StorageConfig::None => {
            info!("using in-memory storage, nothing will be persisted");
            Ok(Arc::new(memory::MemoryBackend::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => Ok(Arc::new(sqlite::SqliteBackend::new(path).await?)),
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::ConnectionFailed(
            "built without SQLite support".to_string(),
        )),
    }
}
