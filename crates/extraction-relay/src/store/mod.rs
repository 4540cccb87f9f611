//! Job store abstraction
//!
//! The store is the source of truth for a job's aggregate status. Updates are
//! last-write-wins with one guard: a non-terminal status never overwrites a
//! terminal one.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use crate::types::{JobRecord, JobUpdate};

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

/// Trait for durable job storage
///
/// Implementations:
/// - `SqliteJobStore`: SQLite file
/// - `MemoryJobStore`: process memory
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a job by id
    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>>;

    /// Insert a new job; a duplicate id is an error
    async fn create(&self, record: &JobRecord) -> Result<()>;

    /// Apply a partial update and return the stored record afterwards
    ///
    /// An update that would regress a terminal job is ignored and the stored
    /// record is returned unchanged. Unknown ids yield `Error::NotFound`.
    async fn update(&self, job_id: &str, update: &JobUpdate) -> Result<JobRecord>;

    /// All jobs owned by a user, newest first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<JobRecord>>;

    /// Get store name for logging
    fn name(&self) -> &str;
}

/// Open the store selected by the configuration
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn JobStore>> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteJobStore::open(&config.sqlite_path)?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryJobStore::new())),
    }
}
