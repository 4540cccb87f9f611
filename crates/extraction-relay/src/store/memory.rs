//! In-memory job store

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::JobStore;
use crate::error::{Error, Result};
use crate::types::{JobRecord, JobUpdate};

/// Job store backed by a concurrent map; contents are lost on restart
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: DashMap<String, JobRecord>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        Ok(self.jobs.get(job_id).map(|r| r.value().clone()))
    }

    async fn create(&self, record: &JobRecord) -> Result<()> {
        match self.jobs.entry(record.job_id.clone()) {
            Entry::Occupied(_) => Err(Error::store(format!(
                "job {} already exists",
                record.job_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, job_id: &str, update: &JobUpdate) -> Result<JobRecord> {
        // The entry guard holds the shard lock for the check and the write
        let mut entry = self.jobs.get_mut(job_id).ok_or(Error::NotFound)?;
        if !entry.apply(update) {
            tracing::debug!(
                "[{}] Ignoring {} update over terminal {}",
                job_id,
                update.status,
                entry.status
            );
        }
        Ok(entry.value().clone())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<JobRecord>> {
        let mut records: Vec<JobRecord> = self
            .jobs
            .iter()
            .filter(|r| r.is_owned_by(user_id))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
