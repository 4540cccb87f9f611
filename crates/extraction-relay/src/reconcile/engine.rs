//! Reconciliation engine
//!
//! One poll loads the job, fetches every configured sub-job from the upstream
//! service in parallel, derives the aggregate and writes it back. Terminal
//! jobs are returned as stored without touching the upstream.

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::aggregate;
use crate::error::{Error, Result};
use crate::store::JobStore;
use crate::types::{JobRecord, SubJobKind, SubJobOutcome};
use crate::upstream::UpstreamJobClient;

/// Reconciles stored jobs against the upstream extraction service
pub struct Reconciler {
    client: Arc<dyn UpstreamJobClient>,
    store: Arc<dyn JobStore>,
    fetch_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn UpstreamJobClient>,
        store: Arc<dyn JobStore>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            client,
            store,
            fetch_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Poll one job on behalf of its owner
    ///
    /// Returns the authoritative record after this poll. Upstream problems
    /// never fail the poll; they end up in the record as a `FAILED` aggregate.
    pub async fn poll(&self, job_id: &str, user_id: &str) -> Result<JobRecord> {
        let record = self.load_owned(job_id, user_id).await?;

        if record.is_terminal() {
            debug!("[{}] Already {}, skipping upstream fetch", job_id, record.status);
            return Ok(record);
        }

        let outcomes = self.fetch_all(&record).await;
        let update = aggregate::reconcile(outcomes).into_update(Utc::now());

        info!(
            "[{}] Reconciled {} sub-job(s): {} -> {}",
            job_id,
            record.sub_jobs.len(),
            record.status,
            update.status
        );

        match self.store.update(job_id, &update).await {
            Ok(stored) => {
                if stored.status != update.status {
                    debug!(
                        "[{}] Store kept {} over computed {}",
                        job_id, stored.status, update.status
                    );
                }
                Ok(stored)
            }
            Err(e) => {
                warn!(
                    "[{}] Failed to persist reconciliation via {}: {}",
                    job_id,
                    self.store.name(),
                    e
                );
                let mut local = record;
                local.apply(&update);
                Ok(local)
            }
        }
    }

    /// Load a job and check it belongs to `user_id`
    ///
    /// Unknown jobs and jobs owned by someone else are indistinguishable.
    pub async fn load_owned(&self, job_id: &str, user_id: &str) -> Result<JobRecord> {
        match self.store.get(job_id).await? {
            Some(record) if record.is_owned_by(user_id) => Ok(record),
            Some(_) => {
                debug!("[{}] Owner mismatch, reporting not found", job_id);
                Err(Error::NotFound)
            }
            None => Err(Error::NotFound),
        }
    }

    /// Fetch every configured sub-job, one task per kind
    async fn fetch_all(&self, record: &JobRecord) -> BTreeMap<SubJobKind, SubJobOutcome> {
        let timeout = self.fetch_timeout;

        let (kinds, handles): (Vec<_>, Vec<_>) = record
            .sub_jobs
            .iter()
            .map(|(kind, sub_job)| {
                let kind = *kind;
                let client = Arc::clone(&self.client);
                let external_id = sub_job.external_id.clone();

                debug!(
                    "[{}] Fetching {} sub-job {} via {}",
                    record.job_id,
                    kind,
                    external_id,
                    client.name()
                );

                let handle = tokio::spawn(async move {
                    tokio::time::timeout(timeout, client.fetch(kind, &external_id)).await
                });
                (kind, handle)
            })
            .unzip();

        let joined = join_all(handles).await;

        kinds
            .into_iter()
            .zip(joined)
            .map(|(kind, result)| {
                let outcome = match result {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(_)) => SubJobOutcome::failed(format!(
                        "{} fetch timed out after {:?}",
                        kind.label(),
                        timeout
                    )),
                    Err(e) => SubJobOutcome::failed(format!(
                        "{} fetch failed: {}",
                        kind.label(),
                        e
                    )),
                };
                (kind, outcome)
            })
            .collect()
    }
}
