//! Durable job record and the partial update applied to it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::status::{JobStatus, SubJobKind};

/// Reference to one upstream sub-job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubJobRef {
    /// Identifier assigned by the upstream service
    pub external_id: String,
    /// Last status seen by a poll (`None` until the first poll)
    pub status: Option<JobStatus>,
}

impl SubJobRef {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            status: None,
        }
    }
}

/// One extraction job as persisted in the job store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Primary key, assigned by the upstream extraction service
    pub job_id: String,
    /// Owner; every read is checked against it
    pub user_id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Configured sub-jobs, keyed (and therefore ordered) by kind
    pub sub_jobs: BTreeMap<SubJobKind, SubJobRef>,
    /// Aggregate status, derived from the sub-job statuses
    pub status: JobStatus,
    /// Document-kind contribution
    pub parsed_content: Option<String>,
    /// Structured-kind contribution, stored as JSON text
    pub extracted_data: Option<String>,
    /// Failure reasons of all failed sub-jobs
    pub error_message: Option<String>,
    /// Extraction options given at submit time
    pub options: Option<serde_json::Value>,
}

impl JobRecord {
    /// Create a fresh `PENDING` record with no sub-job statuses yet
    pub fn new(
        job_id: impl Into<String>,
        user_id: impl Into<String>,
        filename: impl Into<String>,
        sub_jobs: impl IntoIterator<Item = (SubJobKind, String)>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            user_id: user_id.into(),
            filename: filename.into(),
            created_at: now,
            updated_at: now,
            sub_jobs: sub_jobs
                .into_iter()
                .map(|(kind, id)| (kind, SubJobRef::new(id)))
                .collect(),
            status: JobStatus::Pending,
            parsed_content: None,
            extracted_data: None,
            error_message: None,
            options: None,
        }
    }

    /// Attach the submit-time extraction options
    pub fn with_options(mut self, options: Option<serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Upstream id of a sub-job kind, if configured
    pub fn sub_job_id(&self, kind: SubJobKind) -> Option<&str> {
        self.sub_jobs.get(&kind).map(|s| s.external_id.as_str())
    }

    /// Last seen status of a sub-job kind
    pub fn sub_job_status(&self, kind: SubJobKind) -> Option<JobStatus> {
        self.sub_jobs.get(&kind).and_then(|s| s.status)
    }

    /// Apply a partial update in place
    ///
    /// Fields left unset in the update are not touched. An update that would
    /// regress a terminal record is ignored; returns whether it was applied.
    pub fn apply(&mut self, update: &JobUpdate) -> bool {
        if update.regresses(self) {
            return false;
        }

        for (kind, status) in &update.sub_job_statuses {
            if let Some(sub_job) = self.sub_jobs.get_mut(kind) {
                sub_job.status = Some(*status);
            }
        }
        self.status = update.status;
        if let Some(ref content) = update.parsed_content {
            self.parsed_content = Some(content.clone());
        }
        if let Some(ref data) = update.extracted_data {
            self.extracted_data = Some(data.clone());
        }
        if let Some(ref error) = update.error_message {
            self.error_message = Some(error.clone());
        }
        self.updated_at = update.updated_at;
        true
    }
}

/// Named-field partial update produced by one reconciliation pass
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub sub_job_statuses: BTreeMap<SubJobKind, JobStatus>,
    pub status: JobStatus,
    pub parsed_content: Option<String>,
    pub extracted_data: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobUpdate {
    /// True when applying this update would move a terminal record back to a
    /// non-terminal status
    pub fn regresses(&self, current: &JobRecord) -> bool {
        current.status.is_terminal() && !self.status.is_terminal()
    }
}
