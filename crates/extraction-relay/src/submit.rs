//! Job submission
//!
//! Starts one upstream sub-job per requested kind and records the new job as
//! `PENDING`. Decoding the upload itself happens before this point.

use std::sync::Arc;
use tracing::info;

use crate::error::{Error, Result};
use crate::store::JobStore;
use crate::types::{ExtractionOptions, JobRecord, SubJobKind, UploadedDocument};
use crate::upstream::UpstreamJobClient;

/// A decoded upload ready to be started upstream
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub user_id: String,
    pub document: UploadedDocument,
    pub options: ExtractionOptions,
    /// Sub-job kinds to start; empty means all kinds
    pub kinds: Vec<SubJobKind>,
}

impl SubmitRequest {
    pub fn new(user_id: impl Into<String>, document: UploadedDocument) -> Self {
        Self {
            user_id: user_id.into(),
            document,
            options: ExtractionOptions::default(),
            kinds: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: ExtractionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = SubJobKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Requested kinds, deduplicated and in fixed order
    fn resolved_kinds(&self) -> Vec<SubJobKind> {
        if self.kinds.is_empty() {
            return SubJobKind::ALL.to_vec();
        }
        let mut kinds = self.kinds.clone();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    fn validate(&self) -> Result<()> {
        if self.document.filename.trim().is_empty() {
            return Err(Error::bad_request("Missing filename"));
        }
        if self.user_id.trim().is_empty() {
            return Err(Error::bad_request("Missing user id"));
        }
        if self.document.data.is_empty() {
            return Err(Error::bad_request("Missing file data"));
        }
        Ok(())
    }
}

/// Starts upstream sub-jobs and persists the resulting job
pub struct JobSubmitter {
    client: Arc<dyn UpstreamJobClient>,
    store: Arc<dyn JobStore>,
}

impl JobSubmitter {
    pub fn new(client: Arc<dyn UpstreamJobClient>, store: Arc<dyn JobStore>) -> Self {
        Self { client, store }
    }

    /// Start every requested sub-job and create the `PENDING` record
    ///
    /// The job id is the structured sub-job's upstream id when one was
    /// started, otherwise the document sub-job's id.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobRecord> {
        request.validate()?;

        let mut sub_jobs = Vec::new();
        for kind in request.resolved_kinds() {
            let external_id = self
                .client
                .start(kind, &request.document, &request.options)
                .await?;
            info!(
                "Started {} sub-job {} for {}",
                kind, external_id, request.document.filename
            );
            sub_jobs.push((kind, external_id));
        }

        let job_id = sub_jobs
            .iter()
            .find(|(kind, _)| *kind == SubJobKind::Extract)
            .or_else(|| sub_jobs.first())
            .map(|(_, id)| id.clone())
            .ok_or_else(|| Error::Internal("no sub-job was started".to_string()))?;

        let record = JobRecord::new(
            job_id,
            request.user_id,
            request.document.filename,
            sub_jobs,
        )
        .with_options(request.options.to_record_value());

        self.store.create(&record).await?;
        info!("[{}] Created job with {} sub-job(s)", record.job_id, record.sub_jobs.len());

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryJobStore;
    use crate::types::{JobStatus, SubJobOutcome};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Hands out `<kind>-<n>` ids and remembers what was started
    #[derive(Default)]
    struct RecordingUpstream {
        started: Mutex<Vec<(SubJobKind, String)>>,
        reject: Option<SubJobKind>,
    }

    #[async_trait]
    impl UpstreamJobClient for RecordingUpstream {
        async fn fetch(&self, _kind: SubJobKind, _external_id: &str) -> SubJobOutcome {
            SubJobOutcome::Pending
        }

        async fn start(
            &self,
            kind: SubJobKind,
            document: &UploadedDocument,
            _options: &ExtractionOptions,
        ) -> Result<String> {
            if self.reject == Some(kind) {
                return Err(Error::upstream("start failed with 422"));
            }
            let mut started = self.started.lock();
            let id = format!("{}-{}", kind.label().to_lowercase(), started.len() + 1);
            started.push((kind, document.filename.clone()));
            Ok(id)
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn document() -> UploadedDocument {
        UploadedDocument::new("invoice.pdf", b"%PDF-1.4".to_vec())
    }

    #[tokio::test]
    async fn test_submit_starts_both_kinds() {
        let upstream = Arc::new(RecordingUpstream::default());
        let store = Arc::new(MemoryJobStore::new());
        let submitter = JobSubmitter::new(upstream.clone(), store.clone());

        let options = ExtractionOptions {
            data_schema: Some(json!({"type": "object"})),
            extraction_mode: None,
        };
        let record = submitter
            .submit(SubmitRequest::new("user-1", document()).with_options(options))
            .await
            .unwrap();

        assert_eq!(record.job_id, "extract-2");
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.sub_job_id(SubJobKind::Parse), Some("parse-1"));
        assert_eq!(record.options, Some(json!({"data_schema": {"type": "object"}})));
        assert_eq!(upstream.started.lock().len(), 2);

        let stored = store.get("extract-2").await.unwrap().unwrap();
        assert_eq!(stored.user_id, "user-1");
    }

    #[tokio::test]
    async fn test_parse_only_uses_parse_id() {
        let submitter = JobSubmitter::new(
            Arc::new(RecordingUpstream::default()),
            Arc::new(MemoryJobStore::new()),
        );

        let record = submitter
            .submit(SubmitRequest::new("user-1", document()).with_kinds([SubJobKind::Parse]))
            .await
            .unwrap();

        assert_eq!(record.job_id, "parse-1");
        assert!(!record.sub_jobs.contains_key(&SubJobKind::Extract));
    }

    #[tokio::test]
    async fn test_rejects_incomplete_uploads() {
        let upstream = Arc::new(RecordingUpstream::default());
        let submitter = JobSubmitter::new(upstream.clone(), Arc::new(MemoryJobStore::new()));

        let empty = UploadedDocument::new("invoice.pdf", Vec::new());
        let err = submitter
            .submit(SubmitRequest::new("user-1", empty))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing file data");

        let err = submitter
            .submit(SubmitRequest::new(" ", document()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing user id");

        assert!(upstream.started.lock().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_rejection_creates_nothing() {
        let upstream = Arc::new(RecordingUpstream {
            reject: Some(SubJobKind::Extract),
            ..Default::default()
        });
        let store = Arc::new(MemoryJobStore::new());
        let submitter = JobSubmitter::new(upstream, store.clone());

        let err = submitter
            .submit(SubmitRequest::new("user-1", document()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert!(store.is_empty());
    }
}
