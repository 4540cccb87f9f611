//! Aggregate status derivation and result merging
//!
//! Pure functions: given the outcome of every configured sub-job, compute the
//! aggregate status, the merged result and the combined error text.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::{JobStatus, JobUpdate, SubJobKind, SubJobOutcome, SubJobPayload};

/// Error text for a job with no configured sub-jobs
pub const NO_SUB_JOBS: &str = "No sub-jobs configured for this job";

/// Derive the aggregate status from the configured sub-job statuses
///
/// - any `FAILED` → `FAILED`
/// - all `SUCCESS` → `SUCCESS`
/// - a single sub-job surfaces its own in-progress status
/// - otherwise `PROCESSING`
///
/// An empty set is not a valid job and yields `FAILED`.
pub fn aggregate_status(statuses: &BTreeMap<SubJobKind, JobStatus>) -> JobStatus {
    if statuses.is_empty() {
        return JobStatus::Failed;
    }

    if statuses.values().any(|s| *s == JobStatus::Failed) {
        return JobStatus::Failed;
    }

    if statuses.values().all(|s| *s == JobStatus::Success) {
        return JobStatus::Success;
    }

    if statuses.len() == 1 {
        if let Some(status) = statuses.values().next() {
            return *status;
        }
    }

    JobStatus::Processing
}

/// Result of reconciling one poll's sub-job outcomes
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub status: JobStatus,
    pub sub_job_statuses: BTreeMap<SubJobKind, JobStatus>,
    pub parsed_content: Option<String>,
    pub extracted_data: Option<Value>,
    pub error_message: Option<String>,
}

impl Reconciliation {
    /// Convert into the partial update written to the job store
    pub fn into_update(self, updated_at: DateTime<Utc>) -> JobUpdate {
        JobUpdate {
            sub_job_statuses: self.sub_job_statuses,
            status: self.status,
            parsed_content: self.parsed_content,
            extracted_data: self.extracted_data.map(|v| v.to_string()),
            error_message: self.error_message,
            updated_at,
        }
    }
}

/// Combine sub-job outcomes into one aggregate
///
/// Successful payloads are kept even when another sub-job failed. Failure
/// reasons are rendered in kind order, so the same combination of failures
/// always produces the same text.
pub fn reconcile(outcomes: BTreeMap<SubJobKind, SubJobOutcome>) -> Reconciliation {
    if outcomes.is_empty() {
        return Reconciliation {
            status: JobStatus::Failed,
            sub_job_statuses: BTreeMap::new(),
            parsed_content: None,
            extracted_data: None,
            error_message: Some(NO_SUB_JOBS.to_string()),
        };
    }

    let mut sub_job_statuses = BTreeMap::new();
    let mut parsed_content = None;
    let mut extracted_data = None;
    let mut errors = Vec::new();

    for (kind, outcome) in outcomes {
        sub_job_statuses.insert(kind, outcome.status());

        match outcome {
            SubJobOutcome::Success(SubJobPayload::Document(text)) => parsed_content = Some(text),
            SubJobOutcome::Success(SubJobPayload::Structured(value)) => {
                extracted_data = Some(value)
            }
            SubJobOutcome::Failed(reason) => errors.push(format!("{}: {}", kind.label(), reason)),
            SubJobOutcome::Pending | SubJobOutcome::Processing => {}
        }
    }

    Reconciliation {
        status: aggregate_status(&sub_job_statuses),
        sub_job_statuses,
        parsed_content,
        extracted_data,
        error_message: if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL_STATUSES: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Success,
        JobStatus::Failed,
    ];

    fn pair(parse: JobStatus, extract: JobStatus) -> BTreeMap<SubJobKind, JobStatus> {
        BTreeMap::from([(SubJobKind::Parse, parse), (SubJobKind::Extract, extract)])
    }

    #[test]
    fn test_any_failure_is_absorbing() {
        for other in ALL_STATUSES {
            assert_eq!(aggregate_status(&pair(JobStatus::Failed, other)), JobStatus::Failed);
            assert_eq!(aggregate_status(&pair(other, JobStatus::Failed)), JobStatus::Failed);
        }
    }

    #[test]
    fn test_all_success() {
        assert_eq!(
            aggregate_status(&pair(JobStatus::Success, JobStatus::Success)),
            JobStatus::Success
        );
    }

    #[test]
    fn test_mixed_progress_is_processing() {
        for parse in ALL_STATUSES {
            for extract in ALL_STATUSES {
                let has_failure = parse == JobStatus::Failed || extract == JobStatus::Failed;
                let all_success = parse == JobStatus::Success && extract == JobStatus::Success;
                if has_failure || all_success {
                    continue;
                }
                assert_eq!(
                    aggregate_status(&pair(parse, extract)),
                    JobStatus::Processing,
                    "{:?} + {:?}",
                    parse,
                    extract
                );
            }
        }
    }

    #[test]
    fn test_single_sub_job_surfaces_raw_status() {
        for status in ALL_STATUSES {
            let single = BTreeMap::from([(SubJobKind::Extract, status)]);
            assert_eq!(aggregate_status(&single), status);
        }
    }

    #[test]
    fn test_empty_set_is_failed() {
        assert_eq!(aggregate_status(&BTreeMap::new()), JobStatus::Failed);

        let reconciliation = reconcile(BTreeMap::new());
        assert_eq!(reconciliation.status, JobStatus::Failed);
        assert_eq!(reconciliation.error_message.as_deref(), Some(NO_SUB_JOBS));
    }

    #[test]
    fn test_partial_failure_keeps_successful_payload() {
        let outcomes = BTreeMap::from([
            (
                SubJobKind::Extract,
                SubJobOutcome::Success(SubJobPayload::Structured(json!({"a": 1}))),
            ),
            (SubJobKind::Parse, SubJobOutcome::failed("boom")),
        ]);

        let reconciliation = reconcile(outcomes);
        assert_eq!(reconciliation.status, JobStatus::Failed);
        assert_eq!(reconciliation.error_message.as_deref(), Some("Parse: boom"));
        assert_eq!(reconciliation.extracted_data, Some(json!({"a": 1})));
        assert_eq!(
            reconciliation.sub_job_statuses[&SubJobKind::Extract],
            JobStatus::Success
        );
    }

    #[test]
    fn test_error_text_uses_fixed_kind_order() {
        // Insert in reverse order; the map orders by kind
        let mut outcomes = BTreeMap::new();
        outcomes.insert(SubJobKind::Extract, SubJobOutcome::failed("bad schema"));
        outcomes.insert(SubJobKind::Parse, SubJobOutcome::failed("timeout"));

        let reconciliation = reconcile(outcomes);
        assert_eq!(
            reconciliation.error_message.as_deref(),
            Some("Parse: timeout; Extract: bad schema")
        );
    }

    #[test]
    fn test_full_success_merges_both_fields() {
        let outcomes = BTreeMap::from([
            (
                SubJobKind::Parse,
                SubJobOutcome::Success(SubJobPayload::Document("# Doc".to_string())),
            ),
            (
                SubJobKind::Extract,
                SubJobOutcome::Success(SubJobPayload::Structured(json!({"name": "ACME"}))),
            ),
        ]);

        let update = reconcile(outcomes).into_update(Utc::now());
        assert_eq!(update.status, JobStatus::Success);
        assert_eq!(update.parsed_content.as_deref(), Some("# Doc"));
        assert_eq!(update.extracted_data.as_deref(), Some(r#"{"name":"ACME"}"#));
        assert!(update.error_message.is_none());
    }
}
