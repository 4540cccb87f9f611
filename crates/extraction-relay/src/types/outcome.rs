//! Transient result of polling one sub-job

use serde_json::Value;

use super::status::JobStatus;

/// Payload of a successful sub-job
#[derive(Debug, Clone, PartialEq)]
pub enum SubJobPayload {
    /// Text document (parse kind), kept opaque
    Document(String),
    /// Validated structured data (extract kind)
    Structured(Value),
}

/// Outcome of one upstream fetch, already classified into the canonical
/// status vocabulary
#[derive(Debug, Clone, PartialEq)]
pub enum SubJobOutcome {
    Pending,
    Processing,
    Success(SubJobPayload),
    Failed(String),
}

impl SubJobOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn status(&self) -> JobStatus {
        match self {
            SubJobOutcome::Pending => JobStatus::Pending,
            SubJobOutcome::Processing => JobStatus::Processing,
            SubJobOutcome::Success(_) => JobStatus::Success,
            SubJobOutcome::Failed(_) => JobStatus::Failed,
        }
    }
}
