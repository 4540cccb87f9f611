//! Job status vocabulary and sub-job kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical status shared by sub-jobs and the aggregate job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted upstream, not started yet
    Pending,
    /// Running upstream, or result not materialized yet
    Processing,
    /// Finished with a usable result
    Success,
    /// Finished without a usable result
    Failed,
}

impl JobStatus {
    /// `SUCCESS` and `FAILED` are fixed points: nothing moves a job out of them
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }

    /// Storage / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Parse the storage representation (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(JobStatus::Pending),
            "PROCESSING" => Some(JobStatus::Processing),
            "SUCCESS" => Some(JobStatus::Success),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of upstream sub-job contributing to a job
///
/// The derived ordering (`Parse` before `Extract`) is the fixed order used
/// when rendering combined error text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubJobKind {
    /// Document parsing, result is an opaque text blob
    Parse,
    /// Structured extraction, result is validated JSON
    Extract,
}

impl SubJobKind {
    /// All kinds, in fixed order
    pub const ALL: [SubJobKind; 2] = [SubJobKind::Parse, SubJobKind::Extract];

    /// Human-readable label used to prefix error text
    pub fn label(&self) -> &'static str {
        match self {
            SubJobKind::Parse => "Parse",
            SubJobKind::Extract => "Extract",
        }
    }

    /// Name of the field this kind contributes to the merged result
    pub fn result_field(&self) -> &'static str {
        match self {
            SubJobKind::Parse => "parsed_content",
            SubJobKind::Extract => "extracted_data",
        }
    }
}

impl fmt::Display for SubJobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
