//! Client-facing response envelopes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::JobRecord;
use super::status::{JobStatus, SubJobKind};

/// Envelope returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub success: bool,
    pub job_id: String,
    pub status: JobStatus,
    pub filename: String,
    pub message: String,
    /// Merged result, only on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure text, only on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Raw stored structured data that could not be decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<String>,
}

impl JobStatusResponse {
    /// Render a job record. Never fails: a malformed stored payload is passed
    /// through raw under `extracted_data`.
    pub fn from_record(record: &JobRecord) -> Self {
        let mut response = Self {
            success: true,
            job_id: record.job_id.clone(),
            status: record.status,
            filename: record.filename.clone(),
            message: status_message(record.status).to_string(),
            data: None,
            error: None,
            extracted_data: None,
        };

        match record.status {
            JobStatus::Success => {
                let mut data = Map::new();

                if let Some(ref content) = record.parsed_content {
                    data.insert(
                        SubJobKind::Parse.result_field().to_string(),
                        Value::String(content.clone()),
                    );
                }

                if let Some(ref raw) = record.extracted_data {
                    match serde_json::from_str::<Value>(raw) {
                        Ok(value) => {
                            data.insert(SubJobKind::Extract.result_field().to_string(), value);
                        }
                        Err(e) => {
                            tracing::warn!(
                                "[{}] Stored extracted_data is not valid JSON: {}",
                                record.job_id,
                                e
                            );
                            response.extracted_data = Some(raw.clone());
                        }
                    }
                }

                if !data.is_empty() {
                    response.data = Some(Value::Object(data));
                }
            }
            JobStatus::Failed => {
                response.error = Some(
                    record
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "Unknown error".to_string()),
                );
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }

        response
    }
}

/// Fixed human-readable message per status
pub fn status_message(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Waiting for processing to start",
        JobStatus::Processing => "Processing in progress",
        JobStatus::Success => "Processing completed successfully",
        JobStatus::Failed => "Processing failed",
    }
}

/// One entry of a user's job history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&JobRecord> for JobSummary {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            filename: record.filename.clone(),
            status: record.status,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// Envelope returned by the history endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHistoryResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<JobSummary>,
}

impl JobHistoryResponse {
    pub fn from_records(records: &[JobRecord]) -> Self {
        let data: Vec<JobSummary> = records.iter().map(JobSummary::from).collect();
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}
