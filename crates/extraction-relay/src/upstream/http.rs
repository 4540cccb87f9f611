//! HTTP client for the hosted extraction service
//!
//! Fetching a sub-job is a two-step protocol: the status endpoint first, then,
//! only once the upstream reports completion, the result endpoint.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::UpstreamJobClient;
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::reconcile::is_valid_extraction;
use crate::types::{
    ExtractionOptions, SubJobKind, SubJobOutcome, SubJobPayload, UploadedDocument,
};

/// Longest upstream error body echoed into a failure reason
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Classified answer of the status endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum StatusCheck {
    /// Upstream finished; the result endpoint decides the outcome
    Complete,
    /// Outcome known without asking for the result
    Settled(SubJobOutcome),
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct StartedJob {
    id: Option<String>,
}

/// Client for the hosted extraction REST API
pub struct HttpUpstreamClient {
    client: Client,
    base_url: String,
    api_key: String,
    extraction_agent_id: Option<String>,
}

impl HttpUpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            extraction_agent_id: config.extraction_agent_id.clone(),
        })
    }

    fn status_url(&self, kind: SubJobKind, id: &str) -> String {
        match kind {
            SubJobKind::Parse => format!("{}/api/parsing/job/{}", self.base_url, id),
            SubJobKind::Extract => format!("{}/api/v1/extraction/jobs/{}", self.base_url, id),
        }
    }

    fn result_url(&self, kind: SubJobKind, id: &str) -> String {
        match kind {
            SubJobKind::Parse => {
                format!("{}/api/parsing/job/{}/result/markdown", self.base_url, id)
            }
            SubJobKind::Extract => {
                format!("{}/api/v1/extraction/jobs/{}/result", self.base_url, id)
            }
        }
    }

    fn start_url(&self, kind: SubJobKind) -> String {
        match kind {
            SubJobKind::Parse => format!("{}/api/parsing/upload", self.base_url),
            SubJobKind::Extract => format!("{}/api/v1/extraction/jobs/file", self.base_url),
        }
    }

    async fn check_status(&self, kind: SubJobKind, id: &str) -> StatusCheck {
        let url = self.status_url(kind, id);
        debug!("Checking {} status: {}", kind, url);

        let response = match self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return StatusCheck::Settled(network_error(&e)),
        };

        if !response.status().is_success() {
            return StatusCheck::Settled(classify_status_error(response.status()));
        }

        match response.json::<StatusBody>().await {
            Ok(body) => classify_status(&body.status),
            Err(e) => {
                warn!("Malformed {} status response for {}: {}", kind, id, e);
                StatusCheck::Settled(SubJobOutcome::failed(format!(
                    "Malformed status response: {}",
                    e
                )))
            }
        }
    }

    async fn fetch_result(&self, kind: SubJobKind, id: &str) -> SubJobOutcome {
        let url = self.result_url(kind, id);
        let accept = match kind {
            SubJobKind::Parse => "text/markdown",
            SubJobKind::Extract => "application/json",
        };
        debug!("Fetching {} result: {}", kind, url);

        let response = match self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, accept)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return network_error(&e),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return classify_result_error(status, &body);
        }

        match kind {
            SubJobKind::Parse => match response.text().await {
                Ok(text) => SubJobOutcome::Success(SubJobPayload::Document(text)),
                Err(e) => network_error(&e),
            },
            SubJobKind::Extract => match response.json::<Value>().await {
                Ok(payload) => classify_extraction(payload),
                Err(e) => {
                    warn!("Extract result for {} is not JSON: {}", id, e);
                    SubJobOutcome::failed(format!("Malformed result response: {}", e))
                }
            },
        }
    }
}

#[async_trait]
impl UpstreamJobClient for HttpUpstreamClient {
    async fn fetch(&self, kind: SubJobKind, external_id: &str) -> SubJobOutcome {
        match self.check_status(kind, external_id).await {
            StatusCheck::Complete => self.fetch_result(kind, external_id).await,
            StatusCheck::Settled(outcome) => outcome,
        }
    }

    async fn start(
        &self,
        kind: SubJobKind,
        document: &UploadedDocument,
        options: &ExtractionOptions,
    ) -> Result<String> {
        let file = Part::bytes(document.data.clone())
            .file_name(document.filename.clone())
            .mime_str(&document.content_type())?;

        let form = match kind {
            SubJobKind::Parse => Form::new().part("file", file),
            SubJobKind::Extract => {
                let agent_id = self.extraction_agent_id.clone().ok_or_else(|| {
                    Error::Config("extraction agent id is not configured".to_string())
                })?;

                let mut form = Form::new().text("extraction_agent_id", agent_id);
                if let Some(ref schema) = options.data_schema {
                    form = form.text("data_schema_override", serde_json::to_string(schema)?);
                }
                if let Some(ref mode) = options.extraction_mode {
                    form = form.text("extraction_mode", mode.clone());
                }
                form.part("file", file)
            }
        };

        let url = self.start_url(kind);
        debug!("Starting {} sub-job for {}: {}", kind, document.filename, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "{} start failed with {}: {}",
                kind,
                status.as_u16(),
                truncate(&body, MAX_ERROR_BODY_CHARS)
            )));
        }

        let started: StartedJob = response.json().await?;
        started
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::upstream(format!("{} start response has no job id", kind)))
    }

    fn name(&self) -> &str {
        "llama-cloud"
    }
}

/// Map the upstream status vocabulary onto the canonical one
pub fn classify_status(raw: &str) -> StatusCheck {
    match raw.trim().to_ascii_uppercase().as_str() {
        "SUCCESS" | "PARTIAL_SUCCESS" | "COMPLETED" => StatusCheck::Complete,
        "PENDING" => StatusCheck::Settled(SubJobOutcome::Pending),
        "PROCESSING" | "RUNNING" => StatusCheck::Settled(SubJobOutcome::Processing),
        "FAILED" | "ERROR" | "CANCELLED" => {
            StatusCheck::Settled(SubJobOutcome::failed("Job failed on external service"))
        }
        other => {
            debug!("Unknown upstream status {:?}, treating as pending", other);
            StatusCheck::Settled(SubJobOutcome::Pending)
        }
    }
}

/// Non-2xx answer of the status endpoint
pub fn classify_status_error(status: StatusCode) -> SubJobOutcome {
    match status {
        StatusCode::NOT_FOUND => SubJobOutcome::failed("Job not found on external service"),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SubJobOutcome::failed(format!("Authentication error: {}", status.as_u16()))
        }
        other => SubJobOutcome::failed(format!("Status check HTTP error: {}", other.as_u16())),
    }
}

/// Non-2xx answer of the result endpoint
///
/// A 404 after a completed status means the result is not materialized yet.
pub fn classify_result_error(status: StatusCode, body: &str) -> SubJobOutcome {
    match status {
        StatusCode::NOT_FOUND => SubJobOutcome::Processing,
        StatusCode::BAD_REQUEST => SubJobOutcome::failed(format!(
            "Bad request: {}",
            truncate(body, MAX_ERROR_BODY_CHARS)
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SubJobOutcome::failed(format!("Authentication error: {}", status.as_u16()))
        }
        other => SubJobOutcome::failed(format!("Result HTTP error: {}", other.as_u16())),
    }
}

fn classify_extraction(payload: Value) -> SubJobOutcome {
    if is_valid_extraction(&payload) {
        SubJobOutcome::Success(SubJobPayload::Structured(payload))
    } else {
        warn!("Rejecting extraction payload: {}", truncate(&payload.to_string(), 100));
        SubJobOutcome::failed("Invalid extraction data")
    }
}

fn network_error(err: &reqwest::Error) -> SubJobOutcome {
    SubJobOutcome::failed(format!("Network error: {}", err))
}

/// First `max` characters of `s`
pub fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
