//! Upstream extraction service client
//!
//! The client is the single place where raw upstream responses are classified
//! into the canonical status vocabulary. Callers never see HTTP codes.

pub mod http;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ExtractionOptions, SubJobKind, SubJobOutcome, UploadedDocument};

pub use http::HttpUpstreamClient;

/// Trait for the hosted extraction service
///
/// Implementations:
/// - `HttpUpstreamClient`: the hosted REST API
#[async_trait]
pub trait UpstreamJobClient: Send + Sync {
    /// Fetch the current outcome of one sub-job
    ///
    /// Never fails: transport and protocol problems are folded into
    /// `SubJobOutcome::Failed` or an in-progress outcome.
    async fn fetch(&self, kind: SubJobKind, external_id: &str) -> SubJobOutcome;

    /// Start a sub-job for an uploaded document
    ///
    /// Returns the upstream id of the new sub-job
    async fn start(
        &self,
        kind: SubJobKind,
        document: &UploadedDocument,
        options: &ExtractionOptions,
    ) -> Result<String>;

    /// Get client name for logging
    fn name(&self) -> &str;
}
