//! extraction-relay: upload-and-poll backend for a hosted document-extraction API
//!
//! Each submitted document fans out into upstream sub-jobs (markdown parsing and
//! structured extraction). Polling a job fetches every sub-job concurrently,
//! reconciles their outcomes into one aggregate status and persists it. Once a
//! job is `SUCCESS` or `FAILED` it is served from the job store without asking
//! the upstream again.

pub mod config;
pub mod error;
pub mod reconcile;
pub mod server;
pub mod store;
pub mod submit;
pub mod types;
pub mod upstream;

pub use config::RelayConfig;
pub use error::{Error, Result};
pub use reconcile::Reconciler;
pub use store::JobStore;
pub use submit::{JobSubmitter, SubmitRequest};
pub use types::{JobRecord, JobStatus, JobStatusResponse, SubJobKind};
pub use upstream::UpstreamJobClient;
