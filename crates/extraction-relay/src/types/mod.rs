//! Core types for the extraction relay

pub mod document;
pub mod outcome;
pub mod record;
pub mod response;
pub mod status;

pub use document::{ExtractionOptions, UploadedDocument};
pub use outcome::{SubJobOutcome, SubJobPayload};
pub use record::{JobRecord, JobUpdate, SubJobRef};
pub use response::{JobHistoryResponse, JobStatusResponse, JobSummary};
pub use status::{JobStatus, SubJobKind};
