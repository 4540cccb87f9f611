//! Poll-time reconciliation of sub-job outcomes
//!
//! - `validator`: structured payload validation
//! - `aggregate`: pure status derivation and result merging
//! - `engine`: fetches outcomes concurrently and persists the aggregate

pub mod aggregate;
pub mod engine;
pub mod validator;

pub use aggregate::{aggregate_status, reconcile, Reconciliation};
pub use engine::Reconciler;
pub use validator::is_valid_extraction;
