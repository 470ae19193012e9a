//! HTTP handlers for resource queries, plus the failure envelope.

pub mod envelope;
pub mod resource;
pub use envelope::{failure_envelope, fallback};
pub use resource::*;
