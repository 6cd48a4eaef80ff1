//! Verdict module - check failures, severity, and policy

mod failure;
mod policy;
mod severity;

pub use failure::{BODY_EXCERPT_CHARS, CheckFailure, FailureKind, HttpMethod, body_excerpt};
pub use policy::{TOOL_ERROR_EXIT, Verdict, VerdictPolicy, VerdictStatus};
pub use severity::Severity;
